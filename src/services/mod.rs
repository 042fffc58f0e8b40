pub mod allocator;
pub mod booklet;
pub mod composer;

pub use allocator::{allocate, Allocation, ScoreAllocationMap, ScoreDiscrepancy, ScorePolicy};
pub use booklet::{generate_variant, BookletGroup, BookletVariant, FlaggedQuestion};
pub use composer::{Cell, CountMatrix, ExamComposer, SelectionCriteria};
