pub mod exam_ctx;
pub mod exam_flow;

pub use exam_ctx::ExamCtx;
pub use exam_flow::{FinalizeOutcome, Finish, Preview, Selection, Setup};
