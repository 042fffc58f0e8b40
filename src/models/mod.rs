pub mod exam;
pub mod loaders;
pub mod question;

pub use exam::{ExamSnapshot, ExamStatus};
pub use loaders::{load_pool_dir, load_pool_file, RawQuestion};
pub use question::{Complexity, Options, Question, QuestionFlag, QuestionId, QuestionType};
