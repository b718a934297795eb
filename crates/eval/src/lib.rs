pub mod test_set;
pub mod benchmark;

pub use test_set::{QuestionRecord, load_question_set};
pub use benchmark::{BatchReport, BatchRunner, RowResult, compute_report};
