pub mod error;
pub mod evaluator;
pub mod knowledge_graph;
pub mod retry;
pub mod scorer;

pub use error::EvalError;
pub use evaluator::{ConsensusEvaluator, Metrics};
pub use knowledge_graph::KnowledgeGraph;
pub use retry::RetryPolicy;
pub use scorer::{QualityScorer, DEFAULT_RATING, parse_rating};
