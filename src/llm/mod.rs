pub mod embeddings;
pub mod pricing;
pub mod quiz;
pub mod semantic_search;

pub use embeddings::EmbeddingGenerator;
pub use pricing::CostInfo;
pub use quiz::{GeneratedQuiz, GenerationMode, QuizGenerator, QuizRequest, QuizResponse};
pub use semantic_search::SemanticSearch;
