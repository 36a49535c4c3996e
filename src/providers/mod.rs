pub mod openai;
pub mod traits;

pub use openai::OpenAIProvider;
pub use traits::{Completion, CompletionProvider, TokenUsage};
