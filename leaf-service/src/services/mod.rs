pub mod assistant;
pub mod metrics;
pub mod providers;

pub use assistant::{answer_question, Answer};
pub use providers::{ChatProvider, ProviderError};
