//! Model backend implementations.

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::MockModel;
pub use openai::OpenAiModel;
pub use traits::{AdvisorBackend, ModelBackend, ModelError};
