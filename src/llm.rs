//! Generation adapter abstraction
//!
//! Provides a common interface over inference backends that turn a
//! conversation snapshot into a lazy stream of text fragments.

mod error;
mod llama_server;

#[cfg(test)]
pub mod testing;

pub use error::{GenerateError, GenerateErrorKind};
pub use llama_server::LlamaServerClient;

use crate::conversation::Message;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazy sequence of generated text fragments, terminating at end-of-turn.
pub type FragmentStream = BoxStream<'static, Result<String, GenerateError>>;

/// Common interface for generation backends.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Invoke one generation over the full conversation snapshot.
    ///
    /// The returned stream is finite and non-restartable. Dropping it is
    /// the cancellation hook: the backend connection is torn down and the
    /// underlying compute released.
    async fn stream_reply(&self, messages: &[Message]) -> Result<FragmentStream, GenerateError>;

    /// Identifier of the model serving this generator
    fn model_id(&self) -> &str;
}
