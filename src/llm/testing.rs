//! Mock generators for testing
//!
//! These mocks enable relay and handler testing without a real backend.

use super::{FragmentStream, GenerateError, Generator};
use crate::conversation::Message;
use async_trait::async_trait;
use futures::stream::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

enum Script {
    /// Fragments, then normal end-of-turn
    Reply(Vec<String>),
    /// Fragments, then a mid-stream failure
    Failure(Vec<String>, GenerateError),
    /// `stream_reply` itself fails
    StartError(GenerateError),
    /// Fragment repeated forever; the flag flips when the stream is dropped
    Endless(String, Arc<AtomicBool>),
}

/// Scripted generator that replays queued turn scripts
pub struct ScriptedGenerator {
    scripts: Mutex<VecDeque<Script>>,
    /// Record of all snapshots submitted
    pub requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a turn that streams `fragments` and completes
    pub fn queue_reply<I, S>(&self, fragments: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments = fragments.into_iter().map(Into::into).collect();
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::Reply(fragments));
    }

    /// Queue a turn that streams `fragments` and then fails
    pub fn queue_failure<I, S>(&self, fragments: I, error: GenerateError)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments = fragments.into_iter().map(Into::into).collect();
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::Failure(fragments, error));
    }

    /// Queue a turn whose `stream_reply` call fails outright
    pub fn queue_start_error(&self, error: GenerateError) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::StartError(error));
    }

    /// Queue a turn that repeats `fragment` forever. Returns a flag that
    /// flips to `true` when the stream is dropped (generation cancelled).
    pub fn queue_endless(&self, fragment: impl Into<String>) -> Arc<AtomicBool> {
        let dropped = Arc::new(AtomicBool::new(false));
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::Endless(fragment.into(), dropped.clone()));
        dropped
    }

    /// Snapshots submitted so far
    pub fn recorded_requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn stream_reply(&self, messages: &[Message]) -> Result<FragmentStream, GenerateError> {
        self.requests.lock().unwrap().push(messages.to_vec());

        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GenerateError::unknown("No script queued"))?;

        match script {
            Script::Reply(fragments) => {
                let items: Vec<Result<String, GenerateError>> =
                    fragments.into_iter().map(Ok).collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Script::Failure(fragments, error) => {
                let items: Vec<Result<String, GenerateError>> = fragments
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(error)))
                    .collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Script::StartError(error) => Err(error),
            Script::Endless(fragment, dropped) => Ok(Box::pin(EndlessStream {
                fragment,
                _probe: DropProbe(dropped),
            })),
        }
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

struct DropProbe(Arc<AtomicBool>);

impl Drop for DropProbe {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

struct EndlessStream {
    fragment: String,
    _probe: DropProbe,
}

impl Stream for EndlessStream {
    type Item = Result<String, GenerateError>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(Some(Ok(self.fragment.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Message;
    use futures::StreamExt;

    #[tokio::test]
    async fn scripted_reply_streams_fragments_in_order() {
        let generator = ScriptedGenerator::new();
        generator.queue_reply(["hi", " there"]);

        let snapshot = vec![Message::system("sys"), Message::user("hello")];
        let mut stream = generator.stream_reply(&snapshot).await.unwrap();

        assert_eq!(stream.next().await.unwrap().unwrap(), "hi");
        assert_eq!(stream.next().await.unwrap().unwrap(), " there");
        assert!(stream.next().await.is_none());

        let recorded = generator.recorded_requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].len(), 2);
    }

    #[tokio::test]
    async fn scripted_failure_ends_with_error() {
        let generator = ScriptedGenerator::new();
        generator.queue_failure(["partial"], GenerateError::server_error("boom"));

        let mut stream = generator.stream_reply(&[]).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "partial");
        assert!(stream.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn unqueued_call_errors() {
        let generator = ScriptedGenerator::new();
        assert!(generator.stream_reply(&[]).await.is_err());
    }

    #[tokio::test]
    async fn endless_stream_reports_drop() {
        let generator = ScriptedGenerator::new();
        let dropped = generator.queue_endless("tick");

        let mut stream = generator.stream_reply(&[]).await.unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "tick");
        assert!(!dropped.load(Ordering::SeqCst));

        drop(stream);
        assert!(dropped.load(Ordering::SeqCst));
    }
}
