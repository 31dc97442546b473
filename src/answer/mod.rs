//! Answer generation with per-session dialogue memory.
//!
//! The answerer drives the retriever, assembles the augmented prompt
//! (system role + retrieved parents + rolling dialogue + user turn), and
//! streams the generator's output. Memory is appended only after a stream
//! completes successfully; failed or cancelled requests leave it
//! untouched.

mod prompt;

pub use prompt::{ANSWER_SYSTEM_PROMPT, build_system_prompt};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::core::{DialogueMemory, RequestContext};
use crate::error::ModelError;
use crate::generation::{ChatMessage, Generator, TokenStream};
use crate::retrieval::{Passage, Retriever};

type SharedMemory = Arc<tokio::sync::Mutex<DialogueMemory>>;

/// A completed answer with its supporting passages.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    /// The generated answer text.
    pub answer: String,
    /// The passages handed to the generator.
    pub sources: Vec<Passage>,
    /// Whether retrieval fell back to a degraded (empty) context.
    pub degraded: bool,
}

/// Drives retrieval and generation for chat sessions.
pub struct Answerer {
    retriever: Arc<Retriever>,
    generator: Arc<dyn Generator>,
    sessions: Mutex<HashMap<String, SharedMemory>>,
}

impl Answerer {
    /// Creates an answerer sharing the given retriever and generator.
    #[must_use]
    pub fn new(retriever: Arc<Retriever>, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Clears one session's dialogue memory (also used on mode switches).
    pub async fn clear_session(&self, session: &str) {
        let memory = self.session_memory(session);
        memory.lock().await.clear();
    }

    /// Number of turns currently remembered for `session`.
    pub async fn session_turns(&self, session: &str) -> usize {
        let memory = self.session_memory(session);
        let guard = memory.lock().await;
        guard.len()
    }

    /// Answers synchronously: retrieves, generates the full completion,
    /// and records the exchange in session memory.
    ///
    /// # Errors
    ///
    /// Surfaces the generator's [`ModelError`] category; memory is not
    /// mutated on failure.
    pub async fn answer(
        &self,
        ctx: &RequestContext,
        session: &str,
        query: &str,
    ) -> std::result::Result<AnswerOutcome, ModelError> {
        let (messages, sources, degraded) = self.prepare(ctx, session, query).await?;

        ctx.ensure_active()?;
        let answer = self.generator.call(&messages).await?;

        let memory = self.session_memory(session);
        {
            let mut guard = memory.lock().await;
            guard.record_exchange(query, &answer);
        }

        Ok(AnswerOutcome {
            answer,
            sources,
            degraded,
        })
    }

    /// Answers as a fragment stream. The exchange is committed to memory
    /// only when the stream runs to successful completion; errors,
    /// cancellation, or a dropped receiver leave memory untouched.
    ///
    /// # Errors
    ///
    /// Returns the generator's [`ModelError`] if the stream cannot be
    /// opened; in-stream failures surface as `Err` items.
    pub async fn stream_answer(
        &self,
        ctx: &RequestContext,
        session: &str,
        query: &str,
    ) -> std::result::Result<TokenStream, ModelError> {
        let (messages, _sources, _degraded) = self.prepare(ctx, session, query).await?;

        ctx.ensure_active()?;
        let mut upstream = self.generator.stream(&messages).await?;

        let (tx, rx) = tokio::sync::mpsc::channel::<std::result::Result<String, ModelError>>(16);
        let memory = self.session_memory(session);
        let query = query.to_string();
        let ctx = ctx.clone();

        tokio::spawn(async move {
            let mut accumulated = String::new();
            let mut completed = true;

            while let Some(item) = upstream.next().await {
                if ctx.is_cancelled() {
                    let _ = tx.send(Err(ModelError::Cancelled)).await;
                    completed = false;
                    break;
                }
                match item {
                    Ok(fragment) => {
                        accumulated.push_str(&fragment);
                        if tx.send(Ok(fragment)).await.is_err() {
                            // Receiver went away; treat as an aborted turn.
                            completed = false;
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(Err(err)).await;
                        completed = false;
                        break;
                    }
                }
            }

            if completed && !accumulated.is_empty() {
                let mut guard = memory.lock().await;
                guard.record_exchange(&query, &accumulated);
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    /// Runs retrieval and assembles the full message list.
    async fn prepare(
        &self,
        ctx: &RequestContext,
        session: &str,
        query: &str,
    ) -> std::result::Result<(Vec<ChatMessage>, Vec<Passage>, bool), ModelError> {
        ctx.ensure_active()?;
        let retrieval = self.retriever.retrieve(ctx, query).await?;

        let system = build_system_prompt(&retrieval.passages);
        let memory = self.session_memory(session);
        let history = {
            let guard = memory.lock().await;
            guard.as_messages()
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(history);
        messages.push(ChatMessage::user(query));

        Ok((messages, retrieval.passages, retrieval.degraded))
    }

    fn session_memory(&self, session: &str) -> SharedMemory {
        let mut sessions = self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(
            sessions
                .entry(session.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(DialogueMemory::new()))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::child_windows;
    use crate::config::RetrievalOptions;
    use crate::core::Segment;
    use crate::embedding::{Embedder, HashEmbedder};
    use crate::index::Index;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FixedGenerator {
        response: String,
        fail: AtomicBool,
    }

    impl FixedGenerator {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Generator for FixedGenerator {
        async fn call(
            &self,
            _messages: &[ChatMessage],
        ) -> std::result::Result<String, ModelError> {
            if self.fail.load(Ordering::SeqCst) {
                Err(ModelError::UpstreamServer {
                    status: 500,
                    message: "down".to_string(),
                })
            } else {
                Ok(self.response.clone())
            }
        }

        async fn stream(
            &self,
            _messages: &[ChatMessage],
        ) -> std::result::Result<TokenStream, ModelError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(ModelError::UpstreamServer {
                    status: 500,
                    message: "down".to_string(),
                });
            }
            let fragments: Vec<std::result::Result<String, ModelError>> = self
                .response
                .split_inclusive(' ')
                .map(|s| Ok(s.to_string()))
                .collect();
            Ok(Box::pin(futures_util::stream::iter(fragments)))
        }
    }

    async fn build_answerer(generator: Arc<FixedGenerator>) -> Answerer {
        let texts = [
            "Item 3 singleton property private constructor enum type one instance.",
            "Generics and collections with compile time safety everywhere.",
        ];
        let embedder = HashEmbedder::new(64);
        let mut parents = Vec::new();
        let mut children = Vec::new();
        for (i, text) in texts.iter().enumerate() {
            let parent = Segment::parent(i, (*text).to_string());
            children.extend(child_windows(&parent));
            parents.push(parent);
        }
        let mut embeddings = Vec::new();
        for child in &children {
            embeddings.push(embedder.embed(&child.text).await.unwrap());
        }
        let mut index = Index::new();
        index
            .ingest("book.pdf", parents, children, embeddings)
            .unwrap();

        let retriever = Arc::new(Retriever::new(
            Arc::new(index),
            Arc::new(HashEmbedder::new(64)),
            generator.clone(),
            RetrievalOptions::default(),
        ));
        Answerer::new(retriever, generator)
    }

    #[tokio::test]
    async fn test_answer_records_memory() {
        let generator = Arc::new(FixedGenerator::new("the answer"));
        let answerer = build_answerer(generator).await;
        let ctx = RequestContext::new();

        let outcome = answerer
            .answer(&ctx, "s1", "singleton property")
            .await
            .unwrap();
        assert_eq!(outcome.answer, "the answer");
        assert!(!outcome.sources.is_empty());
        assert_eq!(answerer.session_turns("s1").await, 2);
    }

    #[tokio::test]
    async fn test_failed_answer_leaves_memory_untouched() {
        let generator = Arc::new(FixedGenerator::new("unused"));
        let answerer = build_answerer(generator.clone()).await;
        let ctx = RequestContext::new();

        generator.fail.store(true, Ordering::SeqCst);
        let result = answerer.answer(&ctx, "s1", "singleton property").await;
        assert!(matches!(
            result,
            Err(ModelError::UpstreamServer { status: 500, .. })
        ));
        assert_eq!(answerer.session_turns("s1").await, 0);
    }

    #[tokio::test]
    async fn test_stream_accumulates_and_records() {
        let generator = Arc::new(FixedGenerator::new("streamed answer text"));
        let answerer = build_answerer(generator).await;
        let ctx = RequestContext::new();

        let mut stream = answerer
            .stream_answer(&ctx, "s2", "singleton property")
            .await
            .unwrap();

        let mut collected = String::new();
        while let Some(item) = stream.next().await {
            collected.push_str(&item.unwrap());
        }
        assert_eq!(collected, "streamed answer text");

        // The memory write happens on the spawned task; yield to it.
        tokio::task::yield_now().await;
        assert_eq!(answerer.session_turns("s2").await, 2);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let generator = Arc::new(FixedGenerator::new("a"));
        let answerer = build_answerer(generator).await;
        let ctx = RequestContext::new();

        answerer.answer(&ctx, "a", "singleton").await.unwrap();
        assert_eq!(answerer.session_turns("a").await, 2);
        assert_eq!(answerer.session_turns("b").await, 0);
    }

    #[tokio::test]
    async fn test_clear_session() {
        let generator = Arc::new(FixedGenerator::new("a"));
        let answerer = build_answerer(generator).await;
        let ctx = RequestContext::new();

        answerer.answer(&ctx, "s", "singleton").await.unwrap();
        answerer.clear_session("s").await;
        assert_eq!(answerer.session_turns("s").await, 0);
    }

    #[tokio::test]
    async fn test_memory_replayed_into_prompt() {
        let generator = Arc::new(FixedGenerator::new("answer"));
        let answerer = build_answerer(generator).await;
        let ctx = RequestContext::new();

        answerer.answer(&ctx, "s", "first question").await.unwrap();
        let (messages, _, _) = answerer.prepare(&ctx, "s", "second question").await.unwrap();

        // system + 2 remembered turns + new user turn
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].text, "first question");
        assert_eq!(messages[2].text, "answer");
        assert_eq!(messages[3].text, "second question");
    }
}
