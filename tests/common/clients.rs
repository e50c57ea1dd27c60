//! Deterministic fakes for the external client traits.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tutorgraph::clients::{
    ChatModel, EmbeddingModel, GenerateRequest, ModelError, ModelOutput, Resources, SnippetEntry,
    SnippetHit, StoreError, ThreadCreation, ThreadStore, VectorStore,
};

/// Chat model replaying a script of canned outputs, in call order.
///
/// An exhausted script answers `Unavailable`, which fails the calling
/// node instead of hanging the test.
pub struct ScriptedChat {
    script: Mutex<VecDeque<Result<ModelOutput, ModelError>>>,
    calls: AtomicUsize,
}

impl ScriptedChat {
    pub fn new(outputs: Vec<Result<ModelOutput, ModelError>>) -> Self {
        Self {
            script: Mutex::new(outputs.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn generate(&self, _request: GenerateRequest) -> Result<ModelOutput, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().pop_front().unwrap_or_else(|| {
            Err(ModelError::Unavailable {
                message: "script exhausted".to_string(),
            })
        })
    }
}

/// Chat model that sleeps past the configured timeout before answering.
pub struct SlowChat {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowChat {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    /// Attempts started, including ones the timeout cancelled.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for SlowChat {
    async fn generate(&self, _request: GenerateRequest) -> Result<ModelOutput, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(ModelOutput::Text("too late".to_string()))
    }
}

/// Embedding model returning a fixed-dimension vector per input.
pub struct FixedEmbeddings;

#[async_trait]
impl EmbeddingModel for FixedEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        Ok(texts
            .iter()
            .map(|text| vec![text.len() as f32, 1.0, 0.0, 0.0])
            .collect())
    }
}

/// In-memory vector store recording upserts per namespace.
#[derive(Default)]
pub struct RecordingVectors {
    store: Mutex<FxHashMap<String, Vec<SnippetEntry>>>,
}

impl RecordingVectors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preloads a snippet so retrieval has something to find.
    pub fn preload(&self, namespace: &str, id: &str, text: &str) {
        self.store
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .push(SnippetEntry {
                id: id.to_string(),
                text: text.to_string(),
                embedding: vec![1.0, 0.0, 0.0, 0.0],
                metadata: Value::Null,
            });
    }

    /// Everything stored under a namespace, in upsert order.
    pub fn entries(&self, namespace: &str) -> Vec<SnippetEntry> {
        self.store.lock().get(namespace).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for RecordingVectors {
    async fn query(
        &self,
        namespace: &str,
        _embeddings: &[Vec<f32>],
        limit: usize,
    ) -> Result<Vec<SnippetHit>, StoreError> {
        let store = self.store.lock();
        let entries = store.get(namespace).cloned().unwrap_or_default();
        Ok(entries
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(rank, entry)| SnippetHit {
                id: entry.id,
                text: entry.text,
                score: 1.0 - rank as f32 * 0.1,
            })
            .collect())
    }

    async fn upsert(&self, namespace: &str, entries: Vec<SnippetEntry>) -> Result<(), StoreError> {
        let mut store = self.store.lock();
        let bucket = store.entry(namespace.to_string()).or_default();
        for entry in entries {
            bucket.retain(|existing| existing.id != entry.id);
            bucket.push(entry);
        }
        Ok(())
    }
}

/// In-memory thread catalog.
#[derive(Default)]
pub struct StaticThreads {
    threads: Mutex<FxHashMap<String, (String, String)>>,
}

impl StaticThreads {
    pub fn new() -> Self {
        Self::default()
    }

    /// The display name registered for a thread, if any.
    pub fn name_of(&self, thread_id: &str) -> Option<String> {
        self.threads
            .lock()
            .get(thread_id)
            .map(|(_, name)| name.clone())
    }
}

#[async_trait]
impl ThreadStore for StaticThreads {
    async fn thread_exists(&self, thread_id: &str) -> Result<bool, StoreError> {
        Ok(self.threads.lock().contains_key(thread_id))
    }

    async fn create_thread(
        &self,
        thread_id: &str,
        user_id: &str,
        name: &str,
    ) -> Result<ThreadCreation, StoreError> {
        let mut threads = self.threads.lock();
        if threads.contains_key(thread_id) {
            return Ok(ThreadCreation::AlreadyExists);
        }
        threads.insert(
            thread_id.to_string(),
            (user_id.to_string(), name.to_string()),
        );
        Ok(ThreadCreation::Created)
    }
}

/// One bundle of fakes plus the [`Resources`] view the runner needs.
///
/// Tests keep the concrete handles for assertions and pass
/// [`resources`](Self::resources) to the runner.
pub struct FakeWorld {
    pub chat: Arc<ScriptedChat>,
    pub embeddings: Arc<FixedEmbeddings>,
    pub vectors: Arc<RecordingVectors>,
    pub threads: Arc<StaticThreads>,
}

impl FakeWorld {
    pub fn scripted(outputs: Vec<Result<ModelOutput, ModelError>>) -> Self {
        Self {
            chat: Arc::new(ScriptedChat::new(outputs)),
            embeddings: Arc::new(FixedEmbeddings),
            vectors: Arc::new(RecordingVectors::new()),
            threads: Arc::new(StaticThreads::new()),
        }
    }

    pub fn resources(&self) -> Resources {
        Resources::new(
            Arc::clone(&self.chat) as Arc<dyn ChatModel>,
            Arc::clone(&self.embeddings) as Arc<dyn EmbeddingModel>,
            Arc::clone(&self.vectors) as Arc<dyn VectorStore>,
            Arc::clone(&self.threads) as Arc<dyn ThreadStore>,
        )
    }
}

/// Resources built around an arbitrary chat model, with default fakes for
/// everything else.
pub fn resources_with_chat(chat: Arc<dyn ChatModel>) -> Resources {
    Resources::new(
        chat,
        Arc::new(FixedEmbeddings),
        Arc::new(RecordingVectors::new()),
        Arc::new(StaticThreads::new()),
    )
}
