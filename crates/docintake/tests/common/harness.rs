//! Pipeline harness with scripted blob store and parser.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde_json::{json, Map, Value};

use docintake::{
    BlobRef, BlobStore, ByteSource, CategoryPolicy, CoordinatorOptions, DocumentParser,
    ExtractionError, FileCandidate, FileMeta, IntakePipeline, ParsedDocument, PolicyRegistry,
    TaskId, TaskProgressEvent, TransferError, TransferEvent, TransferStream,
};

/// How long a test waits for a task to settle.
pub const SETTLE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub enum TransferScript {
    /// Progress in `chunks` steps, then completion.
    Complete,
    Fail(String),
    /// One progress event, then nothing ever again.
    Hang,
}

/// Blob store that plays back one script per transfer, then a default.
pub struct ScriptedBlobStore {
    scripts: Mutex<VecDeque<TransferScript>>,
    default: TransferScript,
    chunks: u64,
    begun: AtomicUsize,
}

impl ScriptedBlobStore {
    pub fn new(default: TransferScript) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            default,
            chunks: 10,
            begun: AtomicUsize::new(0),
        }
    }

    pub fn completing() -> Self {
        Self::new(TransferScript::Complete)
    }

    pub fn then(self, script: TransferScript) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    pub fn transfers_begun(&self) -> usize {
        self.begun.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for ScriptedBlobStore {
    async fn begin_transfer(
        &self,
        _source: ByteSource,
        meta: &FileMeta,
    ) -> Result<TransferStream, TransferError> {
        let n = self.begun.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        let total = meta.size.max(1);
        let progress: Vec<TransferEvent> = (1..=self.chunks)
            .map(|i| TransferEvent::Progress {
                bytes_transferred: total * i / self.chunks,
                total_bytes: total,
            })
            .collect();

        let stream = match script {
            TransferScript::Complete => {
                let done = TransferEvent::Completed(BlobRef::new(format!(
                    "mem:{}/{}",
                    n, meta.filename
                )));
                stream::iter(progress).chain(stream::iter(vec![done])).boxed()
            }
            TransferScript::Fail(reason) => {
                let half = progress.len() / 2;
                stream::iter(progress.into_iter().take(half))
                    .chain(stream::iter(vec![TransferEvent::Failed(reason)]))
                    .boxed()
            }
            TransferScript::Hang => stream::iter(progress.into_iter().take(1))
                .chain(stream::pending())
                .boxed(),
        };
        Ok(stream)
    }
}

#[derive(Debug, Clone)]
pub enum ParseScript {
    Score(u8),
    Fail(String),
    Hang,
}

/// Parser that plays back one script per call and records the hints it saw.
pub struct ScriptedParser {
    scripts: Mutex<VecDeque<ParseScript>>,
    default: ParseScript,
    hints: Mutex<Vec<String>>,
}

impl ScriptedParser {
    pub fn new(default: ParseScript) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            default,
            hints: Mutex::new(Vec::new()),
        }
    }

    pub fn scoring(score: u8) -> Self {
        Self::new(ParseScript::Score(score))
    }

    pub fn then(self, script: ParseScript) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    pub fn hints(&self) -> Vec<String> {
        self.hints.lock().unwrap().clone()
    }
}

pub fn sample_data() -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("student".to_string(), json!("Ada Lovelace"));
    data.insert("gpa".to_string(), json!("3.9"));
    data
}

#[async_trait]
impl DocumentParser for ScriptedParser {
    async fn parse_document(
        &self,
        _blob_ref: &BlobRef,
        document_hint: &str,
    ) -> Result<ParsedDocument, ExtractionError> {
        self.hints.lock().unwrap().push(document_hint.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());

        match script {
            ParseScript::Score(score) => Ok(ParsedDocument {
                confidence_score: score,
                parsed_data: sample_data(),
            }),
            ParseScript::Fail(reason) => Err(ExtractionError::Failed(reason)),
            ParseScript::Hang => std::future::pending().await,
        }
    }
}

/// An `IntakePipeline` plus handles to its doubles.
pub struct TestHarness {
    pub pipeline: Arc<IntakePipeline>,
    pub blob_store: Arc<ScriptedBlobStore>,
    pub parser: Arc<ScriptedParser>,
}

impl TestHarness {
    /// Must be called inside a tokio runtime.
    pub fn new(policies: Vec<CategoryPolicy>) -> Self {
        Self::with(
            policies,
            ScriptedBlobStore::completing(),
            ScriptedParser::scoring(85),
            CoordinatorOptions::default(),
        )
    }

    pub fn with(
        policies: Vec<CategoryPolicy>,
        blob_store: ScriptedBlobStore,
        parser: ScriptedParser,
        options: CoordinatorOptions,
    ) -> Self {
        let blob_store = Arc::new(blob_store);
        let parser = Arc::new(parser);
        let pipeline = IntakePipeline::new(
            Arc::new(PolicyRegistry::new(policies)),
            Arc::clone(&blob_store) as Arc<dyn BlobStore>,
            Arc::clone(&parser) as Arc<dyn DocumentParser>,
            options,
        )
        .expect("inside a runtime");

        Self {
            pipeline: Arc::new(pipeline),
            blob_store,
            parser,
        }
    }

    /// Submits one candidate that must be admitted.
    pub fn admit(&self, category: &str, candidate: FileCandidate) -> TaskId {
        let mut outcomes = self.pipeline.submit(category, vec![candidate]).unwrap();
        outcomes.remove(0).expect("candidate admitted")
    }

    /// Every event from now until the task's stream ends.
    pub async fn events(&self, id: &TaskId) -> Vec<TaskProgressEvent> {
        let mut sub = self.pipeline.subscribe(id).unwrap();
        let mut events = Vec::new();
        let collect = async {
            while let Some(event) = sub.next().await {
                events.push(event);
            }
        };
        tokio::time::timeout(SETTLE, collect)
            .await
            .expect("task stream did not end");
        events
    }

    pub async fn wait_terminal(&self, id: &TaskId) -> TaskProgressEvent {
        let sub = self.pipeline.subscribe(id).unwrap();
        tokio::time::timeout(SETTLE, sub.wait_terminal())
            .await
            .expect("task did not settle")
            .expect("stream ended without a terminal event")
    }

    pub fn quota_held(&self, category: &str) -> usize {
        self.pipeline.quota_usage(category).unwrap().held
    }
}
