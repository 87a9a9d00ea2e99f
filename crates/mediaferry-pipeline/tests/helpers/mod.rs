//! Fake remote collaborators with canned outcomes, plus test configuration.
//!
//! Each fake records the calls it receives so tests can assert on exactly
//! what the orchestrator sent, not just on the final report.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use mediaferry_client::{
    content_stream_from_bytes, CommitClient, ContentFetcher, ContentStream, UploadStager,
};
use mediaferry_core::{
    CommitBatch, CommitError, CommitOutcome, FetchError, ImportConfig, RetryPolicy, StageError,
    StagedUpload,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Millisecond-scale backoffs and flush deadline so retry paths run fast.
pub fn fast_config() -> ImportConfig {
    let retry = RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        multiplier: 2.0,
        max_backoff: Duration::from_millis(5),
    };
    ImportConfig {
        batch_limit: 50,
        concurrency: 1,
        flush_deadline: Duration::from_millis(20),
        stage_retry: retry.clone(),
        commit_retry: retry,
    }
}

/// Deterministic content for a locator, so tests can verify the stager
/// consumed exactly the fetched stream.
pub fn content_for(locator: &str) -> Vec<u8> {
    format!("bytes:{}", locator).into_bytes()
}

#[derive(Default)]
pub struct FakeFetcher {
    calls: Mutex<Vec<String>>,
    transient_failures: Mutex<HashMap<String, u32>>,
    not_found: Mutex<HashSet<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `times` fetches of `locator` fail with `Unreachable`.
    pub fn fail_transiently(&self, locator: &str, times: u32) {
        self.transient_failures
            .lock()
            .unwrap()
            .insert(locator.to_string(), times);
    }

    pub fn fail_not_found(&self, locator: &str) {
        self.not_found.lock().unwrap().insert(locator.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, locator: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == locator)
            .count()
    }
}

#[async_trait]
impl ContentFetcher for FakeFetcher {
    async fn fetch(&self, locator: &str) -> Result<ContentStream, FetchError> {
        self.calls.lock().unwrap().push(locator.to_string());
        if self.not_found.lock().unwrap().contains(locator) {
            return Err(FetchError::NotFound(locator.to_string()));
        }
        if let Some(remaining) = self.transient_failures.lock().unwrap().get_mut(locator) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FetchError::Unreachable("connection reset".to_string()));
            }
        }
        Ok(content_stream_from_bytes(Bytes::from(content_for(locator))))
    }
}

pub struct StageCall {
    pub display_name: String,
    pub content: Vec<u8>,
}

#[derive(Default)]
pub struct FakeStager {
    calls: Mutex<Vec<StageCall>>,
    tokens: Mutex<HashMap<String, String>>,
    rejected: Mutex<HashSet<String>>,
    transient_failures: Mutex<HashMap<String, u32>>,
    panics: Mutex<HashSet<String>>,
    counter: AtomicUsize,
}

impl FakeStager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a fixed token for this display name instead of a generated one.
    pub fn token_for(&self, display_name: &str, token: &str) {
        self.tokens
            .lock()
            .unwrap()
            .insert(display_name.to_string(), token.to_string());
    }

    /// Every staging call for this display name is rejected (4xx).
    pub fn reject(&self, display_name: &str) {
        self.rejected
            .lock()
            .unwrap()
            .insert(display_name.to_string());
    }

    /// Staging calls for this display name panic, crashing their worker.
    pub fn panic_on(&self, display_name: &str) {
        self.panics.lock().unwrap().insert(display_name.to_string());
    }

    /// The next `times` staging calls for this display name fail transiently.
    pub fn fail_transiently(&self, display_name: &str, times: u32) {
        self.transient_failures
            .lock()
            .unwrap()
            .insert(display_name.to_string(), times);
    }

    pub fn calls(&self) -> Vec<(String, Vec<u8>)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| (c.display_name.clone(), c.content.clone()))
            .collect()
    }
}

#[async_trait]
impl UploadStager for FakeStager {
    async fn stage(
        &self,
        stream: ContentStream,
        display_name: &str,
    ) -> Result<String, StageError> {
        // Consume the stream exactly once, like the real stager.
        let mut content = Vec::new();
        let mut stream = stream;
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => content.extend_from_slice(&bytes),
                Err(e) => return Err(StageError::Transient(e.to_string())),
            }
        }
        self.calls.lock().unwrap().push(StageCall {
            display_name: display_name.to_string(),
            content,
        });

        if self.panics.lock().unwrap().contains(display_name) {
            panic!("stager crashed");
        }
        if self.rejected.lock().unwrap().contains(display_name) {
            return Err(StageError::Rejected {
                code: Some(400),
                message: "unsupported content".to_string(),
            });
        }
        if let Some(remaining) = self
            .transient_failures
            .lock()
            .unwrap()
            .get_mut(display_name)
        {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StageError::Transient("remote 503".to_string()));
            }
        }

        let token = self
            .tokens
            .lock()
            .unwrap()
            .get(display_name)
            .cloned()
            .unwrap_or_else(|| format!("token-{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1));
        Ok(token)
    }
}

/// Scripted behavior for one commit call, consumed in FIFO order. When the
/// script runs out, every entry succeeds with `remote-{token}`.
pub enum CommitScript {
    Succeed,
    Transient(String),
    Rejected { code: Option<u16>, message: String },
    Outcomes(Vec<CommitOutcome>),
}

#[derive(Default)]
pub struct FakeCommitter {
    calls: Mutex<Vec<Vec<StagedUpload>>>,
    script: Mutex<VecDeque<CommitScript>>,
}

impl FakeCommitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_script(&self, step: CommitScript) {
        self.script.lock().unwrap().push_back(step);
    }

    /// Full entries of every commit call received, in order.
    pub fn calls(&self) -> Vec<Vec<StagedUpload>> {
        self.calls.lock().unwrap().clone()
    }

    /// Token lists of every commit call received, in order.
    pub fn token_lists(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|entries| entries.iter().map(|e| e.upload_token.clone()).collect())
            .collect()
    }
}

#[async_trait]
impl CommitClient for FakeCommitter {
    async fn commit(&self, batch: &CommitBatch) -> Result<Vec<CommitOutcome>, CommitError> {
        self.calls.lock().unwrap().push(batch.entries().to_vec());
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(CommitScript::Succeed);
        match step {
            CommitScript::Succeed => Ok(batch
                .entries()
                .iter()
                .map(|e| CommitOutcome::Created {
                    remote_id: format!("remote-{}", e.upload_token),
                })
                .collect()),
            CommitScript::Transient(message) => Err(CommitError::Transient(message)),
            CommitScript::Rejected { code, message } => Err(CommitError::Rejected { code, message }),
            CommitScript::Outcomes(outcomes) => Ok(outcomes),
        }
    }
}
