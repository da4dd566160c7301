//! Mock engine for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

use crate::engine::{
    validate_file_name, DirEntry, Engine, EngineError, EngineEvent, EventListener, LoadOptions,
};

use super::fixtures;

/// Engine operations, used to target failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Load,
    WriteFile,
    ListDir,
    Exec,
    ReadFile,
    DeleteFile,
}

/// A recorded engine call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Load(LoadOptions),
    WriteFile { name: String, size: usize },
    ListDir { path: String },
    Exec { args: Vec<String> },
    ReadFile { name: String },
    DeleteFile { name: String },
}

impl MockCall {
    pub fn op(&self) -> MockOp {
        match self {
            MockCall::Load(_) => MockOp::Load,
            MockCall::WriteFile { .. } => MockOp::WriteFile,
            MockCall::ListDir { .. } => MockOp::ListDir,
            MockCall::Exec { .. } => MockOp::Exec,
            MockCall::ReadFile { .. } => MockOp::ReadFile,
            MockCall::DeleteFile { .. } => MockOp::DeleteFile,
        }
    }
}

/// Mock implementation of the Engine trait.
///
/// Keeps its virtual file system in memory and provides controllable
/// behavior for testing:
/// - Record every call for assertions
/// - Fail loading or any single operation
/// - Control the exit code and whether `exec` produces output
/// - Emit progress events while `exec` runs
/// - Hold `exec` open until a test releases it
///
/// # Example
///
/// ```rust,ignore
/// use stillfade_core::testing::{MockEngine, MockOp};
///
/// let engine = Arc::new(MockEngine::new());
/// engine.set_create_output(false).await;
///
/// let session = Session::new(engine.clone(), options);
/// session.initialize().await;
///
/// assert_eq!(engine.calls_of(MockOp::Exec).await.len(), 1);
/// ```
pub struct MockEngine {
    loaded: AtomicBool,
    listeners: std::sync::RwLock<Vec<EventListener>>,
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    calls: Arc<RwLock<Vec<MockCall>>>,
    /// If set, `load` fails with this reason.
    load_error: Arc<RwLock<Option<String>>>,
    /// Per-operation errors, each consumed by the next matching call.
    next_errors: Arc<RwLock<HashMap<MockOp, EngineError>>>,
    fail_deletes: Arc<RwLock<bool>>,
    exit_code: Arc<RwLock<i32>>,
    create_output: Arc<RwLock<bool>>,
    output_bytes: Arc<RwLock<Vec<u8>>>,
    progress_steps: Arc<RwLock<Vec<f64>>>,
    exec_gate: Arc<RwLock<Option<Arc<Notify>>>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine that loads successfully and produces a
    /// small MP4 for every run.
    pub fn new() -> Self {
        Self {
            loaded: AtomicBool::new(false),
            listeners: std::sync::RwLock::new(Vec::new()),
            files: Arc::new(RwLock::new(BTreeMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            load_error: Arc::new(RwLock::new(None)),
            next_errors: Arc::new(RwLock::new(HashMap::new())),
            fail_deletes: Arc::new(RwLock::new(false)),
            exit_code: Arc::new(RwLock::new(0)),
            create_output: Arc::new(RwLock::new(true)),
            output_bytes: Arc::new(RwLock::new(fixtures::mp4_bytes(2048))),
            progress_steps: Arc::new(RwLock::new(vec![0.1, 0.35, 0.6, 0.85, 1.0])),
            exec_gate: Arc::new(RwLock::new(None)),
        }
    }

    /// Make `load` fail with `reason`.
    pub async fn set_load_error(&self, reason: impl Into<String>) {
        *self.load_error.write().await = Some(reason.into());
    }

    /// Make the next call of `op` fail with `error`.
    pub async fn set_next_error(&self, op: MockOp, error: EngineError) {
        self.next_errors.write().await.insert(op, error);
    }

    /// Make every `delete_file` fail.
    pub async fn set_fail_deletes(&self, fail: bool) {
        *self.fail_deletes.write().await = fail;
    }

    /// Exit code returned by `exec`. Nonzero codes produce no output.
    pub async fn set_exit_code(&self, code: i32) {
        *self.exit_code.write().await = code;
    }

    /// Whether a successful `exec` writes its output file.
    pub async fn set_create_output(&self, create: bool) {
        *self.create_output.write().await = create;
    }

    /// Bytes written as the output of `exec`.
    pub async fn set_output_bytes(&self, data: Vec<u8>) {
        *self.output_bytes.write().await = data;
    }

    /// Progress ratios emitted during `exec`, in order.
    pub async fn set_progress_steps(&self, steps: Vec<f64>) {
        *self.progress_steps.write().await = steps;
    }

    /// Make `exec` wait for `gate` to be notified before finishing.
    pub async fn set_exec_gate(&self, gate: Arc<Notify>) {
        *self.exec_gate.write().await = Some(gate);
    }

    /// Put a file into the virtual file system directly.
    pub async fn insert_file(&self, name: &str, data: Vec<u8>) {
        self.files.write().await.insert(name.to_string(), data);
    }

    /// Content of a virtual file, bypassing call recording.
    pub async fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.files.read().await.get(name).cloned()
    }

    /// Names currently in the virtual file system, sorted.
    pub async fn files(&self) -> Vec<String> {
        self.files.read().await.keys().cloned().collect()
    }

    /// Get all recorded calls.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.read().await.clone()
    }

    /// Recorded calls of one operation.
    pub async fn calls_of(&self, op: MockOp) -> Vec<MockCall> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.op() == op)
            .cloned()
            .collect()
    }

    /// Clear recorded calls.
    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    pub async fn load_count(&self) -> usize {
        self.calls_of(MockOp::Load).await.len()
    }

    pub async fn last_load_options(&self) -> Option<LoadOptions> {
        self.calls.read().await.iter().rev().find_map(|c| match c {
            MockCall::Load(options) => Some(options.clone()),
            _ => None,
        })
    }

    /// Argument lists passed to `exec`, in call order.
    pub async fn exec_args(&self) -> Vec<Vec<String>> {
        self.calls_of(MockOp::Exec)
            .await
            .into_iter()
            .filter_map(|c| match c {
                MockCall::Exec { args } => Some(args),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, call: MockCall) -> Result<(), EngineError> {
        let op = call.op();
        self.calls.write().await.push(call);
        if op != MockOp::Load && !self.is_loaded() {
            return Err(EngineError::NotLoaded);
        }
        match self.next_errors.write().await.remove(&op) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn emit(&self, event: EngineEvent) {
        let listeners = match self.listeners.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for listener in listeners {
            listener(&event);
        }
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn on_event(&self, listener: EventListener) {
        match self.listeners.write() {
            Ok(mut guard) => guard.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn load(&self, options: &LoadOptions) -> Result<(), EngineError> {
        self.record(MockCall::Load(options.clone())).await?;
        if let Some(reason) = self.load_error.read().await.clone() {
            return Err(EngineError::load_failed(reason));
        }
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        self.record(MockCall::WriteFile {
            name: name.to_string(),
            size: data.len(),
        })
        .await?;
        validate_file_name(name)?;
        self.insert_file(name, data.to_vec()).await;
        Ok(())
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, EngineError> {
        self.record(MockCall::ListDir {
            path: path.to_string(),
        })
        .await?;
        if !matches!(path, "/" | "" | ".") {
            return Err(EngineError::UnsupportedPath {
                path: path.to_string(),
            });
        }
        Ok(self
            .files()
            .await
            .into_iter()
            .map(|name| DirEntry {
                name,
                is_dir: false,
            })
            .collect())
    }

    async fn exec(&self, args: &[String]) -> Result<i32, EngineError> {
        self.record(MockCall::Exec {
            args: args.to_vec(),
        })
        .await?;

        let gate = self.exec_gate.read().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let input = args
            .iter()
            .position(|a| a == "-i")
            .and_then(|i| args.get(i + 1));
        let input_present = match input {
            Some(name) => self.files.read().await.contains_key(name),
            None => false,
        };
        if !input_present {
            self.emit(EngineEvent::Log {
                message: "No such file or directory".to_string(),
            });
            return Ok(1);
        }

        let steps = self.progress_steps.read().await.clone();
        for ratio in steps {
            self.emit(EngineEvent::Progress { ratio });
        }

        let code = *self.exit_code.read().await;
        if code == 0 && *self.create_output.read().await {
            if let Some(output) = args.last() {
                let data = self.output_bytes.read().await.clone();
                self.insert_file(output, data).await;
            }
        }
        Ok(code)
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.record(MockCall::ReadFile {
            name: name.to_string(),
        })
        .await?;
        self.file(name).await.ok_or_else(|| EngineError::FileNotFound {
            name: name.to_string(),
        })
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        self.record(MockCall::DeleteFile {
            name: name.to_string(),
        })
        .await?;
        if *self.fail_deletes.read().await {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "delete refused",
            )));
        }
        match self.files.write().await.remove(name) {
            Some(_) => Ok(()),
            None => Err(EngineError::FileNotFound {
                name: name.to_string(),
            }),
        }
    }
}
