//! Session implementation.
//!
//! One session drives the engine for the whole process:
//! - Initialization: subscribe to engine events, then load once
//! - Upload: validate and stage a source image as a data URI
//! - Generate: single-flight transcode of the source into a fade-in clip

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::engine::{Engine, EngineEvent, LoadOptions};
use crate::fade::{FadeCommand, StagedNames, OUTPUT_MEDIA_TYPE};
use crate::objects::{ObjectRef, ObjectStore, StoredObject};
use crate::upload::{validate_upload, SourceImage, SourceSummary, UploadError, UploadedFile};

use super::guard::{FlightGuard, StagedFiles};
use super::types::{
    EngineStatus, GenerateError, OutputVideo, SessionEvent, SessionSnapshot,
    SessionUpdateCallback,
};

const ROOT_DIR: &str = "/";

/// Mutable state guarded by one lock.
#[derive(Debug, Default)]
struct SessionState {
    source: Option<SourceImage>,
    output: Option<OutputVideo>,
    error: Option<String>,
}

/// The fade session.
pub struct Session {
    engine: Arc<dyn Engine>,
    load_options: LoadOptions,
    load_hint: String,
    objects: ObjectStore,
    update_callback: Option<SessionUpdateCallback>,

    status: RwLock<EngineStatus>,
    state: RwLock<SessionState>,
    generating: Arc<AtomicBool>,
    progress: Arc<AtomicU8>,
    sequence: AtomicU64,
}

impl Session {
    /// Create a new session over `engine`. Nothing is loaded until
    /// [`Session::initialize`] runs.
    pub fn new(engine: Arc<dyn Engine>, load_options: LoadOptions) -> Self {
        let load_hint = engine.name().to_string();
        Self {
            engine,
            load_options,
            load_hint,
            objects: ObjectStore::new(),
            update_callback: None,
            status: RwLock::new(EngineStatus::Unloaded),
            state: RwLock::new(SessionState::default()),
            generating: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(AtomicU8::new(0)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Set a callback to be invoked on every state change.
    pub fn with_update_callback(mut self, callback: SessionUpdateCallback) -> Self {
        self.update_callback = Some(callback);
        self
    }

    /// Text appended to a load failure, naming where the engine was expected.
    pub fn with_load_hint(mut self, hint: impl Into<String>) -> Self {
        self.load_hint = hint.into();
        self
    }

    fn notify(&self, event: SessionEvent) {
        if let Some(ref callback) = self.update_callback {
            callback(&event);
        }
    }

    /// Loads the engine. Only the first call does any work; later calls
    /// return the current status.
    pub async fn initialize(&self) -> EngineStatus {
        {
            let mut status = self.status.write().await;
            if *status != EngineStatus::Unloaded {
                debug!(status = ?*status, "Engine already initialized");
                return status.clone();
            }
            *status = EngineStatus::Loading;
        }
        self.notify(SessionEvent::EngineStatus {
            status: EngineStatus::Loading,
        });

        self.subscribe_engine_events();

        info!(
            engine = %self.engine.name(),
            core_url = %self.load_options.core_url,
            wasm_url = %self.load_options.wasm_url,
            "Loading engine"
        );

        let status = match self.engine.load(&self.load_options).await {
            Ok(()) => {
                info!(engine = %self.engine.name(), "Engine ready");
                self.state.write().await.error = None;
                EngineStatus::Ready
            }
            Err(e) => {
                error!(engine = %self.engine.name(), error = %e, "Error loading engine");
                let message = format!(
                    "Failed to load FFmpeg: {}. Ensure FFmpeg files are in place ({}).",
                    e, self.load_hint
                );
                self.set_error(message).await;
                EngineStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };

        *self.status.write().await = status.clone();
        self.notify(SessionEvent::EngineStatus {
            status: status.clone(),
        });
        status
    }

    fn subscribe_engine_events(&self) {
        let generating = Arc::clone(&self.generating);
        let progress = Arc::clone(&self.progress);
        let callback = self.update_callback.clone();

        self.engine.on_event(Arc::new(move |event: &EngineEvent| match event {
            EngineEvent::Progress { ratio } => {
                debug!(target: "stillfade::engine", ratio = *ratio, "Progress");
                if !generating.load(Ordering::SeqCst) {
                    return;
                }
                let percent = percent_from_ratio(*ratio);
                let previous = progress.fetch_max(percent, Ordering::SeqCst);
                if percent > previous {
                    if let Some(ref callback) = callback {
                        callback(&SessionEvent::Progress { percent });
                    }
                }
            }
            EngineEvent::Log { message } => {
                debug!(target: "stillfade::engine", "{}", message);
            }
        }));
    }

    /// Accepts a picked file as the new source image.
    ///
    /// Refused while the engine is not ready or a transcode is running;
    /// refusals do not touch the stored error.
    pub async fn upload(&self, file: Option<UploadedFile>) -> Result<SourceSummary, UploadError> {
        if !self.status.read().await.is_ready() {
            return Err(UploadError::EngineNotReady);
        }
        if self.is_generating() {
            return Err(UploadError::Busy);
        }

        let validated = validate_upload(file).and_then(UploadedFile::read_as_source);

        // Generate claims its flight before reading the source through this lock.
        let mut state = self.state.write().await;
        if self.is_generating() {
            return Err(UploadError::Busy);
        }

        let source = match validated {
            Ok(source) => source,
            Err(e) => {
                warn!(error = ?e, "Upload rejected");
                if matches!(e, UploadError::Read { .. }) {
                    state.source = None;
                }
                state.error = Some(e.to_string());
                drop(state);
                self.notify(SessionEvent::Error {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        let summary = source.summary();
        state.source = Some(source);
        state.error = None;
        let released = state.output.take();
        drop(state);
        if let Some(previous) = released {
            self.objects.revoke(&previous.object);
            debug!(object = %previous.object, "Released previous output");
        }

        info!(
            file_name = ?summary.file_name,
            media_type = %summary.media_type,
            size_bytes = summary.size_bytes,
            "Source image staged"
        );
        self.notify(SessionEvent::SourceChanged {
            source: summary.clone(),
        });
        Ok(summary)
    }

    /// Transcodes the current source into a fade-in clip and publishes it.
    ///
    /// The attempt runs on its own task, so dropping the returned future
    /// neither cancels the transcode nor skips its cleanup.
    pub async fn generate(self: &Arc<Self>) -> Result<OutputVideo, GenerateError> {
        let session = Arc::clone(self);
        match tokio::spawn(async move { session.run_attempt().await }).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                error!(error = %e, "Generate task did not complete");
                Err(GenerateError::Interrupted)
            }
        }
    }

    async fn run_attempt(&self) -> Result<OutputVideo, GenerateError> {
        // Claim the flight before reading the source so an upload either
        // lands before this attempt or is refused as busy.
        let guard = match FlightGuard::acquire(&self.generating) {
            Some(guard) => guard,
            None => {
                warn!("Generate refused: a transcode is already running");
                return Err(GenerateError::Busy);
            }
        };

        let source = self.state.read().await.source.clone();
        let ready = self.status.read().await.is_ready();
        let source = match source {
            Some(source) if ready => source,
            _ => {
                drop(guard);
                let e = GenerateError::NotReady;
                warn!("Generate refused: no source image or engine not ready");
                self.set_error(e.user_message()).await;
                return Err(e);
            }
        };

        self.progress.store(0, Ordering::SeqCst);
        self.state.write().await.error = None;
        self.notify(SessionEvent::Generating { active: true });
        self.notify(SessionEvent::Progress { percent: 0 });

        let started = Instant::now();
        let result = self.run_transcode(&source).await;

        let outcome = match result {
            Ok(data) => {
                let output = self.publish(data, started).await;
                info!(
                    object = %output.object,
                    size_bytes = output.size_bytes,
                    elapsed_ms = output.elapsed_ms,
                    "Video generated"
                );
                Ok(output)
            }
            Err(e) => {
                error!(error = %e, kind = e.kind(), "Error generating video");
                self.set_error(e.user_message()).await;
                Err(e)
            }
        };

        drop(guard);
        self.notify(SessionEvent::Generating { active: false });
        if let Ok(ref output) = outcome {
            self.notify(SessionEvent::OutputReady {
                output: output.clone(),
            });
        }
        outcome
    }

    async fn run_transcode(&self, source: &SourceImage) -> Result<Vec<u8>, GenerateError> {
        let bytes = source.decode()?;
        if bytes.is_empty() {
            return Err(GenerateError::InvalidImageData);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let names = StagedNames::new(sequence, &source.media_type);
        let mut staged = StagedFiles::new(Arc::clone(&self.engine));

        let result = self.transcode_staged(&bytes, &names, &mut staged).await;
        let deleted = staged.release().await;
        debug!(deleted, "Cleaned up staged files");

        result
    }

    async fn transcode_staged(
        &self,
        bytes: &[u8],
        names: &StagedNames,
        staged: &mut StagedFiles,
    ) -> Result<Vec<u8>, GenerateError> {
        debug!(input = %names.input, size_bytes = bytes.len(), "Writing input file");
        staged.track(&names.input);
        self.engine
            .write_file(&names.input, bytes)
            .await
            .map_err(GenerateError::Stage)?;

        let listing = self
            .engine
            .list_dir(ROOT_DIR)
            .await
            .map_err(GenerateError::ListDir)?;
        if !listing.iter().any(|entry| entry.name == names.input) {
            warn!(input = %names.input, "Input file not listed after write");
        }

        let args = FadeCommand::for_names(names).args();
        debug!(args = ?args, "Running fade command");
        staged.track(&names.output);
        let code = self.engine.exec(&args).await.map_err(GenerateError::Exec)?;
        if code != 0 {
            return Err(GenerateError::ExitStatus { code });
        }

        let listing = self
            .engine
            .list_dir(ROOT_DIR)
            .await
            .map_err(GenerateError::ListDir)?;
        if !listing.iter().any(|entry| entry.name == names.output) {
            return Err(GenerateError::OutputMissing);
        }

        let data = self
            .engine
            .read_file(&names.output)
            .await
            .map_err(GenerateError::ReadOutput)?;
        if data.is_empty() {
            return Err(GenerateError::OutputEmpty);
        }

        Ok(data)
    }

    /// Releases the previous output, then stores `data` as the new one.
    async fn publish(&self, data: Vec<u8>, started: Instant) -> OutputVideo {
        let mut state = self.state.write().await;
        if let Some(previous) = state.output.take() {
            self.objects.revoke(&previous.object);
        }

        let size_bytes = data.len();
        let object = self.objects.create(data, OUTPUT_MEDIA_TYPE);
        let output = OutputVideo {
            object,
            content_type: OUTPUT_MEDIA_TYPE.to_string(),
            size_bytes,
            created_at: Utc::now(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        state.output = Some(output.clone());
        output
    }

    async fn set_error(&self, message: String) {
        self.state.write().await.error = Some(message.clone());
        self.notify(SessionEvent::Error { message });
    }

    pub async fn status(&self) -> EngineStatus {
        self.status.read().await.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }

    /// Progress of the current (or last) attempt, 0 to 100.
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    pub async fn source(&self) -> Option<SourceImage> {
        self.state.read().await.source.clone()
    }

    pub async fn output(&self) -> Option<OutputVideo> {
        self.state.read().await.output.clone()
    }

    /// Bytes of the current output, if any.
    pub async fn output_object(&self) -> Option<StoredObject> {
        let output = self.output().await?;
        self.objects.get(&output.object)
    }

    /// Resolves any live object reference.
    pub fn object(&self, object_ref: &ObjectRef) -> Option<StoredObject> {
        self.objects.get(object_ref)
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let engine = self.status().await;
        let state = self.state.read().await;
        SessionSnapshot {
            ready: engine.is_ready(),
            engine,
            generating: self.is_generating(),
            progress: self.progress(),
            source: state.source.as_ref().map(SourceImage::summary),
            output: state.output.clone(),
            error: state.error.clone(),
        }
    }
}

/// Converts an engine ratio to a whole percentage in `[0, 100]`.
pub(crate) fn percent_from_ratio(ratio: f64) -> u8 {
    if !ratio.is_finite() {
        return 0;
    }
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}
