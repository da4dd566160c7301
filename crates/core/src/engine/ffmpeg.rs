//! FFmpeg-backed engine implementation.
//!
//! The virtual file system is a private scratch directory; commands run with
//! that directory as their working directory so plain file names resolve
//! inside it.

use async_trait::async_trait;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::config::EngineConfig;
use super::error::EngineError;
use super::traits::Engine;
use super::types::{validate_file_name, DirEntry, EngineEvent, EventListener, LoadOptions};

/// FFmpeg-backed engine.
pub struct FfmpegEngine {
    config: EngineConfig,
    loaded: AtomicBool,
    listeners: RwLock<Vec<EventListener>>,
}

impl FfmpegEngine {
    /// Creates a new engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            loaded: AtomicBool::new(false),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Creates an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Directory backing the virtual file system.
    pub fn scratch_dir(&self) -> &Path {
        &self.config.scratch_dir
    }

    fn emit(&self, event: EngineEvent) {
        let listeners = match self.listeners.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for listener in listeners.iter() {
            listener(&event);
        }
    }

    fn ensure_loaded(&self) -> Result<(), EngineError> {
        if self.is_loaded() {
            Ok(())
        } else {
            Err(EngineError::NotLoaded)
        }
    }

    fn vfs_path(&self, name: &str) -> Result<PathBuf, EngineError> {
        validate_file_name(name)?;
        Ok(self.config.scratch_dir.join(name))
    }

    fn spawn_error(&self, e: std::io::Error) -> EngineError {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::BinaryNotFound {
                path: self.config.ffmpeg_path.clone(),
            }
        } else {
            EngineError::exec_failed(e.to_string())
        }
    }

    /// Builds the full ffmpeg argument list.
    ///
    /// Global options go first; the caller's arguments follow verbatim and
    /// in order.
    fn build_args(&self, args: &[String]) -> Vec<String> {
        let mut full = vec![
            "-nostdin".to_string(),
            "-y".to_string(),
            "-loglevel".to_string(),
            self.config.log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ];
        full.extend(self.config.extra_args.iter().cloned());
        full.extend(args.iter().cloned());
        full
    }
}

/// Output duration in seconds requested with `-t`, if any.
fn output_duration(args: &[String]) -> Option<f64> {
    let pos = args.iter().position(|a| a == "-t")?;
    let value = args.get(pos + 1)?;

    // Either plain seconds ("10", "2.5") or [HH:]MM:SS[.m]
    let mut secs = 0.0;
    for part in value.split(':') {
        secs = secs * 60.0 + part.parse::<f64>().ok()?;
    }
    if secs > 0.0 {
        Some(secs)
    } else {
        None
    }
}

/// Lines written by `-progress` are bare `key=value` pairs.
fn is_progress_line(line: &str) -> bool {
    !line.contains(' ') && line.contains('=')
}

/// Parses an `out_time_us`/`out_time_ms` line into a ratio of `duration_secs`.
fn progress_ratio(time_regex: &Regex, line: &str, duration_secs: f64) -> Option<f64> {
    let caps = time_regex.captures(line)?;
    // Both keys carry microseconds
    let micros = caps.get(1)?.as_str().parse::<f64>().ok()?;
    Some((micros / 1_000_000.0 / duration_secs).clamp(0.0, 1.0))
}

fn map_missing(name: &str, e: std::io::Error) -> EngineError {
    if e.kind() == std::io::ErrorKind::NotFound {
        EngineError::FileNotFound {
            name: name.to_string(),
        }
    } else {
        EngineError::Io(e)
    }
}

#[async_trait]
impl Engine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
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
        if self.is_loaded() {
            return Ok(());
        }

        info!(
            core_url = %options.core_url,
            wasm_url = %options.wasm_url,
            ffmpeg = %self.config.ffmpeg_path.display(),
            "Loading FFmpeg engine"
        );

        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(EngineError::load_failed(format!(
                "ffmpeg -version exited with code {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(version) = stdout.lines().next() {
            self.emit(EngineEvent::Log {
                message: version.to_string(),
            });
        }

        tokio::fs::create_dir_all(&self.config.scratch_dir).await?;
        self.loaded.store(true, Ordering::SeqCst);

        info!(scratch_dir = %self.config.scratch_dir.display(), "FFmpeg engine loaded");
        Ok(())
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        self.ensure_loaded()?;
        let path = self.vfs_path(name)?;
        tokio::fs::write(&path, data).await?;
        debug!(name, bytes = data.len(), "Wrote virtual file");
        Ok(())
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, EngineError> {
        self.ensure_loaded()?;
        if !matches!(path, "/" | "" | ".") {
            return Err(EngineError::UnsupportedPath {
                path: path.to_string(),
            });
        }

        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.config.scratch_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let is_dir = entry.file_type().await?.is_dir();
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn exec(&self, args: &[String]) -> Result<i32, EngineError> {
        self.ensure_loaded()?;

        let full_args = self.build_args(args);
        let duration_secs = output_duration(args);
        debug!(args = ?full_args, "Running ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&full_args)
            .current_dir(&self.config.scratch_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::exec_failed("stderr was not captured"))?;
        // Raw segments: stderr may carry non-UTF-8 metadata or file names.
        let mut segments = BufReader::new(stderr).split(b'\n');

        let time_regex = Regex::new(r"^out_time_(?:us|ms)=(\d+)$").ok();
        let mut error_output = String::new();

        loop {
            let segment = match segments.next_segment().await {
                Ok(Some(segment)) => segment,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Stopped reading ffmpeg output");
                    break;
                }
            };
            let line = String::from_utf8_lossy(&segment)
                .trim_end_matches('\r')
                .to_string();

            if line == "progress=end" {
                self.emit(EngineEvent::Progress { ratio: 1.0 });
                continue;
            }

            if is_progress_line(&line) {
                if let (Some(re), Some(duration)) = (&time_regex, duration_secs) {
                    if let Some(ratio) = progress_ratio(re, &line, duration) {
                        self.emit(EngineEvent::Progress { ratio });
                    }
                }
                continue;
            }

            if line.contains("Error") || line.contains("error") {
                error_output.push_str(&line);
                error_output.push('\n');
            }
            self.emit(EngineEvent::Log { message: line });
        }

        let status = child.wait().await?;
        let code = status.code().unwrap_or(-1);
        if !status.success() {
            warn!(code, stderr = %error_output.trim(), "ffmpeg exited with failure");
        }
        Ok(code)
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.ensure_loaded()?;
        let path = self.vfs_path(name)?;
        tokio::fs::read(&path).await.map_err(|e| map_missing(name, e))
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        self.ensure_loaded()?;
        let path = self.vfs_path(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| map_missing(name, e))?;
        debug!(name, "Deleted virtual file");
        Ok(())
    }
}
