//! Session lifecycle integration tests.
//!
//! These tests drive a session against the mock engine through the whole
//! flow: initialize -> upload -> generate -> publish, plus every failure
//! branch in between.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use stillfade_core::{
    testing::{fixtures, MockCall, MockEngine, MockOp},
    EngineError, EngineStatus, GenerateError, LoadOptions, Session, SessionEvent, UploadError,
    UploadedFile, DOWNLOAD_FILE_NAME,
};

/// Test helper wiring a session to a mock engine and recording its events.
struct TestHarness {
    engine: Arc<MockEngine>,
    session: Arc<Session>,
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl TestHarness {
    fn new() -> Self {
        let engine = Arc::new(MockEngine::new());
        let events = Arc::new(Mutex::new(Vec::new()));

        let recorder = Arc::clone(&events);
        let session = Session::new(
            engine.clone(),
            LoadOptions::new("/ffmpeg/ffmpeg-core.js", "/ffmpeg/ffmpeg-core.wasm"),
        )
        .with_update_callback(Arc::new(move |event: &SessionEvent| {
            recorder.lock().unwrap().push(event.clone());
        }));

        Self {
            engine,
            session: Arc::new(session),
            events,
        }
    }

    async fn ready() -> Self {
        let harness = Self::new();
        assert_eq!(harness.session.initialize().await, EngineStatus::Ready);
        harness
    }

    async fn upload_jpeg(&self, len: usize) {
        self.session
            .upload(Some(UploadedFile::new(
                Some("photo.jpg".to_string()),
                "image/jpeg",
                fixtures::jpeg_bytes(len),
            )))
            .await
            .expect("upload should succeed");
    }

    fn take_events(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    fn progress_values(events: &[SessionEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Progress { percent } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    /// Engine calls made after initialization.
    async fn engine_calls(&self) -> Vec<MockCall> {
        self.engine
            .calls()
            .await
            .into_iter()
            .filter(|c| c.op() != MockOp::Load)
            .collect()
    }

    async fn wait_for_exec(&self) {
        for _ in 0..200 {
            if !self.engine.calls_of(MockOp::Exec).await.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("exec was never called");
    }
}

#[tokio::test]
async fn test_jpeg_to_fade_video() {
    let harness = TestHarness::ready().await;
    harness.upload_jpeg(10 * 1024).await;

    let output = harness.session.generate().await.expect("generate failed");

    let writes: Vec<MockCall> = harness.engine.calls_of(MockOp::WriteFile).await;
    assert_eq!(writes.len(), 1);
    let MockCall::WriteFile { name, size } = &writes[0] else {
        panic!("unexpected call {:?}", writes[0]);
    };
    assert_eq!(*size, 10 * 1024);
    assert!(name.starts_with("input_") && name.ends_with(".jpg"));

    let argv = &harness.engine.exec_args().await[0];
    let window = |flag: &str, value: &str| {
        argv.windows(2)
            .any(|w| w[0] == flag && w[1] == value)
    };
    assert!(window("-t", "10"));
    assert!(window("-vf", "fade=t=in:st=0:d=2"));
    assert!(window("-i", name));

    assert!(output.size_bytes > 0);
    assert_eq!(output.content_type, "video/mp4");
    let object = harness.session.output_object().await.unwrap();
    assert_eq!(object.data.len(), output.size_bytes);
    assert_eq!(DOWNLOAD_FILE_NAME, "fade-video.mp4");

    // Staged files are gone and the flag is down.
    assert!(harness.engine.files().await.is_empty());
    assert!(!harness.session.is_generating());
    assert!(harness.session.error().await.is_none());
}

#[tokio::test]
async fn test_engine_call_order() {
    let harness = TestHarness::ready().await;
    harness.upload_jpeg(512).await;
    harness.engine.clear_calls().await;

    harness.session.generate().await.unwrap();

    let ops: Vec<MockOp> = harness
        .engine
        .calls()
        .await
        .iter()
        .map(MockCall::op)
        .collect();
    assert_eq!(
        ops,
        vec![
            MockOp::WriteFile,
            MockOp::ListDir,
            MockOp::Exec,
            MockOp::ListDir,
            MockOp::ReadFile,
            MockOp::DeleteFile,
            MockOp::DeleteFile,
        ]
    );
}

#[tokio::test]
async fn test_zero_byte_image_fails_before_write() {
    let harness = TestHarness::ready().await;
    harness
        .session
        .upload(Some(UploadedFile::new(None, "image/jpeg", Vec::new())))
        .await
        .unwrap();

    let err = harness.session.generate().await.unwrap_err();
    assert!(matches!(err, GenerateError::InvalidImageData));
    assert!(harness.engine_calls().await.is_empty());

    let error = harness.session.error().await.unwrap();
    assert!(error.contains("Invalid image data"));
    assert!(!harness.session.is_generating());
}

#[tokio::test]
async fn test_text_file_rejected() {
    let harness = TestHarness::ready().await;

    let err = harness
        .session
        .upload(Some(UploadedFile::new(
            Some("notes.txt".to_string()),
            "text/plain",
            b"hello".to_vec(),
        )))
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::InvalidType { .. }));
    assert!(harness.session.source().await.is_none());
    assert!(harness
        .session
        .error()
        .await
        .unwrap()
        .contains("Invalid file type"));
    assert!(harness.engine_calls().await.is_empty());
}

#[tokio::test]
async fn test_missing_file_rejected() {
    let harness = TestHarness::ready().await;

    let err = harness.session.upload(None).await.unwrap_err();
    assert!(matches!(err, UploadError::NoFile));
    assert_eq!(
        harness.session.error().await.as_deref(),
        Some("No file selected. Please choose an image.")
    );
}

#[tokio::test]
async fn test_load_failure_blocks_everything() {
    let harness = TestHarness::new();
    harness.engine.set_load_error("core script missing").await;

    let status = harness.session.initialize().await;
    assert!(matches!(status, EngineStatus::Failed { .. }));
    assert!(harness
        .session
        .error()
        .await
        .unwrap()
        .contains("Failed to load"));

    let err = harness
        .session
        .upload(Some(UploadedFile::new(
            None,
            "image/jpeg",
            fixtures::jpeg_bytes(16),
        )))
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::EngineNotReady));

    let err = harness.session.generate().await.unwrap_err();
    assert!(matches!(err, GenerateError::NotReady));
    assert!(harness.engine_calls().await.is_empty());

    // No retry.
    harness.session.initialize().await;
    assert_eq!(harness.engine.load_count().await, 1);
}

#[tokio::test]
async fn test_generate_without_source_refused() {
    let harness = TestHarness::ready().await;

    let err = harness.session.generate().await.unwrap_err();
    assert!(matches!(err, GenerateError::NotReady));
    assert_eq!(
        harness.session.error().await.as_deref(),
        Some("No image or FFmpeg not loaded. Please upload an image and try again.")
    );
    assert!(harness.engine_calls().await.is_empty());
}

#[tokio::test]
async fn test_output_not_created() {
    let harness = TestHarness::ready().await;
    harness.engine.set_create_output(false).await;
    harness.upload_jpeg(1024).await;

    let err = harness.session.generate().await.unwrap_err();
    assert!(matches!(err, GenerateError::OutputMissing));
    assert!(harness
        .session
        .error()
        .await
        .unwrap()
        .contains("not created"));

    assert!(harness.session.output().await.is_none());
    assert_eq!(harness.session.objects().live_count(), 0);
    assert!(!harness.session.is_generating());
    assert!(harness.engine.files().await.is_empty());
    assert!(harness.engine.calls_of(MockOp::ReadFile).await.is_empty());
}

#[tokio::test]
async fn test_empty_output() {
    let harness = TestHarness::ready().await;
    harness.engine.set_output_bytes(Vec::new()).await;
    harness.upload_jpeg(1024).await;

    let err = harness.session.generate().await.unwrap_err();
    assert!(matches!(err, GenerateError::OutputEmpty));
    assert_eq!(
        harness.session.error().await.as_deref(),
        Some("Failed to generate video: Output video is empty. Please try a different image.")
    );
    assert!(harness.session.output().await.is_none());
    assert!(harness.engine.files().await.is_empty());
}

#[tokio::test]
async fn test_stage_failure_still_cleans_up() {
    let harness = TestHarness::ready().await;
    harness
        .engine
        .set_next_error(
            MockOp::WriteFile,
            EngineError::Io(std::io::Error::other("disk full")),
        )
        .await;
    harness.upload_jpeg(1024).await;

    let err = harness.session.generate().await.unwrap_err();
    assert!(matches!(err, GenerateError::Stage(_)));
    assert!(harness
        .session
        .error()
        .await
        .unwrap()
        .starts_with("Failed to generate video: "));

    assert!(!harness.engine.calls_of(MockOp::DeleteFile).await.is_empty());
    assert!(harness.engine.calls_of(MockOp::Exec).await.is_empty());
    assert!(!harness.session.is_generating());
}

#[tokio::test]
async fn test_exec_error_propagates() {
    let harness = TestHarness::ready().await;
    harness
        .engine
        .set_next_error(
            MockOp::Exec,
            EngineError::exec_failed("worker crashed"),
        )
        .await;
    harness.upload_jpeg(1024).await;

    let err = harness.session.generate().await.unwrap_err();
    assert!(matches!(err, GenerateError::Exec(_)));
    assert!(harness
        .session
        .error()
        .await
        .unwrap()
        .contains("worker crashed"));
    assert!(harness.engine.files().await.is_empty());
}

#[tokio::test]
async fn test_cleanup_failures_are_not_fatal() {
    let harness = TestHarness::ready().await;
    harness.engine.set_fail_deletes(true).await;
    harness.upload_jpeg(1024).await;

    let output = harness.session.generate().await.unwrap();
    assert!(harness.session.object(&output.object).is_some());
    assert!(harness.session.error().await.is_none());
    assert_eq!(harness.engine.files().await.len(), 2);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_resets() {
    let harness = TestHarness::ready().await;
    harness
        .engine
        .set_progress_steps(vec![0.2, 0.5, 0.4, 0.9, 1.0])
        .await;
    harness.upload_jpeg(1024).await;
    harness.take_events();

    harness.session.generate().await.unwrap();
    let first = TestHarness::progress_values(&harness.take_events());
    assert_eq!(first, vec![0, 20, 50, 90, 100]);
    assert!(first.windows(2).all(|w| w[0] <= w[1]));

    harness.session.generate().await.unwrap();
    let second = TestHarness::progress_values(&harness.take_events());
    assert_eq!(second.first(), Some(&0));
    assert_eq!(second.last(), Some(&100));
    assert!(second.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_generating_flag_events() {
    let harness = TestHarness::ready().await;
    harness.engine.set_create_output(false).await;
    harness.upload_jpeg(64).await;
    harness.take_events();

    harness.session.generate().await.unwrap_err();

    let flags: Vec<bool> = harness
        .take_events()
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Generating { active } => Some(*active),
            _ => None,
        })
        .collect();
    assert_eq!(flags, vec![true, false]);
}

#[tokio::test]
async fn test_single_flight() {
    let harness = TestHarness::ready().await;
    let gate = Arc::new(Notify::new());
    harness.engine.set_exec_gate(gate.clone()).await;
    harness.upload_jpeg(1024).await;

    let session = Arc::clone(&harness.session);
    let first = tokio::spawn(async move { session.generate().await });
    harness.wait_for_exec().await;

    assert!(harness.session.is_generating());
    assert!(matches!(
        harness.session.generate().await,
        Err(GenerateError::Busy)
    ));
    assert!(matches!(
        harness
            .session
            .upload(Some(UploadedFile::new(
                None,
                "image/png",
                fixtures::jpeg_bytes(8)
            )))
            .await,
        Err(UploadError::Busy)
    ));
    // A refusal leaves the running attempt's state alone.
    assert!(harness.session.error().await.is_none());

    gate.notify_one();
    let output = first.await.unwrap().unwrap();
    assert!(!harness.session.is_generating());
    assert_eq!(harness.engine.exec_args().await.len(), 1);
    assert_eq!(harness.session.output().await.unwrap().object, output.object);
}

#[tokio::test]
async fn test_at_most_one_live_output() {
    let harness = TestHarness::ready().await;
    harness.upload_jpeg(1024).await;

    let first = harness.session.generate().await.unwrap();
    let second = harness.session.generate().await.unwrap();

    assert_ne!(first.object, second.object);
    assert!(harness.session.object(&first.object).is_none());
    assert!(harness.session.object(&second.object).is_some());
    assert_eq!(harness.session.objects().live_count(), 1);

    // Each attempt stages under fresh names.
    let inputs: Vec<String> = harness
        .engine
        .exec_args()
        .await
        .iter()
        .map(|args| args[3].clone())
        .collect();
    assert_eq!(inputs.len(), 2);
    assert_ne!(inputs[0], inputs[1]);
}

#[tokio::test]
async fn test_reupload_after_failure() {
    let harness = TestHarness::ready().await;
    harness.engine.set_create_output(false).await;
    harness.upload_jpeg(1024).await;
    harness.session.generate().await.unwrap_err();
    assert!(harness.session.error().await.is_some());

    harness.engine.set_create_output(true).await;
    harness.upload_jpeg(2048).await;
    assert!(harness.session.error().await.is_none());

    harness.session.generate().await.unwrap();
    assert!(harness.session.output().await.is_some());
}

#[tokio::test]
async fn test_abandoned_generate_runs_to_completion() {
    let harness = TestHarness::ready().await;
    let gate = Arc::new(Notify::new());
    harness.engine.set_exec_gate(gate.clone()).await;
    harness.upload_jpeg(1024).await;

    // The caller gives up while the engine is still running.
    let abandoned =
        tokio::time::timeout(Duration::from_millis(50), harness.session.generate()).await;
    assert!(abandoned.is_err());
    harness.wait_for_exec().await;

    assert!(harness.session.is_generating());
    assert!(matches!(
        harness.session.generate().await,
        Err(GenerateError::Busy)
    ));

    gate.notify_one();
    for _ in 0..200 {
        if !harness.session.is_generating() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(!harness.session.is_generating());
    assert!(harness.engine.files().await.is_empty());
    assert!(harness.session.output().await.is_some());
    assert_eq!(harness.engine.exec_args().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_upload_and_generate_stay_consistent() {
    for _ in 0..25 {
        let harness = TestHarness::ready().await;
        harness.upload_jpeg(64).await;

        let uploader = Arc::clone(&harness.session);
        let upload = tokio::spawn(async move {
            uploader
                .upload(Some(UploadedFile::new(
                    Some("second.png".to_string()),
                    "image/png",
                    fixtures::jpeg_bytes(128),
                )))
                .await
        });
        let generator = Arc::clone(&harness.session);
        let generate = tokio::spawn(async move { generator.generate().await });

        let uploaded = upload.await.unwrap();
        let generated = generate.await.unwrap();

        match uploaded {
            Ok(_) => {}
            Err(UploadError::Busy) => {}
            Err(e) => panic!("unexpected upload error: {e}"),
        }
        assert!(generated.is_ok());

        // A published clip was always made from the source on display.
        let source = harness.session.source().await.unwrap();
        if harness.session.output().await.is_some() {
            let writes = harness.engine.calls_of(MockOp::WriteFile).await;
            let MockCall::WriteFile { size, .. } = writes.last().unwrap() else {
                panic!("expected a write");
            };
            assert_eq!(*size, source.size_bytes);
        }
    }
}
