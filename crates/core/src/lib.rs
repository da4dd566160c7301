pub mod assets;
pub mod config;
pub mod engine;
pub mod fade;
pub mod objects;
pub mod session;
pub mod testing;
pub mod upload;

pub use assets::{AssetRule, AssetRules};
pub use config::{
    load_config, load_config_from_str, validate_config, AssetsConfig, Config, ConfigError,
    SanitizedConfig, ServerConfig,
};
pub use engine::{
    DirEntry, Engine, EngineConfig, EngineError, EngineEvent, EventListener, FfmpegEngine,
    LoadOptions,
};
pub use fade::{FadeCommand, StagedNames};
pub use objects::{ObjectRef, ObjectStore, StoredObject};
pub use session::{
    EngineStatus, GenerateError, OutputVideo, Session, SessionEvent, SessionSnapshot,
    SessionUpdateCallback, DOWNLOAD_FILE_NAME,
};
pub use upload::{SourceImage, UploadError, UploadedFile};
