/// Low-level audio backend abstraction
///
/// Models an object/interface audio API: objects are created, realized, and
/// then expose capability interfaces. Every object releases its native
/// resources when dropped.
///
/// ```text
/// AudioBackend
///   └── EngineObject ── realize ── EngineInterface
///                                    ├── OutputMixObject ── realize
///                                    └── PlayerObject ── realize
///                                          ├── PlayInterface   (state, completion callback)
///                                          ├── SeekInterface   (looping)
///                                          └── VolumeInterface (millibel level)
/// ```
pub mod headless;
pub mod rodio;

use std::any::Any;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use super::volume::Millibel;

pub use self::headless::{HeadlessBackend, HeadlessPlayer, SourceInfo};
pub use self::rodio::RodioBackend;

/// Non-success result codes reported by a backend call
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStatus {
    #[error("preconditions violated")]
    PreconditionsViolated,

    #[error("parameter invalid")]
    ParameterInvalid,

    #[error("memory failure")]
    MemoryFailure,

    #[error("resource error")]
    ResourceError,

    #[error("i/o error")]
    IoError,

    #[error("content corrupted")]
    ContentCorrupted,

    #[error("content unsupported")]
    ContentUnsupported,

    #[error("content not found")]
    ContentNotFound,

    #[error("feature unsupported")]
    FeatureUnsupported,

    #[error("internal error")]
    InternalError,
}

impl BackendStatus {
    /// Numeric result code, as logged alongside failures
    pub fn code(&self) -> u32 {
        match self {
            BackendStatus::PreconditionsViolated => 1,
            BackendStatus::ParameterInvalid => 2,
            BackendStatus::MemoryFailure => 3,
            BackendStatus::ResourceError => 4,
            BackendStatus::IoError => 6,
            BackendStatus::ContentCorrupted => 8,
            BackendStatus::ContentUnsupported => 9,
            BackendStatus::ContentNotFound => 10,
            BackendStatus::FeatureUnsupported => 12,
            BackendStatus::InternalError => 13,
        }
    }
}

/// Playback state of a player object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

/// Events a play interface can report through its callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayEvent {
    /// Playback head reached the end of the content
    HeadAtEnd,
    HeadAtMarker,
    HeadAtNewPos,
    HeadMoving,
    HeadStalled,
}

/// Capability interfaces a player can be asked for at creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceId {
    Play,
    Seek,
    PrefetchStatus,
    Volume,
}

/// Where a player reads its content from
#[derive(Debug, Clone, Copy)]
pub enum DataSource<'a> {
    /// A file addressed directly by path
    Uri(&'a Path),

    /// A byte range of an already-open descriptor (bundled asset)
    AssetFd {
        file: &'a File,
        offset: u64,
        length: u64,
    },
}

/// Callback invoked by the backend, possibly from its own audio thread
pub type PlayCallback = Box<dyn Fn(PlayEvent) + Send + Sync>;

/// Entry point of a backend implementation
pub trait AudioBackend {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn create_engine(&mut self) -> Result<Box<dyn EngineObject>, BackendStatus>;
}

pub trait EngineObject {
    fn realize(&mut self) -> Result<(), BackendStatus>;

    /// Fetch the interface used to create other objects
    fn engine_interface(&mut self) -> Result<Box<dyn EngineInterface>, BackendStatus>;
}

pub trait EngineInterface {
    fn create_output_mix(&mut self) -> Result<Box<dyn OutputMixObject>, BackendStatus>;

    /// Create a player bound to `output_mix`. Every interface in `required`
    /// must be obtainable from the realized player or creation fails.
    fn create_player(
        &mut self,
        source: &DataSource<'_>,
        output_mix: &dyn OutputMixObject,
        required: &[InterfaceId],
    ) -> Result<Box<dyn PlayerObject>, BackendStatus>;
}

pub trait OutputMixObject {
    fn realize(&mut self) -> Result<(), BackendStatus>;

    /// Lets a backend recover its own concrete mix type
    fn as_any(&self) -> &dyn Any;
}

pub trait PlayerObject {
    fn realize(&mut self) -> Result<(), BackendStatus>;

    fn play_interface(&mut self) -> Result<Arc<dyn PlayInterface>, BackendStatus>;

    fn seek_interface(&mut self) -> Result<Box<dyn SeekInterface>, BackendStatus>;

    fn volume_interface(&mut self) -> Result<Box<dyn VolumeInterface>, BackendStatus>;
}

/// Play state control and completion notification.
///
/// Shared with the completion callback, so implementations must be callable
/// from the backend's audio thread.
pub trait PlayInterface: Send + Sync {
    fn set_play_state(&self, state: PlayState) -> Result<(), BackendStatus>;

    fn play_state(&self) -> PlayState;

    fn register_callback(&self, callback: PlayCallback) -> Result<(), BackendStatus>;

    /// Restrict which events reach the registered callback
    fn set_callback_events_mask(&self, events: &[PlayEvent]) -> Result<(), BackendStatus>;
}

pub trait SeekInterface {
    /// Loop between `start_ms` and `end_ms` (`None` = end of content)
    fn set_loop(&self, enabled: bool, start_ms: u32, end_ms: Option<u32>)
        -> Result<(), BackendStatus>;
}

pub trait VolumeInterface {
    fn set_volume_level(&self, level: Millibel) -> Result<(), BackendStatus>;

    fn volume_level(&self) -> Millibel;
}
