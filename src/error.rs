//! Library errors using thiserror for structured error handling.
//!
//! Construction errors abort a single playback request; call errors are
//! logged by the caller and otherwise ignored.

use std::fmt;

use thiserror::Error;

use crate::audio_system::backend::BackendStatus;

/// Step of backend or voice initialization that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitStage {
    CreateEngine,
    RealizeEngine,
    EngineInterface,
    CreateOutputMix,
    RealizeOutputMix,
    CreatePlayer,
    RealizePlayer,
    PlayInterface,
    SeekInterface,
    VolumeInterface,
    RegisterCallback,
    Start,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InitStage::CreateEngine => "create engine",
            InitStage::RealizeEngine => "realize engine",
            InitStage::EngineInterface => "get engine interface",
            InitStage::CreateOutputMix => "create output mix",
            InitStage::RealizeOutputMix => "realize output mix",
            InitStage::CreatePlayer => "create audio player",
            InitStage::RealizePlayer => "realize audio player",
            InitStage::PlayInterface => "get play interface",
            InitStage::SeekInterface => "get seek interface",
            InitStage::VolumeInterface => "get volume interface",
            InitStage::RegisterCallback => "register completion callback",
            InitStage::Start => "start playback",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to open asset: {path}")]
    AssetOpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Audio backend failed to {stage}")]
    BackendInitFailed {
        stage: InitStage,
        #[source]
        status: BackendStatus,
    },

    #[error("Audio backend call {call} failed")]
    BackendCallFailed {
        call: &'static str,
        #[source]
        status: BackendStatus,
    },
}

impl AudioError {
    /// Shorthand for mapping a backend status at a given init stage
    pub fn init(stage: InitStage) -> impl FnOnce(BackendStatus) -> Self {
        move |status| AudioError::BackendInitFailed { stage, status }
    }

    /// Shorthand for mapping a backend status from a state-transition call
    pub fn call(call: &'static str) -> impl FnOnce(BackendStatus) -> Self {
        move |status| AudioError::BackendCallFailed { call, status }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine the platform config directory")]
    NoConfigDir,

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
