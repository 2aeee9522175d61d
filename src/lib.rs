//! Sound effect and background music bridge for game engines.
//!
//! Effects are fire-and-forget: `play_effect` returns an id, the effect plays
//! on its own backend player, and a periodic reaper releases it once it has
//! finished. Music is forwarded to a [`music::MusicBridge`].

pub mod assets;
pub mod audio_system;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod music;

pub use assets::{AssetStore, DirectoryAssetStore};
pub use audio_system::{EffectId, IdPolicy, INVALID_EFFECT_ID};
pub use config::{AudioConfig, BackendKind};
pub use engine::{EngineOptions, SoundEngine};
pub use error::{AudioError, ConfigError};
pub use messaging::{AudioEvent, EventBus, SubscriberId};
pub use music::{MusicBridge, NullMusicBridge, RodioMusicBridge};
