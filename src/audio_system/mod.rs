/// Sound effect system
///
/// Plays short fire-and-forget effects, many at once, each on its own
/// backend player. Callers get an integer id back and use it to pause,
/// resume or stop the effect; finished effects are retired by a periodic
/// reaper so their native resources are released promptly.
///
/// ## Architecture
///
/// ```text
/// EngineContext (backend, engine, output mix, asset store)
///   │
///   ├── VoiceRegistry ── id ──> Voice ──> PlayerObject
///   │                                      ├── PlayInterface ──> completion callback
///   │                                      ├── SeekInterface        (finished flag / restart)
///   │                                      └── VolumeInterface
///   │
///   └── Reaper (ticks with the host loop, evicts one finished voice)
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let id = registry.play(&mut ctx, "sfx/coin.ogg", false);
/// registry.set_effects_volume(0.5);
///
/// // Once per frame
/// if let Some(reaper) = ctx.reaper_mut() {
///     reaper.update(dt, &mut registry);
/// }
/// ```
pub mod backend;
pub mod context;
pub mod reaper;
pub mod registry;
pub mod voice;
pub mod volume;

/// Handle returned to callers for a playing effect
pub type EffectId = u32;

/// Returned by play requests that failed
pub const INVALID_EFFECT_ID: EffectId = 0;

/// First id handed out, and where numbering restarts under
/// [`IdPolicy::ResetOnStopAll`]
pub const FIRST_EFFECT_ID: EffectId = 1;

// Re-export commonly used types
pub use backend::{AudioBackend, BackendStatus, HeadlessBackend, PlayState, RodioBackend};
pub use context::{BackendHandles, EngineContext, DEFAULT_REAPER_INTERVAL};
pub use reaper::Reaper;
pub use registry::{IdPolicy, VoiceRegistry};
pub use voice::{Voice, VoiceRequest};
pub use volume::{to_attenuation_units, EffectVolume, Millibel, MILLIBEL_MAX, MILLIBEL_MIN};
