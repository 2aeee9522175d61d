/// Messaging module
///
/// Broadcasts audio lifecycle events to any number of subscribers.
///
/// ```text
/// ┌────────────┐  EffectStarted/Stopped/Reaped  ┌───────────┐
/// │ SoundEngine│ ─────────────────────────────> │           │     ┌─────────────┐
/// └────────────┘                                │ Event Bus │ ──> │ Subscribers │
/// ┌────────────┐  EffectFinished/Restarted      │           │     └─────────────┘
/// │ audio thrd │ ─────────────────────────────> │           │
/// └────────────┘                                └───────────┘
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let (rx, _id) = engine.subscribe();
/// engine.play_effect("sfx/boom.ogg", false);
///
/// while let Ok(event) = rx.try_recv() {
///     tracing::debug!("{}", event.description());
/// }
/// ```
pub mod bus;
pub mod events;

pub use bus::{EventBus, SubscriberId};
pub use events::AudioEvent;
