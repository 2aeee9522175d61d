/// Audio events
///
/// Events report things that have happened (past tense) and are broadcast to
/// every subscriber. `EffectFinished` and `EffectRestarted` are published
/// from the backend's audio thread; everything else from the caller's thread.
use crate::audio_system::EffectId;

#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// The backend engine and output mix were initialized
    BackendReady { backend: &'static str },

    /// Backend handles were released
    BackendShutdown,

    /// An effect voice was created and started
    EffectStarted {
        id: EffectId,
        path: String,
        looping: bool,
    },

    /// A non-looping effect reached the end of its content
    EffectFinished { id: EffectId },

    /// A looping effect reached the end and was started again
    EffectRestarted { id: EffectId },

    /// An effect was stopped by the caller
    EffectStopped { id: EffectId },

    /// A finished effect was evicted by the reaper
    EffectReaped { id: EffectId },

    /// The effects volume changed
    EffectsVolumeChanged { volume: f32 },
}

impl AudioEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            AudioEvent::BackendReady { backend } => format!("Backend ready: {}", backend),
            AudioEvent::BackendShutdown => "Backend shut down".to_string(),
            AudioEvent::EffectStarted { id, path, looping } => {
                if *looping {
                    format!("Effect {} started: {} (looping)", id, path)
                } else {
                    format!("Effect {} started: {}", id, path)
                }
            }
            AudioEvent::EffectFinished { id } => format!("Effect {} finished", id),
            AudioEvent::EffectRestarted { id } => format!("Effect {} restarted", id),
            AudioEvent::EffectStopped { id } => format!("Effect {} stopped", id),
            AudioEvent::EffectReaped { id } => format!("Effect {} reaped", id),
            AudioEvent::EffectsVolumeChanged { volume } => {
                format!("Effects volume: {:.2}", volume)
            }
        }
    }

    /// Effect the event is about, if any
    pub fn effect_id(&self) -> Option<EffectId> {
        match self {
            AudioEvent::EffectStarted { id, .. }
            | AudioEvent::EffectFinished { id }
            | AudioEvent::EffectRestarted { id }
            | AudioEvent::EffectStopped { id }
            | AudioEvent::EffectReaped { id } => Some(*id),
            _ => None,
        }
    }
}
