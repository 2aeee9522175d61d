/// Voice registry
///
/// Maps effect ids to playing voices and applies caller requests to them.
/// Every operation is best-effort: a voice whose backend call fails is
/// logged and skipped.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::context::EngineContext;
use super::voice::{Voice, VoiceRequest};
use super::volume::EffectVolume;
use super::{EffectId, FIRST_EFFECT_ID, INVALID_EFFECT_ID};
use crate::error::AudioError;
use crate::messaging::{AudioEvent, EventBus};

/// What happens to the id counter when every effect is stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    /// Ids are never handed out twice during the process lifetime
    #[default]
    ProcessUnique,

    /// Numbering restarts at 1 after `stop_all`; ids held from before
    /// become ambiguous
    ResetOnStopAll,
}

pub struct VoiceRegistry {
    voices: BTreeMap<EffectId, Voice>,
    next_id: EffectId,
    volume: EffectVolume,
    id_policy: IdPolicy,
    events: EventBus,
}

impl VoiceRegistry {
    pub fn new(id_policy: IdPolicy, effects_volume: f32, events: EventBus) -> Self {
        Self {
            voices: BTreeMap::new(),
            next_id: FIRST_EFFECT_ID,
            volume: EffectVolume::new(effects_volume),
            id_policy,
            events,
        }
    }

    /// Start an effect. Returns its id, or `INVALID_EFFECT_ID` on failure.
    ///
    /// The id is reserved before the voice is built; if building fails the
    /// id is discarded rather than handed to a later caller.
    pub fn play(&mut self, ctx: &mut EngineContext, path: &str, looping: bool) -> EffectId {
        if !ctx.ensure_ready() {
            return INVALID_EFFECT_ID;
        }
        let Some((handles, assets)) = ctx.parts_mut() else {
            return INVALID_EFFECT_ID;
        };

        let full_path = assets.full_path(path);
        let id = self.allocate_id();
        let request = VoiceRequest {
            id,
            path: &full_path,
            volume: self.volume.level(),
            looping,
        };

        match Voice::create(request, handles, assets, &self.events) {
            Ok(voice) => {
                self.voices.insert(id, voice);
                self.events.publish(AudioEvent::EffectStarted {
                    id,
                    path: full_path,
                    looping,
                });
                id
            }
            Err(e) => {
                log_failure(&format!("create player for {}", path), &e);
                INVALID_EFFECT_ID
            }
        }
    }

    /// Ids wrap back to `FIRST_EFFECT_ID` after `EffectId::MAX`; ids still
    /// held by live voices are skipped, so a live voice is never replaced.
    fn allocate_id(&mut self) -> EffectId {
        loop {
            let id = self.next_id;
            self.next_id = match self.next_id.checked_add(1) {
                Some(next) => next,
                None => FIRST_EFFECT_ID,
            };
            if !self.voices.contains_key(&id) {
                return id;
            }
        }
    }

    /// Clamp, store, and apply the effects volume to every voice
    pub fn set_effects_volume(&mut self, volume: f32) {
        self.volume.set_level(volume);
        let level = self.volume.attenuation();

        for (id, voice) in &self.voices {
            if let Err(e) = voice.set_volume_level(level) {
                log_failure(&format!("set volume of effect {}", id), &e);
            }
        }

        self.events.publish(AudioEvent::EffectsVolumeChanged {
            volume: self.volume.level(),
        });
    }

    pub fn effects_volume(&self) -> f32 {
        self.volume.level()
    }

    /// No-op when `id` is unknown (it may have been reaped already)
    pub fn pause(&mut self, id: EffectId) {
        if let Some(voice) = self.voices.get(&id) {
            if let Err(e) = voice.pause() {
                log_failure(&format!("pause effect {}", id), &e);
            }
        }
    }

    pub fn resume(&mut self, id: EffectId) {
        if let Some(voice) = self.voices.get(&id) {
            if let Err(e) = voice.resume() {
                log_failure(&format!("resume effect {}", id), &e);
            }
        }
    }

    /// Stop and destroy the voice
    pub fn stop(&mut self, id: EffectId) {
        if let Some(voice) = self.voices.remove(&id) {
            if let Err(e) = voice.stop() {
                log_failure(&format!("stop effect {}", id), &e);
            }
            voice.destroy();
            self.events.publish(AudioEvent::EffectStopped { id });
        }
    }

    pub fn pause_all(&mut self) {
        for (id, voice) in &self.voices {
            if let Err(e) = voice.pause() {
                log_failure(&format!("pause effect {}", id), &e);
            }
        }
    }

    pub fn resume_all(&mut self) {
        for (id, voice) in &self.voices {
            if let Err(e) = voice.resume() {
                log_failure(&format!("resume effect {}", id), &e);
            }
        }
    }

    /// Stop and destroy every voice
    pub fn stop_all(&mut self) {
        let voices = std::mem::take(&mut self.voices);
        for (id, voice) in voices {
            if let Err(e) = voice.stop() {
                log_failure(&format!("stop effect {}", id), &e);
            }
            voice.destroy();
            self.events.publish(AudioEvent::EffectStopped { id });
        }

        if self.id_policy == IdPolicy::ResetOnStopAll {
            self.next_id = FIRST_EFFECT_ID;
        }
        tracing::debug!("Stopped all effects");
    }

    /// Remove the first finished voice. Returns its id.
    pub fn reap_one(&mut self) -> Option<EffectId> {
        let id = self
            .voices
            .iter()
            .find(|(_, voice)| voice.is_finished())
            .map(|(id, _)| *id)?;

        if let Some(voice) = self.voices.remove(&id) {
            voice.destroy();
        }
        tracing::trace!("Reaped effect {}", id);
        self.events.publish(AudioEvent::EffectReaped { id });
        Some(id)
    }

    pub fn voice(&self, id: EffectId) -> Option<&Voice> {
        self.voices.get(&id)
    }

    pub fn contains(&self, id: EffectId) -> bool {
        self.voices.contains_key(&id)
    }

    /// `None` when the id is not registered
    pub fn is_finished(&self, id: EffectId) -> Option<bool> {
        self.voices.get(&id).map(Voice::is_finished)
    }

    /// Registered ids in ascending order
    pub fn ids(&self) -> Vec<EffectId> {
        self.voices.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

fn log_failure(action: &str, error: &AudioError) {
    match error {
        AudioError::BackendCallFailed { status, .. } | AudioError::BackendInitFailed { status, .. } => {
            tracing::warn!("Failed to {}: {} (error {})", action, error, status.code())
        }
        AudioError::AssetOpenFailed { source, .. } => {
            tracing::warn!("Failed to {}: {}: {}", action, error, source)
        }
    }
}
