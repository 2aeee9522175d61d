/// Sound engine facade
///
/// The surface a game's audio layer talks to. Owns the backend context, the
/// voice registry, the music bridge and the event bus; there is no global
/// state, so several engines can coexist (one per test, for instance).
///
/// All calls are expected from one thread. Completion callbacks arrive on the
/// backend's thread and only touch per-voice atomics and the event bus.
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::assets::{AssetStore, DirectoryAssetStore};
use crate::audio_system::backend::{AudioBackend, HeadlessBackend, RodioBackend};
use crate::audio_system::context::{EngineContext, DEFAULT_REAPER_INTERVAL};
use crate::audio_system::registry::{IdPolicy, VoiceRegistry};
use crate::audio_system::{EffectId, INVALID_EFFECT_ID};
use crate::config::{AudioConfig, BackendKind};
use crate::messaging::{AudioEvent, EventBus, SubscriberId};
use crate::music::{MusicBridge, NullMusicBridge, RodioMusicBridge};

/// Tunables for a `SoundEngine`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    pub reaper_interval: Duration,
    pub effects_volume: f32,
    pub id_policy: IdPolicy,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            reaper_interval: DEFAULT_REAPER_INTERVAL,
            effects_volume: 1.0,
            id_policy: IdPolicy::default(),
        }
    }
}

impl From<&AudioConfig> for EngineOptions {
    fn from(config: &AudioConfig) -> Self {
        Self {
            reaper_interval: config.reaper_interval(),
            effects_volume: config.effects_volume,
            id_policy: config.id_policy,
        }
    }
}

pub struct SoundEngine {
    // Voices must drop before the context's output mix and engine
    registry: VoiceRegistry,
    context: EngineContext,
    bridge: Box<dyn MusicBridge>,
    events: EventBus,
    ended: bool,
}

impl SoundEngine {
    /// The backend is not touched until the first effect is played.
    pub fn new(
        backend: Box<dyn AudioBackend>,
        assets: Arc<dyn AssetStore>,
        bridge: Box<dyn MusicBridge>,
        options: EngineOptions,
    ) -> Self {
        let events = EventBus::new();
        Self {
            registry: VoiceRegistry::new(
                options.id_policy,
                options.effects_volume,
                events.clone(),
            ),
            context: EngineContext::new(backend, assets, options.reaper_interval, events.clone()),
            bridge,
            events,
            ended: false,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        let assets: Arc<dyn AssetStore> = Arc::new(
            DirectoryAssetStore::new(&config.asset_root)
                .with_search_dirs(config.search_dirs.clone()),
        );

        let (backend, bridge): (Box<dyn AudioBackend>, Box<dyn MusicBridge>) = match config.backend
        {
            BackendKind::Rodio => (
                Box::new(RodioBackend::new()),
                Box::new(RodioMusicBridge::new(Arc::clone(&assets))),
            ),
            BackendKind::Headless => (
                Box::new(HeadlessBackend::new()),
                Box::new(NullMusicBridge::default()),
            ),
        };

        tracing::debug!(
            "Sound engine configured: backend={:?}, assets={}",
            config.backend,
            config.asset_root.display()
        );
        Self::new(backend, assets, bridge, EngineOptions::from(config))
    }

    // ----- Effects -----

    /// Start an effect; returns its id, or `INVALID_EFFECT_ID` if it could
    /// not be started or the engine has ended
    pub fn play_effect(&mut self, path: &str, looping: bool) -> EffectId {
        if self.ended {
            tracing::debug!("Ignoring play of {} after end", path);
            return INVALID_EFFECT_ID;
        }
        self.registry.play(&mut self.context, path, looping)
    }

    pub fn set_effects_volume(&mut self, volume: f32) {
        self.registry.set_effects_volume(volume);
    }

    pub fn effects_volume(&self) -> f32 {
        self.registry.effects_volume()
    }

    pub fn pause_effect(&mut self, id: EffectId) {
        self.registry.pause(id);
    }

    pub fn resume_effect(&mut self, id: EffectId) {
        self.registry.resume(id);
    }

    pub fn stop_effect(&mut self, id: EffectId) {
        self.registry.stop(id);
    }

    pub fn pause_all_effects(&mut self) {
        self.registry.pause_all();
    }

    pub fn resume_all_effects(&mut self) {
        self.registry.resume_all();
    }

    pub fn stop_all_effects(&mut self) {
        self.registry.stop_all();
    }

    /// Effects are read when played, so there is nothing to do here
    pub fn preload_effect(&mut self, path: &str) {
        tracing::trace!("Preload effect {} (no-op)", path);
    }

    pub fn unload_effect(&mut self, path: &str) {
        tracing::trace!("Unload effect {} (no-op)", path);
    }

    /// Host scheduler hook; call once per frame with the frame time.
    ///
    /// Returns the id of an effect retired on this tick.
    pub fn update(&mut self, dt: Duration) -> Option<EffectId> {
        let Self {
            registry, context, ..
        } = self;
        context.reaper_mut()?.update(dt, registry)
    }

    // ----- Background music -----

    pub fn preload_background_music(&mut self, path: &str) {
        if !self.ended {
            self.bridge.preload(path);
        }
    }

    pub fn play_background_music(&mut self, path: &str, looping: bool) {
        if !self.ended {
            self.bridge.play(path, looping);
        }
    }

    pub fn stop_background_music(&mut self) {
        self.bridge.stop();
    }

    pub fn pause_background_music(&mut self) {
        self.bridge.pause();
    }

    pub fn resume_background_music(&mut self) {
        if !self.ended {
            self.bridge.resume();
        }
    }

    pub fn rewind_background_music(&mut self) {
        if !self.ended {
            self.bridge.rewind();
        }
    }

    pub fn is_background_music_playing(&self) -> bool {
        self.bridge.is_playing()
    }

    pub fn background_music_volume(&self) -> f32 {
        self.bridge.volume()
    }

    pub fn set_background_music_volume(&mut self, volume: f32) {
        self.bridge.set_volume(volume);
    }

    // ----- Lifecycle -----

    /// End music, destroy every effect and release the backend. Later play
    /// requests return `INVALID_EFFECT_ID`.
    pub fn end(&mut self) {
        if self.ended {
            return;
        }
        self.context
            .shutdown(&mut self.registry, self.bridge.as_mut());
        self.ended = true;
        tracing::info!("Sound engine ended");
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn subscribe(&self) -> (Receiver<AudioEvent>, SubscriberId) {
        self.events.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.events.unsubscribe(id);
    }

    // ----- Queries -----

    /// Ids of registered effects, ascending
    pub fn active_effects(&self) -> Vec<EffectId> {
        self.registry.ids()
    }

    pub fn effect_count(&self) -> usize {
        self.registry.len()
    }

    /// `None` for unknown (or already retired) ids
    pub fn is_effect_finished(&self, id: EffectId) -> Option<bool> {
        self.registry.is_finished(id)
    }

    pub fn backend_name(&self) -> &'static str {
        self.context.backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn engine(backend: &HeadlessBackend, dir: &tempfile::TempDir) -> SoundEngine {
        SoundEngine::new(
            Box::new(backend.clone()),
            Arc::new(DirectoryAssetStore::new(dir.path())),
            Box::new(NullMusicBridge::default()),
            EngineOptions::default(),
        )
    }

    #[test]
    fn test_backend_initialized_lazily() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("coin.wav"), b"coin").unwrap();
        let backend = HeadlessBackend::new();
        let mut engine = engine(&backend, &dir);

        engine.set_effects_volume(0.5);
        assert_eq!(backend.engines_created(), 0);
        assert_eq!(engine.update(Duration::from_secs(1)), None);

        assert_eq!(engine.play_effect("coin.wav", false), 1);
        assert_eq!(backend.engines_created(), 1);
        assert_eq!(engine.backend_name(), "headless");
    }

    #[test]
    fn test_update_retires_finished_effect() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("coin.wav"), b"coin").unwrap();
        let backend = HeadlessBackend::new();
        let mut engine = engine(&backend, &dir);

        let id = engine.play_effect("coin.wav", false);
        backend.players()[0].reach_end();
        assert_eq!(engine.is_effect_finished(id), Some(true));

        assert_eq!(engine.update(Duration::from_millis(50)), None);
        assert_eq!(engine.update(Duration::from_millis(50)), Some(id));
        assert_eq!(engine.effect_count(), 0);
        assert_eq!(engine.is_effect_finished(id), None);
    }

    #[test]
    fn test_end_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("coin.wav"), b"coin").unwrap();
        let backend = HeadlessBackend::new();
        let mut engine = engine(&backend, &dir);

        engine.play_effect("coin.wav", true);
        engine.play_background_music("bgm.mp3", true);
        assert!(engine.is_background_music_playing());

        engine.end();
        engine.end();
        assert!(engine.is_ended());
        assert!(!engine.is_background_music_playing());
        assert_eq!(backend.live_players(), 0);
        assert_eq!(backend.live_engines(), 0);
        assert_eq!(engine.play_effect("coin.wav", false), INVALID_EFFECT_ID);
        assert_eq!(backend.engines_created(), 1);
    }

    #[test]
    fn test_from_config_headless() {
        let config = AudioConfig {
            backend: BackendKind::Headless,
            reaper_interval_ms: 250,
            effects_volume: 0.75,
            ..AudioConfig::default()
        };
        let engine = SoundEngine::from_config(&config);
        assert_eq!(engine.backend_name(), "headless");
        assert_eq!(engine.effects_volume(), 0.75);
    }
}
