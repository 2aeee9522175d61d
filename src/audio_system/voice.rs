/// Effect voice
///
/// One playing instance of a sound effect, backed by one backend player.
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::backend::{
    DataSource, InterfaceId, PlayCallback, PlayEvent, PlayInterface, PlayState, PlayerObject,
    SeekInterface, VolumeInterface,
};
use super::context::BackendHandles;
use super::volume::{to_attenuation_units, Millibel};
use super::EffectId;
use crate::assets::{bundle_relative, AssetDescriptor, AssetStore};
use crate::error::{AudioError, InitStage};
use crate::messaging::{AudioEvent, EventBus};

/// Interfaces every effect player must expose
const REQUIRED_INTERFACES: [InterfaceId; 3] = [
    InterfaceId::Seek,
    InterfaceId::PrefetchStatus,
    InterfaceId::Volume,
];

/// What to play
#[derive(Debug, Clone, Copy)]
pub struct VoiceRequest<'a> {
    pub id: EffectId,
    /// Absolute file path, or bundled asset path (optionally `assets/`-prefixed)
    pub path: &'a str,
    pub volume: f32,
    pub looping: bool,
}

/// A playing sound effect.
///
/// Fields drop in declaration order: interfaces first, then the player
/// object, then the asset descriptor it reads from.
pub struct Voice {
    id: EffectId,
    source: String,
    looping: bool,
    finished: Arc<AtomicBool>,
    play: Arc<dyn PlayInterface>,
    _seek: Box<dyn SeekInterface>,
    volume: Box<dyn VolumeInterface>,
    _player: Box<dyn PlayerObject>,
    _asset: Option<AssetDescriptor>,
}

impl Voice {
    /// Create a player for `request`, start it, and subscribe to its end.
    ///
    /// Anything acquired before a failing step is released on return.
    pub fn create(
        request: VoiceRequest<'_>,
        handles: &mut BackendHandles,
        assets: &dyn AssetStore,
        events: &EventBus,
    ) -> Result<Self, AudioError> {
        let VoiceRequest {
            id,
            path,
            volume,
            looping,
        } = request;

        let asset = if Path::new(path).is_absolute() {
            None
        } else {
            let relative = bundle_relative(path);
            let descriptor = assets
                .open(relative)
                .map_err(|source| AudioError::AssetOpenFailed {
                    path: relative.to_string(),
                    source,
                })?;
            Some(descriptor)
        };

        let source = match &asset {
            Some(descriptor) => DataSource::AssetFd {
                file: &descriptor.file,
                offset: descriptor.offset,
                length: descriptor.length,
            },
            None => DataSource::Uri(Path::new(path)),
        };

        let mut player = handles
            .engine
            .create_player(&source, handles.output_mix.as_ref(), &REQUIRED_INTERFACES)
            .map_err(AudioError::init(InitStage::CreatePlayer))?;
        player
            .realize()
            .map_err(AudioError::init(InitStage::RealizePlayer))?;

        let play = player
            .play_interface()
            .map_err(AudioError::init(InitStage::PlayInterface))?;
        let seek = player
            .seek_interface()
            .map_err(AudioError::init(InitStage::SeekInterface))?;
        let volume_itf = player
            .volume_interface()
            .map_err(AudioError::init(InitStage::VolumeInterface))?;

        if looping {
            if let Err(status) = seek.set_loop(true, 0, None) {
                tracing::debug!("Native looping unavailable for {} ({}), relying on restart", path, status);
            }
        }

        let level = to_attenuation_units(volume);
        if let Err(status) = volume_itf.set_volume_level(level) {
            tracing::warn!("Failed to set initial volume for {}: {} ({})", path, status, status.code());
        }

        let finished = Arc::new(AtomicBool::new(false));
        let callback = completion_callback(
            id,
            looping,
            Arc::downgrade(&play),
            Arc::clone(&finished),
            events.clone(),
        );
        play.register_callback(callback)
            .map_err(AudioError::init(InitStage::RegisterCallback))?;
        play.set_callback_events_mask(&[PlayEvent::HeadAtEnd])
            .map_err(AudioError::init(InitStage::RegisterCallback))?;

        play.set_play_state(PlayState::Playing)
            .map_err(AudioError::init(InitStage::Start))?;

        tracing::debug!(
            "Created voice {} for {} (volume={}, level={}mB, loop={})",
            id,
            path,
            volume,
            level,
            looping
        );

        Ok(Self {
            id,
            source: path.to_string(),
            looping,
            finished,
            play,
            _seek: seek,
            volume: volume_itf,
            _player: player,
            _asset: asset,
        })
    }

    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Path the voice was created from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Whether the content played to its end. Never set on looping voices.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn play_state(&self) -> PlayState {
        self.play.play_state()
    }

    pub fn pause(&self) -> Result<(), AudioError> {
        self.play
            .set_play_state(PlayState::Paused)
            .map_err(AudioError::call("pause"))
    }

    /// No-op once the voice has finished; only the completion callback
    /// restarts content that reached its end.
    pub fn resume(&self) -> Result<(), AudioError> {
        if self.is_finished() {
            return Ok(());
        }
        self.play
            .set_play_state(PlayState::Playing)
            .map_err(AudioError::call("resume"))
    }

    pub fn stop(&self) -> Result<(), AudioError> {
        self.play
            .set_play_state(PlayState::Stopped)
            .map_err(AudioError::call("stop"))
    }

    pub fn set_volume_level(&self, level: Millibel) -> Result<(), AudioError> {
        self.volume
            .set_volume_level(level)
            .map_err(AudioError::call("set volume"))
    }

    pub fn volume_level(&self) -> Millibel {
        self.volume.volume_level()
    }

    /// Release the player and any asset descriptor
    pub fn destroy(self) {
        drop(self);
    }
}

impl Drop for Voice {
    fn drop(&mut self) {
        tracing::trace!("Destroying voice {} ({})", self.id, self.source);
    }
}

/// Runs on the backend's thread. Looping voices restart themselves, others
/// raise their finished flag for the reaper.
fn completion_callback(
    id: EffectId,
    looping: bool,
    play: Weak<dyn PlayInterface>,
    finished: Arc<AtomicBool>,
    events: EventBus,
) -> PlayCallback {
    Box::new(move |event: PlayEvent| {
        if event != PlayEvent::HeadAtEnd {
            return;
        }

        if !looping {
            finished.store(true, Ordering::Release);
            events.publish(AudioEvent::EffectFinished { id });
            return;
        }

        // Native looping is unreliable on some devices, so restart by hand
        let Some(play) = play.upgrade() else {
            return;
        };
        match play.set_play_state(PlayState::Playing) {
            Ok(()) => events.publish(AudioEvent::EffectRestarted { id }),
            Err(status) => tracing::warn!("Failed to restart looping voice {}: {}", id, status),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::DirectoryAssetStore;
    use crate::audio_system::backend::{HeadlessBackend, SourceInfo};
    use crate::audio_system::volume::MILLIBEL_MIN;
    use std::fs;

    struct Fixture {
        backend: HeadlessBackend,
        handles: BackendHandles,
        assets: DirectoryAssetStore,
        events: EventBus,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sfx")).unwrap();
        fs::write(dir.path().join("sfx/boom.ogg"), b"boom-bytes").unwrap();

        let mut backend = HeadlessBackend::new();
        let probe = backend.clone();
        let handles = BackendHandles::create(&mut backend).unwrap();
        Fixture {
            backend: probe,
            handles,
            assets: DirectoryAssetStore::new(dir.path()),
            events: EventBus::new(),
            _dir: dir,
        }
    }

    fn request(path: &str, looping: bool) -> VoiceRequest<'_> {
        VoiceRequest {
            id: 1,
            path,
            volume: 1.0,
            looping,
        }
    }

    #[test]
    fn test_bundled_asset_is_opened_as_descriptor() {
        let mut fx = fixture();
        let voice = Voice::create(
            request("assets/sfx/boom.ogg", false),
            &mut fx.handles,
            &fx.assets,
            &fx.events,
        )
        .unwrap();

        let players = fx.backend.players();
        assert_eq!(players.len(), 1);
        assert_eq!(
            players[0].source(),
            &SourceInfo::Asset {
                offset: 0,
                length: 10
            }
        );
        assert_eq!(voice.play_state(), PlayState::Playing);
        assert_eq!(voice.source(), "assets/sfx/boom.ogg");
    }

    #[test]
    fn test_absolute_path_is_a_uri() {
        let mut fx = fixture();
        let _voice = Voice::create(
            request("/music/jingle.ogg", false),
            &mut fx.handles,
            &fx.assets,
            &fx.events,
        )
        .unwrap();

        assert_eq!(
            fx.backend.players()[0].source(),
            &SourceInfo::Uri("/music/jingle.ogg".into())
        );
    }

    #[test]
    fn test_missing_asset() {
        let mut fx = fixture();
        let result = Voice::create(
            request("sfx/missing.ogg", false),
            &mut fx.handles,
            &fx.assets,
            &fx.events,
        );
        match result {
            Err(AudioError::AssetOpenFailed { path, .. }) => assert_eq!(path, "sfx/missing.ogg"),
            Err(other) => panic!("Expected AssetOpenFailed, got {}", other),
            Ok(_) => panic!("Expected AssetOpenFailed"),
        }
        assert_eq!(fx.backend.live_players(), 0);
    }

    #[test]
    fn test_partial_construction_is_released() {
        for stage in [
            InitStage::CreatePlayer,
            InitStage::RealizePlayer,
            InitStage::PlayInterface,
            InitStage::SeekInterface,
            InitStage::VolumeInterface,
        ] {
            let mut fx = fixture();
            fx.backend.fail_at(stage);
            let result = Voice::create(
                request("sfx/boom.ogg", false),
                &mut fx.handles,
                &fx.assets,
                &fx.events,
            );
            match result {
                Err(AudioError::BackendInitFailed { stage: failed, .. }) => assert_eq!(failed, stage),
                _ => panic!("Expected BackendInitFailed at {}", stage),
            }
            assert_eq!(fx.backend.live_players(), 0, "player leaked at {}", stage);
        }
    }

    #[test]
    fn test_volume_applied_through_codec() {
        let mut fx = fixture();
        let mut req = request("sfx/boom.ogg", false);
        req.volume = 0.0;
        let voice = Voice::create(req, &mut fx.handles, &fx.assets, &fx.events).unwrap();
        assert_eq!(voice.volume_level(), MILLIBEL_MIN);
        assert_eq!(fx.backend.players()[0].volume_level(), MILLIBEL_MIN);
    }

    #[test]
    fn test_completion_sets_finished() {
        let mut fx = fixture();
        let (rx, _id) = fx.events.subscribe();
        let voice = Voice::create(
            request("sfx/boom.ogg", false),
            &mut fx.handles,
            &fx.assets,
            &fx.events,
        )
        .unwrap();
        assert!(!voice.is_finished());

        fx.backend.players()[0].reach_end();
        assert!(voice.is_finished());
        assert_eq!(rx.try_recv().unwrap(), AudioEvent::EffectFinished { id: 1 });
    }

    #[test]
    fn test_looping_voice_restarts() {
        let mut fx = fixture();
        let voice = Voice::create(
            request("sfx/boom.ogg", true),
            &mut fx.handles,
            &fx.assets,
            &fx.events,
        )
        .unwrap();
        let players = fx.backend.players();
        let probe = &players[0];
        assert!(probe.is_looping());

        probe.reach_end();
        probe.reach_end();
        assert!(!voice.is_finished());
        assert_eq!(probe.restarts(), 2);
        assert_eq!(voice.play_state(), PlayState::Playing);
    }

    #[test]
    fn test_destroy_releases_player() {
        let mut fx = fixture();
        let voice = Voice::create(
            request("sfx/boom.ogg", false),
            &mut fx.handles,
            &fx.assets,
            &fx.events,
        )
        .unwrap();
        assert_eq!(fx.backend.live_players(), 1);

        voice.destroy();
        assert_eq!(fx.backend.live_players(), 0);
    }

    #[test]
    fn test_state_calls_report_failure() {
        let mut fx = fixture();
        let voice = Voice::create(
            request("sfx/boom.ogg", false),
            &mut fx.handles,
            &fx.assets,
            &fx.events,
        )
        .unwrap();

        fx.backend.fail_state_calls(true);
        assert!(matches!(
            voice.pause(),
            Err(AudioError::BackendCallFailed { call: "pause", .. })
        ));
        fx.backend.fail_state_calls(false);
        assert!(voice.pause().is_ok());
        assert_eq!(voice.play_state(), PlayState::Paused);
        assert!(voice.resume().is_ok());
        assert_eq!(voice.play_state(), PlayState::Playing);
    }
}
