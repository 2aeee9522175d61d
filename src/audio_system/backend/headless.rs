/// Headless backend
///
/// Renders nothing. Records every state transition so hosts without an audio
/// device (servers, CI) can still drive the effect registry, and lets callers
/// simulate end-of-stream or inject failures at any initialization stage.
///
/// Like some real devices, its native looping is unreliable: reaching the end
/// always pauses the player and reports `HeadAtEnd`, even when looping was
/// requested through the seek interface.
use std::any::Any;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::{
    AudioBackend, BackendStatus, DataSource, EngineInterface, EngineObject, InterfaceId,
    OutputMixObject, PlayCallback, PlayEvent, PlayInterface, PlayState, PlayerObject,
    SeekInterface, VolumeInterface,
};
use crate::audio_system::volume::Millibel;
use crate::error::InitStage;

/// Content a headless player was created for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInfo {
    Uri(PathBuf),
    Asset { offset: u64, length: u64 },
}

#[derive(Default)]
struct Shared {
    failures: Mutex<HashSet<InitStage>>,
    failing_calls: AtomicBool,
    clip_length: Mutex<Option<Duration>>,
    players: Mutex<Vec<Weak<HeadlessPlay>>>,
    engines_created: AtomicUsize,
    live_engines: AtomicUsize,
    live_output_mixes: AtomicUsize,
    live_players: AtomicUsize,
}

impl Shared {
    fn check(&self, stage: InitStage) -> Result<(), BackendStatus> {
        if self.failures.lock().contains(&stage) {
            Err(BackendStatus::InternalError)
        } else {
            Ok(())
        }
    }

    fn check_call(&self) -> Result<(), BackendStatus> {
        if self.failing_calls.load(Ordering::Acquire) {
            Err(BackendStatus::PreconditionsViolated)
        } else {
            Ok(())
        }
    }
}

/// Backend handle. Clones share state, so a caller can keep one clone as a
/// probe after handing another to the engine.
#[derive(Clone, Default)]
pub struct HeadlessBackend {
    shared: Arc<Shared>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Players reach the end on their own after `length` of playing
    pub fn with_clip_length(self, length: Duration) -> Self {
        *self.shared.clip_length.lock() = Some(length);
        self
    }

    /// Make every future attempt at `stage` fail until cleared
    pub fn fail_at(&self, stage: InitStage) {
        self.shared.failures.lock().insert(stage);
    }

    pub fn clear_failures(&self) {
        self.shared.failures.lock().clear();
    }

    /// Make play-state and volume calls on live players fail
    pub fn fail_state_calls(&self, failing: bool) {
        self.shared.failing_calls.store(failing, Ordering::Release);
    }

    /// Probes for every player that has not been destroyed, in creation order
    pub fn players(&self) -> Vec<HeadlessPlayer> {
        let mut players = self.shared.players.lock();
        players.retain(|weak| weak.strong_count() > 0);
        players
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|play| !play.destroyed.load(Ordering::Acquire))
            .map(|play| HeadlessPlayer { play })
            .collect()
    }

    pub fn engines_created(&self) -> usize {
        self.shared.engines_created.load(Ordering::Acquire)
    }

    pub fn live_engines(&self) -> usize {
        self.shared.live_engines.load(Ordering::Acquire)
    }

    pub fn live_output_mixes(&self) -> usize {
        self.shared.live_output_mixes.load(Ordering::Acquire)
    }

    pub fn live_players(&self) -> usize {
        self.shared.live_players.load(Ordering::Acquire)
    }
}

impl AudioBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn create_engine(&mut self) -> Result<Box<dyn EngineObject>, BackendStatus> {
        self.shared.check(InitStage::CreateEngine)?;
        self.shared.engines_created.fetch_add(1, Ordering::AcqRel);
        self.shared.live_engines.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(HeadlessEngine {
            shared: Arc::clone(&self.shared),
            realized: false,
        }))
    }
}

struct HeadlessEngine {
    shared: Arc<Shared>,
    realized: bool,
}

impl EngineObject for HeadlessEngine {
    fn realize(&mut self) -> Result<(), BackendStatus> {
        self.shared.check(InitStage::RealizeEngine)?;
        self.realized = true;
        Ok(())
    }

    fn engine_interface(&mut self) -> Result<Box<dyn EngineInterface>, BackendStatus> {
        if !self.realized {
            return Err(BackendStatus::PreconditionsViolated);
        }
        self.shared.check(InitStage::EngineInterface)?;
        Ok(Box::new(HeadlessEngineInterface {
            shared: Arc::clone(&self.shared),
        }))
    }
}

impl Drop for HeadlessEngine {
    fn drop(&mut self) {
        self.shared.live_engines.fetch_sub(1, Ordering::AcqRel);
    }
}

struct HeadlessEngineInterface {
    shared: Arc<Shared>,
}

impl EngineInterface for HeadlessEngineInterface {
    fn create_output_mix(&mut self) -> Result<Box<dyn OutputMixObject>, BackendStatus> {
        self.shared.check(InitStage::CreateOutputMix)?;
        self.shared.live_output_mixes.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(HeadlessOutputMix {
            shared: Arc::clone(&self.shared),
            realized: false,
        }))
    }

    fn create_player(
        &mut self,
        source: &DataSource<'_>,
        output_mix: &dyn OutputMixObject,
        required: &[InterfaceId],
    ) -> Result<Box<dyn PlayerObject>, BackendStatus> {
        let mix = output_mix
            .as_any()
            .downcast_ref::<HeadlessOutputMix>()
            .ok_or(BackendStatus::ParameterInvalid)?;
        if !mix.realized {
            return Err(BackendStatus::PreconditionsViolated);
        }
        self.shared.check(InitStage::CreatePlayer)?;

        let source = match *source {
            DataSource::Uri(path) => SourceInfo::Uri(path.to_path_buf()),
            DataSource::AssetFd { offset, length, .. } => SourceInfo::Asset { offset, length },
        };
        let clip_length = *self.shared.clip_length.lock();
        let play = Arc::new_cyclic(|this| HeadlessPlay {
            this: this.clone(),
            source,
            clip_length,
            shared: Arc::clone(&self.shared),
            state: Mutex::new(PlayerState::default()),
            callback: Mutex::new(None),
            mask: Mutex::new(Vec::new()),
            looping: AtomicBool::new(false),
            restarts: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
            failing: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        });
        self.shared.players.lock().push(Arc::downgrade(&play));
        self.shared.live_players.fetch_add(1, Ordering::AcqRel);

        Ok(Box::new(HeadlessPlayerObject {
            shared: Arc::clone(&self.shared),
            play,
            required: required.to_vec(),
            realized: false,
        }))
    }
}

struct HeadlessOutputMix {
    shared: Arc<Shared>,
    realized: bool,
}

impl OutputMixObject for HeadlessOutputMix {
    fn realize(&mut self) -> Result<(), BackendStatus> {
        self.shared.check(InitStage::RealizeOutputMix)?;
        self.realized = true;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for HeadlessOutputMix {
    fn drop(&mut self) {
        self.shared.live_output_mixes.fetch_sub(1, Ordering::AcqRel);
    }
}

struct HeadlessPlayerObject {
    shared: Arc<Shared>,
    play: Arc<HeadlessPlay>,
    required: Vec<InterfaceId>,
    realized: bool,
}

impl HeadlessPlayerObject {
    fn interface(&self, id: InterfaceId, stage: InitStage) -> Result<(), BackendStatus> {
        if !self.realized {
            return Err(BackendStatus::PreconditionsViolated);
        }
        if id != InterfaceId::Play && !self.required.contains(&id) {
            return Err(BackendStatus::FeatureUnsupported);
        }
        self.shared.check(stage)
    }
}

impl PlayerObject for HeadlessPlayerObject {
    fn realize(&mut self) -> Result<(), BackendStatus> {
        self.shared.check(InitStage::RealizePlayer)?;
        self.realized = true;
        Ok(())
    }

    fn play_interface(&mut self) -> Result<Arc<dyn PlayInterface>, BackendStatus> {
        self.interface(InterfaceId::Play, InitStage::PlayInterface)?;
        let play: Arc<dyn PlayInterface> = self.play.clone();
        Ok(play)
    }

    fn seek_interface(&mut self) -> Result<Box<dyn SeekInterface>, BackendStatus> {
        self.interface(InterfaceId::Seek, InitStage::SeekInterface)?;
        Ok(Box::new(HeadlessSeek {
            play: Arc::clone(&self.play),
        }))
    }

    fn volume_interface(&mut self) -> Result<Box<dyn VolumeInterface>, BackendStatus> {
        self.interface(InterfaceId::Volume, InitStage::VolumeInterface)?;
        Ok(Box::new(HeadlessVolume {
            play: Arc::clone(&self.play),
        }))
    }
}

impl Drop for HeadlessPlayerObject {
    fn drop(&mut self) {
        self.play.destroy();
        self.shared.live_players.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Default)]
struct PlayerState {
    play_state: PlayState,
    at_end: bool,
    volume: Millibel,
}

struct HeadlessPlay {
    this: Weak<HeadlessPlay>,
    source: SourceInfo,
    clip_length: Option<Duration>,
    shared: Arc<Shared>,
    state: Mutex<PlayerState>,
    callback: Mutex<Option<Arc<PlayCallback>>>,
    mask: Mutex<Vec<PlayEvent>>,
    looping: AtomicBool,
    restarts: AtomicUsize,
    generation: AtomicU64,
    failing: AtomicBool,
    destroyed: AtomicBool,
}

impl HeadlessPlay {
    /// Backend-wide failures first, then this player's own
    fn check_call(&self) -> Result<(), BackendStatus> {
        self.shared.check_call()?;
        if self.failing.load(Ordering::Acquire) {
            Err(BackendStatus::PreconditionsViolated)
        } else {
            Ok(())
        }
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.state.lock().play_state = PlayState::Stopped;
        self.callback.lock().take();
    }

    /// Move the head to the end of the content and report it
    fn reach_end(&self) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }
        {
            let mut state = self.state.lock();
            if state.play_state != PlayState::Playing {
                return;
            }
            state.play_state = PlayState::Paused;
            state.at_end = true;
        }
        self.generation.fetch_add(1, Ordering::AcqRel);

        if !self.mask.lock().contains(&PlayEvent::HeadAtEnd) {
            return;
        }
        // Clone out so the callback may call back into this player
        let callback = self.callback.lock().clone();
        if let Some(callback) = callback {
            callback(PlayEvent::HeadAtEnd);
        }
    }

    fn schedule_end(&self, generation: u64) {
        let (Some(length), Some(this)) = (self.clip_length, self.this.upgrade()) else {
            return;
        };
        thread::spawn(move || {
            thread::sleep(length);
            if this.generation.load(Ordering::Acquire) == generation {
                this.reach_end();
            }
        });
    }
}

impl PlayInterface for HeadlessPlay {
    fn set_play_state(&self, play_state: PlayState) -> Result<(), BackendStatus> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(BackendStatus::PreconditionsViolated);
        }
        self.check_call()?;

        let restarted = {
            let mut state = self.state.lock();
            let restarted = play_state == PlayState::Playing && state.at_end;
            if play_state != PlayState::Paused {
                state.at_end = false;
            }
            state.play_state = play_state;
            restarted
        };
        if restarted {
            self.restarts.fetch_add(1, Ordering::AcqRel);
        }

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if play_state == PlayState::Playing {
            self.schedule_end(generation);
        }
        Ok(())
    }

    fn play_state(&self) -> PlayState {
        self.state.lock().play_state
    }

    fn register_callback(&self, callback: PlayCallback) -> Result<(), BackendStatus> {
        *self.callback.lock() = Some(Arc::new(callback));
        Ok(())
    }

    fn set_callback_events_mask(&self, events: &[PlayEvent]) -> Result<(), BackendStatus> {
        *self.mask.lock() = events.to_vec();
        Ok(())
    }
}

struct HeadlessSeek {
    play: Arc<HeadlessPlay>,
}

impl SeekInterface for HeadlessSeek {
    fn set_loop(
        &self,
        enabled: bool,
        _start_ms: u32,
        _end_ms: Option<u32>,
    ) -> Result<(), BackendStatus> {
        self.play.looping.store(enabled, Ordering::Release);
        Ok(())
    }
}

struct HeadlessVolume {
    play: Arc<HeadlessPlay>,
}

impl VolumeInterface for HeadlessVolume {
    fn set_volume_level(&self, level: Millibel) -> Result<(), BackendStatus> {
        self.play.check_call()?;
        self.play.state.lock().volume = level;
        Ok(())
    }

    fn volume_level(&self) -> Millibel {
        self.play.state.lock().volume
    }
}

/// Probe onto one live headless player
#[derive(Clone)]
pub struct HeadlessPlayer {
    play: Arc<HeadlessPlay>,
}

impl HeadlessPlayer {
    pub fn source(&self) -> &SourceInfo {
        &self.play.source
    }

    pub fn play_state(&self) -> PlayState {
        self.play.play_state()
    }

    pub fn volume_level(&self) -> Millibel {
        self.play.state.lock().volume
    }

    /// Whether looping was requested through the seek interface
    pub fn is_looping(&self) -> bool {
        self.play.looping.load(Ordering::Acquire)
    }

    /// How many times playback was restarted after reaching the end
    pub fn restarts(&self) -> usize {
        self.play.restarts.load(Ordering::Acquire)
    }

    /// Simulate the end of the content, firing `HeadAtEnd` if subscribed
    pub fn reach_end(&self) {
        self.play.reach_end();
    }

    /// Make play-state and volume calls on this player alone fail
    pub fn fail_calls(&self, failing: bool) {
        self.play.failing.store(failing, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn realized_player(backend: &mut HeadlessBackend) -> (Box<dyn EngineObject>, Box<dyn PlayerObject>) {
        let mut engine = backend.create_engine().unwrap();
        engine.realize().unwrap();
        let mut itf = engine.engine_interface().unwrap();
        let mut mix = itf.create_output_mix().unwrap();
        mix.realize().unwrap();
        let source = DataSource::Uri(Path::new("/sfx/click.wav"));
        let mut player = itf
            .create_player(&source, mix.as_ref(), &[InterfaceId::Seek, InterfaceId::Volume])
            .unwrap();
        player.realize().unwrap();
        (engine, player)
    }

    #[test]
    fn test_object_lifetimes_are_counted() {
        let mut backend = HeadlessBackend::new();
        let (engine, player) = realized_player(&mut backend);
        assert_eq!(backend.live_engines(), 1);
        assert_eq!(backend.live_output_mixes(), 0);
        assert_eq!(backend.live_players(), 1);
        assert_eq!(backend.players().len(), 1);

        drop(player);
        assert_eq!(backend.live_players(), 0);
        assert!(backend.players().is_empty());

        drop(engine);
        assert_eq!(backend.live_engines(), 0);
        assert_eq!(backend.engines_created(), 1);
    }

    #[test]
    fn test_injected_failure() {
        let mut backend = HeadlessBackend::new();
        backend.fail_at(InitStage::RealizeEngine);
        let mut engine = backend.create_engine().unwrap();
        assert_eq!(engine.realize(), Err(BackendStatus::InternalError));
        assert!(engine.engine_interface().is_err());

        backend.clear_failures();
        assert!(engine.realize().is_ok());
    }

    #[test]
    fn test_interface_must_be_requested() {
        let mut backend = HeadlessBackend::new();
        let mut engine = backend.create_engine().unwrap();
        engine.realize().unwrap();
        let mut itf = engine.engine_interface().unwrap();
        let mut mix = itf.create_output_mix().unwrap();
        mix.realize().unwrap();
        let source = DataSource::Uri(Path::new("/sfx/click.wav"));
        let mut player = itf.create_player(&source, mix.as_ref(), &[]).unwrap();
        player.realize().unwrap();

        assert!(player.play_interface().is_ok());
        assert_eq!(
            player.seek_interface().err(),
            Some(BackendStatus::FeatureUnsupported)
        );
    }

    #[test]
    fn test_reach_end_fires_masked_callback() {
        let mut backend = HeadlessBackend::new();
        let (_engine, mut player) = realized_player(&mut backend);
        let play = player.play_interface().unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        play.register_callback(Box::new(move |event: PlayEvent| {
            assert_eq!(event, PlayEvent::HeadAtEnd);
            counter.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();

        play.set_play_state(PlayState::Playing).unwrap();
        let probe = &backend.players()[0];

        // Not subscribed yet
        probe.reach_end();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(probe.play_state(), PlayState::Paused);

        play.set_play_state(PlayState::Playing).unwrap();
        assert_eq!(probe.restarts(), 1);
        play.set_callback_events_mask(&[PlayEvent::HeadAtEnd]).unwrap();
        probe.reach_end();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_state_calls() {
        let mut backend = HeadlessBackend::new();
        let (_engine, mut player) = realized_player(&mut backend);
        let play = player.play_interface().unwrap();
        let volume = player.volume_interface().unwrap();

        backend.fail_state_calls(true);
        assert!(play.set_play_state(PlayState::Playing).is_err());
        assert!(volume.set_volume_level(-600).is_err());

        backend.fail_state_calls(false);
        assert!(volume.set_volume_level(-600).is_ok());
        assert_eq!(volume.volume_level(), -600);
    }
}
