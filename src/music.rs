/// Background music
///
/// Music is a single long-running track, handled apart from effects. The
/// engine only forwards calls to a `MusicBridge`, so hosts with their own
/// music player can plug it in.
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use crate::assets::{bundle_relative, AssetStore};
use crate::error::AudioError;

pub trait MusicBridge {
    /// Load a track ahead of time so `play` starts without disk access
    fn preload(&mut self, path: &str);

    /// Replace whatever is playing with `path`
    fn play(&mut self, path: &str, looping: bool);

    fn stop(&mut self);

    fn pause(&mut self);

    fn resume(&mut self);

    /// Restart the current track from the beginning
    fn rewind(&mut self);

    fn is_playing(&self) -> bool;

    fn volume(&self) -> f32;

    /// Clamped to 0.0..=1.0
    fn set_volume(&mut self, volume: f32);

    /// Stop and release everything. Called once, before effects shut down.
    fn end(&mut self);
}

struct Track {
    path: String,
    data: Arc<Vec<u8>>,
    looping: bool,
}

/// Music player on the default output device.
///
/// Tracks are read fully into memory and decoded on every start. The device
/// is opened on first play.
pub struct RodioMusicBridge {
    assets: Arc<dyn AssetStore>,
    output: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Sink>,
    preloaded: HashMap<String, Arc<Vec<u8>>>,
    current: Option<Track>,
    volume: f32,
}

impl RodioMusicBridge {
    pub fn new(assets: Arc<dyn AssetStore>) -> Self {
        Self {
            assets,
            output: None,
            sink: None,
            preloaded: HashMap::new(),
            current: None,
            volume: 1.0,
        }
    }

    fn load(&mut self, path: &str) -> Result<Arc<Vec<u8>>, AudioError> {
        let full_path = self.assets.full_path(path);
        if let Some(data) = self.preloaded.get(&full_path) {
            return Ok(Arc::clone(data));
        }

        let data = if Path::new(&full_path).is_absolute() {
            std::fs::read(&full_path)
        } else {
            self.assets
                .open(bundle_relative(&full_path))
                .and_then(|asset| asset.read_all())
        }
        .map_err(|source| AudioError::AssetOpenFailed {
            path: full_path.clone(),
            source,
        })?;

        tracing::info!("Loaded music track: {} ({} bytes)", full_path, data.len());
        let data = Arc::new(data);
        self.preloaded.insert(full_path, Arc::clone(&data));
        Ok(data)
    }

    fn output_handle(&mut self) -> Option<OutputStreamHandle> {
        if self.output.is_none() {
            match OutputStream::try_default() {
                Ok(output) => self.output = Some(output),
                Err(e) => {
                    tracing::warn!("No audio output for music: {}", e);
                    return None;
                }
            }
        }
        self.output.as_ref().map(|(_, handle)| handle.clone())
    }

    /// Start `track` on a fresh sink, replacing the current one
    fn start(&mut self, track: Track) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }

        // The track stays current on failure so `rewind` can retry it
        let Some(handle) = self.output_handle() else {
            self.current = Some(track);
            return;
        };

        // Decoder needs owned 'static data
        let decoder = match Decoder::new(Cursor::new((*track.data).clone())) {
            Ok(decoder) => decoder,
            Err(e) => {
                tracing::warn!("Failed to decode music track {}: {}", track.path, e);
                self.current = Some(track);
                return;
            }
        };
        let sink = match Sink::try_new(&handle) {
            Ok(sink) => sink,
            Err(e) => {
                tracing::warn!("Failed to create music sink: {}", e);
                self.current = Some(track);
                return;
            }
        };

        sink.set_volume(self.volume);
        if track.looping {
            sink.append(decoder.repeat_infinite());
        } else {
            sink.append(decoder);
        }
        sink.play();

        tracing::debug!("Playing music {} (loop={})", track.path, track.looping);
        self.sink = Some(sink);
        self.current = Some(track);
    }
}

impl MusicBridge for RodioMusicBridge {
    fn preload(&mut self, path: &str) {
        if let Err(e) = self.load(path) {
            tracing::warn!("Failed to preload music: {}", e);
        }
    }

    fn play(&mut self, path: &str, looping: bool) {
        match self.load(path) {
            Ok(data) => self.start(Track {
                path: path.to_string(),
                data,
                looping,
            }),
            Err(e) => tracing::warn!("Failed to play music: {}", e),
        }
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn rewind(&mut self) {
        if let Some(track) = self.current.take() {
            self.start(track);
        }
    }

    fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .map(|sink| !sink.is_paused() && !sink.empty())
            .unwrap_or(false)
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    fn end(&mut self) {
        self.stop();
        self.current = None;
        self.preloaded.clear();
        self.output = None;
        tracing::debug!("Music bridge ended");
    }
}

/// Music bridge that plays nothing but keeps the observable state, for
/// hosts without music and for headless runs
#[derive(Debug, Clone)]
pub struct NullMusicBridge {
    current: Option<String>,
    playing: bool,
    volume: f32,
}

impl Default for NullMusicBridge {
    fn default() -> Self {
        Self {
            current: None,
            playing: false,
            volume: 1.0,
        }
    }
}

impl NullMusicBridge {
    /// Track last asked to play
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

impl MusicBridge for NullMusicBridge {
    fn preload(&mut self, path: &str) {
        tracing::trace!("Preload music {} (no-op)", path);
    }

    fn play(&mut self, path: &str, looping: bool) {
        tracing::debug!("Play music {} (loop={}, silent)", path, looping);
        self.current = Some(path.to_string());
        self.playing = true;
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn resume(&mut self) {
        self.playing = self.current.is_some();
    }

    fn rewind(&mut self) {
        self.playing = self.current.is_some();
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume);
    }

    fn end(&mut self) {
        self.current = None;
        self.playing = false;
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}
