/// Engine context
///
/// Owns the backend, the asset store and, once initialized, the engine and
/// output mix every effect plays through.
use std::sync::Arc;
use std::time::Duration;

use super::backend::{AudioBackend, EngineInterface, EngineObject, OutputMixObject};
use super::reaper::Reaper;
use super::registry::VoiceRegistry;
use crate::assets::AssetStore;
use crate::error::{AudioError, InitStage};
use crate::messaging::{AudioEvent, EventBus};
use crate::music::MusicBridge;

/// Reaper tick interval used when none is configured
pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_millis(100);

/// Realized engine and output mix.
///
/// Fields drop in declaration order: output mix, engine interface, engine.
pub struct BackendHandles {
    pub(crate) output_mix: Box<dyn OutputMixObject>,
    pub(crate) engine: Box<dyn EngineInterface>,
    _engine_object: Box<dyn EngineObject>,
}

impl BackendHandles {
    /// Run the full initialization sequence. A failing step drops whatever
    /// was created before it.
    pub fn create(backend: &mut dyn AudioBackend) -> Result<Self, AudioError> {
        let mut engine_object = backend
            .create_engine()
            .map_err(AudioError::init(InitStage::CreateEngine))?;
        engine_object
            .realize()
            .map_err(AudioError::init(InitStage::RealizeEngine))?;
        let mut engine = engine_object
            .engine_interface()
            .map_err(AudioError::init(InitStage::EngineInterface))?;

        let mut output_mix = engine
            .create_output_mix()
            .map_err(AudioError::init(InitStage::CreateOutputMix))?;
        output_mix
            .realize()
            .map_err(AudioError::init(InitStage::RealizeOutputMix))?;

        Ok(Self {
            output_mix,
            engine,
            _engine_object: engine_object,
        })
    }
}

pub struct EngineContext {
    backend: Box<dyn AudioBackend>,
    assets: Arc<dyn AssetStore>,
    handles: Option<BackendHandles>,
    reaper: Option<Reaper>,
    reaper_interval: Duration,
    events: EventBus,
}

impl EngineContext {
    pub fn new(
        backend: Box<dyn AudioBackend>,
        assets: Arc<dyn AssetStore>,
        reaper_interval: Duration,
        events: EventBus,
    ) -> Self {
        Self {
            backend,
            assets,
            handles: None,
            reaper: None,
            reaper_interval,
            events,
        }
    }

    /// Initialize the backend if needed. Returns whether it is usable.
    ///
    /// Failed attempts leave nothing behind, so the next call starts over.
    pub fn ensure_ready(&mut self) -> bool {
        if self.handles.is_some() {
            return true;
        }

        match BackendHandles::create(self.backend.as_mut()) {
            Ok(handles) => {
                self.handles = Some(handles);
                tracing::info!("Audio backend ready: {}", self.backend.name());

                if self.reaper.is_none() {
                    self.reaper = Some(Reaper::new(self.reaper_interval));
                    tracing::debug!("Installed effect reaper every {:?}", self.reaper_interval);
                }

                self.events.publish(AudioEvent::BackendReady {
                    backend: self.backend.name(),
                });
                true
            }
            Err(e) => {
                match &e {
                    AudioError::BackendInitFailed { status, .. } => {
                        tracing::error!("{} backend: {} ({})", self.backend.name(), e, status.code())
                    }
                    _ => tracing::error!("{} backend: {}", self.backend.name(), e),
                }
                false
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.handles.is_some()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn assets(&self) -> &Arc<dyn AssetStore> {
        &self.assets
    }

    /// Handles and asset store, borrowed together for voice creation
    pub fn parts_mut(&mut self) -> Option<(&mut BackendHandles, &dyn AssetStore)> {
        let assets = self.assets.as_ref();
        self.handles.as_mut().map(|handles| (handles, assets))
    }

    /// The reaper, once the backend has been initialized at least once
    pub fn reaper_mut(&mut self) -> Option<&mut Reaper> {
        self.reaper.as_mut()
    }

    /// End background music, destroy every voice, then release the output
    /// mix and engine. Safe to call when never initialized.
    pub fn shutdown(&mut self, registry: &mut VoiceRegistry, bridge: &mut dyn MusicBridge) {
        bridge.end();
        registry.stop_all();

        if let Some(handles) = self.handles.take() {
            drop(handles);
            tracing::info!("Audio backend shut down: {}", self.backend.name());
            self.events.publish(AudioEvent::BackendShutdown);
        }
    }
}
