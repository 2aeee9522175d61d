use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};

use sfx_bridge::audio_system::HeadlessBackend;
use sfx_bridge::error::AppResult;
use sfx_bridge::logging::{initialize_tracing, log_runtime_environment};
use sfx_bridge::{
    AudioConfig, BackendKind, DirectoryAssetStore, EngineOptions, NullMusicBridge, SoundEngine,
    INVALID_EFFECT_ID,
};

const FRAME: Duration = Duration::from_micros(16_667);

/// Clip length reported by the headless backend in demo runs
const HEADLESS_CLIP: Duration = Duration::from_millis(750);

struct Args {
    config: Option<PathBuf>,
    headless: bool,
    looping: bool,
    timeout: Duration,
    effects: Vec<String>,
}

fn parse_args() -> AppResult<Args> {
    let mut args = Args {
        config: None,
        headless: false,
        looping: false,
        timeout: Duration::from_secs(10),
        effects: Vec::new(),
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--headless" => args.headless = true,
            "--loop" => args.looping = true,
            "--timeout" => {
                let secs = iter.next().context("--timeout needs seconds")?;
                let secs: f64 = secs
                    .parse()
                    .with_context(|| format!("invalid timeout: {}", secs))?;
                args.timeout = Duration::from_secs_f64(secs.max(0.0));
            }
            "-h" | "--help" => {
                println!(
                    "Usage: sfx-bridge-demo [--config PATH] [--headless] [--loop] [--timeout SECS] EFFECT..."
                );
                std::process::exit(0);
            }
            other if other.starts_with("--") => bail!("unknown option: {}", other),
            _ => args.effects.push(arg),
        }
    }

    if args.effects.is_empty() {
        bail!("no effects given (try --help)");
    }
    Ok(args)
}

fn build_engine(config: &AudioConfig) -> SoundEngine {
    match config.backend {
        BackendKind::Headless => SoundEngine::new(
            Box::new(HeadlessBackend::new().with_clip_length(HEADLESS_CLIP)),
            Arc::new(
                DirectoryAssetStore::new(&config.asset_root)
                    .with_search_dirs(config.search_dirs.clone()),
            ),
            Box::new(NullMusicBridge::default()),
            EngineOptions::from(config),
        ),
        BackendKind::Rodio => SoundEngine::from_config(config),
    }
}

fn main() -> AppResult<()> {
    let args = parse_args()?;

    let mut config = match &args.config {
        Some(path) => AudioConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AudioConfig::load_or_default().context("failed to load default config")?,
    };
    if args.headless {
        config.backend = BackendKind::Headless;
    }

    initialize_tracing(&config.log_filter);
    log_runtime_environment();

    let mut engine = build_engine(&config);
    let (events, _subscription) = engine.subscribe();

    let mut started = 0;
    for effect in &args.effects {
        let id = engine.play_effect(effect, args.looping);
        if id == INVALID_EFFECT_ID {
            tracing::warn!("Could not play {}", effect);
        } else {
            tracing::info!("Playing {} as effect {}", effect, id);
            started += 1;
        }
    }
    if started == 0 {
        engine.end();
        bail!("none of the effects could be played");
    }

    let deadline = Instant::now() + args.timeout;
    let mut last = Instant::now();
    while engine.effect_count() > 0 && Instant::now() < deadline {
        thread::sleep(FRAME);
        let now = Instant::now();
        engine.update(now - last);
        last = now;

        while let Ok(event) = events.try_recv() {
            tracing::info!("{}", event.description());
        }
    }

    if engine.effect_count() > 0 {
        tracing::info!("Timeout reached with {} effect(s) playing", engine.effect_count());
    }
    engine.end();
    Ok(())
}
