//! people_counterd - people counting daemon
//!
//! This daemon:
//! 1. Loads the service configuration (file, env, CLI flags)
//! 2. Opens the camera and builds the counting pipeline
//! 3. Serves the annotated MJPEG stream until Ctrl-C

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use people_counter::{PeopleCounter, ServiceConfig, StreamConfig, StreamServer};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "PEOPLE_COUNTER_CONFIG")]
    config: Option<PathBuf>,
    /// Stream listen address, e.g. 0.0.0.0:5000.
    #[arg(long)]
    addr: Option<String>,
    /// Frame source: stub://<name>, a frame directory, or /dev/videoN.
    #[arg(long)]
    source: Option<String>,
    /// TrueType font for the counts overlay.
    #[arg(long)]
    font: Option<PathBuf>,
    /// Per-viewer stream rate; 0 disables pacing.
    #[arg(long)]
    fps: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = ServiceConfig::load_from(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        config.stream_addr = addr;
    }
    if let Some(source) = args.source {
        config.camera.source = source;
    }
    if let Some(font) = args.font {
        config.overlay.font_path = Some(font);
    }
    if let Some(fps) = args.fps {
        config.stream_fps = fps;
    }
    config.validate()?;

    let counter = Arc::new(Mutex::new(PeopleCounter::from_service_config(&config)?));
    let stream_config = StreamConfig {
        addr: config.stream_addr.clone(),
        target_fps: config.stream_fps,
    };
    let handle = StreamServer::new(stream_config, counter.clone()).spawn()?;
    log::info!(
        "people_counterd running. source {} streaming on http://{}/video_feed",
        config.camera.source,
        handle.addr
    );

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    log::info!("people_counterd waiting for shutdown signal (Ctrl-C)...");
    while let Err(mpsc::RecvTimeoutError::Timeout) = rx.recv_timeout(STATS_INTERVAL) {
        if let Ok(counter) = counter.lock() {
            let stats = counter.source_stats();
            let counts = counter.counts();
            log::debug!(
                "source {}: {} frames captured, healthy={}, enter={} leave={}",
                stats.source,
                stats.frames_captured,
                counter.source_healthy(),
                counts.enter,
                counts.leave
            );
        }
    }
    log::info!("shutdown signal received, stopping stream server...");
    handle.stop()?;

    Ok(())
}
