//! count_replay - offline counting run over any frame source
//!
//! Runs the pipeline on a simulated clock, so recorded footage is counted the same
//! way regardless of how fast this machine decodes it.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use people_counter::{PeopleCounter, PipelineError, ServiceConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "PEOPLE_COUNTER_CONFIG")]
    config: Option<PathBuf>,
    /// Frame source: stub://<name>, a frame directory, or /dev/videoN.
    #[arg(long, default_value = "stub://replay")]
    source: String,
    /// Number of frames to process; a finite source may end earlier.
    #[arg(long, default_value_t = 161)]
    frames: u64,
    /// Frame rate of the simulated clock.
    #[arg(long, default_value_t = 10)]
    fps: u32,
    /// Directory for the annotated JPEG frames.
    #[arg(long)]
    out: Option<PathBuf>,
    /// TrueType font for the counts overlay.
    #[arg(long)]
    font: Option<PathBuf>,
}

#[derive(Serialize)]
struct ReplaySummary {
    source: String,
    enter: u64,
    leave: u64,
    cycles: u64,
    frames_written: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    if args.fps == 0 {
        return Err(anyhow!("fps must be >= 1"));
    }

    let mut config = ServiceConfig::load_from(args.config.as_deref())?;
    config.camera.source = args.source.clone();
    config.camera.loop_playback = false;
    if let Some(font) = args.font {
        config.overlay.font_path = Some(font);
    }
    config.validate()?;

    if let Some(out) = &args.out {
        fs::create_dir_all(out)
            .with_context(|| format!("create output directory {}", out.display()))?;
    }

    let mut counter = PeopleCounter::from_service_config(&config)?;
    let step = Duration::from_secs(1) / args.fps;
    let start = Instant::now();
    let mut frames_written = 0u64;

    for index in 0..args.frames {
        let now = start + step * index as u32;
        let jpeg = match counter.next_frame_at(now) {
            Ok(jpeg) => jpeg,
            Err(err) => match err.downcast_ref::<PipelineError>() {
                Some(PipelineError::SourceExhausted { .. }) => {
                    log::info!("source exhausted after {} frames", index);
                    break;
                }
                _ => return Err(err),
            },
        };
        if let Some(out) = &args.out {
            let path = out.join(format!("frame_{index:05}.jpg"));
            fs::write(&path, &jpeg).with_context(|| format!("write {}", path.display()))?;
            frames_written += 1;
        }
    }

    let counts = counter.counts();
    let summary = ReplaySummary {
        source: args.source,
        enter: counts.enter,
        leave: counts.leave,
        cycles: counter.cycles(),
        frames_written,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
