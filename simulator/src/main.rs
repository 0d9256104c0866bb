use anyhow::Context;
use clap::Parser;
use feed::{DispatchFeed, FetchState};
use feed::refresh::run_refresh;
use generator::profile::build_calls;
use gui_bridge::bridge::GuiBridge;
use smokecore::playback::BatchSource;
use smokecore::telemetry::log::format_timestamp;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use tokio::sync::mpsc;
use workflow::config::WorkflowConfig;
use workflow::runner::Runner;

mod feed;
mod generator;
mod gui_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "SF 911 smoke playback driver")]
struct Args {
    /// Run a headless playback and emit a summary
    #[arg(long, default_value_t = false)]
    offline: bool,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long, default_value_t = 600)]
    frames: usize,
    /// Simulated milliseconds per real millisecond
    #[arg(long, default_value_t = 300.0)]
    speed: f64,
    #[arg(long, default_value_t = 40)]
    max_emitters: usize,
    /// Seed for synthetic calls and particle jitter
    #[arg(long)]
    seed: Option<u64>,
    /// Try the open-data endpoint before falling back to synthetic calls
    #[arg(long, default_value_t = false)]
    live: bool,
    /// Run the real-time loop behind the HTTP bridge until Ctrl+C
    #[arg(long, default_value_t = false)]
    serve: bool,
    /// Number of synthetic calls to generate
    #[arg(long)]
    calls: Option<usize>,
    /// Fixed horizontal wind for offline runs instead of the synthetic mic
    #[arg(long, allow_hyphen_values = true)]
    wind: Option<f32>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = if let Some(path) = args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::from_args(args.frames, args.speed, args.max_emitters, args.seed)
    };
    if args.live {
        workflow_config.feed.live = true;
    }
    if let Some(count) = args.calls {
        workflow_config.generator.count = count;
    }
    if args.wind.is_some() {
        workflow_config.wind = args.wind;
    }
    workflow_config
        .validate()
        .context("validating workflow config")?;

    let runner = Runner::new(workflow_config.clone());

    if args.offline {
        run_offline(&runner, &workflow_config)?;
    }
    if args.serve {
        run_serve(&runner, &workflow_config)?;
    }
    if !args.offline && !args.serve {
        log::warn!("nothing to do; pass --offline or --serve");
    }

    Ok(())
}

fn run_offline(runner: &Runner, config: &WorkflowConfig) -> anyhow::Result<()> {
    let mut session = runner.build_session()?;

    if config.feed.live {
        let runtime = TokioBuilder::new_current_thread()
            .enable_all()
            .build()
            .context("creating runtime for live fetch")?;
        let state = runtime.block_on(async {
            let mut feed = DispatchFeed::new(
                config.feed.clone(),
                config.generator.clone(),
                session.inbox(),
            )?;
            feed.request();
            Ok::<FetchState, anyhow::Error>(feed.settle().await)
        })?;
        log::info!("feed finished: {:?}", state);
    } else {
        let calls = build_calls(&config.generator)?;
        session
            .inbox()
            .submit(BatchSource::Synthetic, calls)
            .context("queueing synthetic calls")?;
    }

    let result = runner.execute(&mut session, config.frames);
    let playback = result
        .final_time
        .map(format_timestamp)
        .unwrap_or_else(|| "n/a".into());

    println!(
        "Offline run -> frames {}, calls {}, spawned {}, evicted {}, retired {}, loops {}, peak emitters {}, peak particles {}, playback at {}",
        result.frames,
        result.records,
        result.metrics.spawned,
        result.metrics.evicted,
        result.metrics.retired,
        result.metrics.loops,
        result.peak_emitters,
        result.peak_particles,
        playback
    );

    let report = format!(
        "frames={} calls={} spawned={} evicted={} rejected={} retired={} loops={} peak_emitters={} peak_particles={} playback={}\n",
        result.frames,
        result.records,
        result.metrics.spawned,
        result.metrics.evicted,
        result.metrics.rejected,
        result.metrics.retired,
        result.metrics.loops,
        result.peak_emitters,
        result.peak_particles,
        playback
    );
    let report_path = PathBuf::from("tools/data/offline_playback.log");
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&report_path)
        .with_context(|| format!("opening {}", report_path.display()))?;
    file.write_all(report.as_bytes())?;
    Ok(())
}

fn run_serve(runner: &Runner, config: &WorkflowConfig) -> anyhow::Result<()> {
    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating runtime for the bridge")?;

    runtime.block_on(async {
        let mut session = runner.build_session()?;
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let bridge = GuiBridge::new(session.inbox(), control_tx);
        bridge.serve(config.bridge_addr)?;

        let feed = DispatchFeed::new(
            config.feed.clone(),
            config.generator.clone(),
            session.inbox(),
        )?;
        let refresh = tokio::spawn(run_refresh(
            feed,
            Duration::from_secs(config.feed.refresh_secs),
        ));

        bridge.publish_status("Playback running (Ctrl+C to stop)...");
        let outcome = tokio::select! {
            result = runner.run_realtime(&mut session, &bridge, control_rx) => result,
            signal = signal::ctrl_c() => signal.context("awaiting Ctrl+C to exit"),
        };
        refresh.abort();
        outcome
    })
}
