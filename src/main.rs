use anyhow::{Context, Result};
use clap::Parser;
use posecoach::{
    sequence, EventBus, EventFilter, LiveDetectionSample, PosecoachConfig, PosecoachEvent,
    PracticeSession, SampleOutcome, SequenceStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "posecoach")]
#[command(about = "Pose-sequence playback and similarity scoring for movement practice")]
#[command(version)]
#[command(long_about = "Plays back recorded pose sequences as a timed target and scores \
live poses against the interpolated target. Sequences are stored as JSON documents.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "posecoach.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<String>,

    /// List sequences in the storage directory
    #[arg(long, help = "List stored sequences and exit")]
    list: bool,

    /// Summarize a sequence file
    #[arg(long, value_name = "FILE")]
    inspect: Option<String>,

    /// Reference sequence to practice against
    #[arg(long, value_name = "FILE", requires = "performance")]
    reference: Option<String>,

    /// Recorded performance replayed as live samples
    #[arg(long, value_name = "FILE", requires = "reference")]
    performance: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting posecoach v{}", env!("CARGO_PKG_VERSION"));

    let config = match PosecoachConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }
    config.validate()?;

    if args.list {
        return list_sequences(&config).await;
    }

    if let Some(path) = &args.inspect {
        return inspect(path).await;
    }

    if let (Some(reference), Some(performance)) = (&args.reference, &args.performance) {
        return practice(&config, reference, performance).await;
    }

    warn!("Nothing to do; pass --inspect, --list or --reference with --performance");
    Ok(())
}

async fn list_sequences(config: &PosecoachConfig) -> Result<()> {
    let store = SequenceStore::from_config(&config.storage);
    let paths = store.list().await?;

    if paths.is_empty() {
        println!("No sequences in {}", store.root().display());
    }
    for path in paths {
        println!("{}", path.display());
    }
    Ok(())
}

async fn inspect(path: &str) -> Result<()> {
    let sequence = sequence::load_file(path)
        .await
        .with_context(|| format!("Failed to load sequence from {}", path))?;
    let metadata = sequence.metadata();

    println!("Name:       {}", sequence.name());
    println!("Poses:      {}", sequence.len());
    println!("Landmarks:  {}", sequence.landmark_count());
    println!("Duration:   {:.0} ms", sequence.duration_ms());
    println!("Created:    {}", metadata.created.to_rfc3339());
    if let Some(source) = &metadata.video_source {
        println!("Source:     {}", source);
    }
    if let Some(fps) = metadata.fps {
        println!("Frame rate: {} fps", fps);
    }
    Ok(())
}

/// Replay `performance` in real time as live detections against `reference`
async fn practice(config: &PosecoachConfig, reference: &str, performance: &str) -> Result<()> {
    let performance = sequence::load_file(performance)
        .await
        .with_context(|| format!("Failed to load performance from {}", performance))?;

    let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
    let session = PracticeSession::new(config, Arc::clone(&event_bus));
    session
        .load_sequence_file(reference)
        .await
        .with_context(|| format!("Failed to load reference from {}", reference))?;

    let mut completions = event_bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["playback_completed"]),
        "cli",
    );

    session.play().await;
    let start = tokio::time::Instant::now();

    for (pose, offset_ms) in performance.poses().iter().zip(performance.timing()) {
        let due = start + Duration::from_secs_f64(offset_ms / 1000.0);
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping practice");
                break;
            }
            _ = tokio::time::sleep_until(due) => {}
        }

        match session
            .submit_sample(LiveDetectionSample::now(pose.clone()))
            .await?
        {
            SampleOutcome::Scored(update) => {
                debug!(
                    "{:>8.0} ms  keyframe {:>4}  score {:>5.1}",
                    offset_ms, update.target_index, update.score
                );
            }
            other => debug!("{:>8.0} ms  {:?}", offset_ms, other),
        }

        if let Ok(Some(PosecoachEvent::PlaybackCompleted { .. })) = completions.try_recv() {
            info!("Reference finished before the performance");
            break;
        }
    }

    session.shutdown();

    let stats = session.stats();
    println!("Samples scored:    {}", stats.samples_scored);
    println!("Samples discarded: {}", stats.samples_discarded);
    println!("Average score:     {:.1}", stats.average_score());
    if let Some(best) = stats.best_score {
        println!("Best score:        {:.1}", best);
    }
    Ok(())
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("posecoach={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "posecoach.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Posecoach Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    println!("{}", toml::to_string_pretty(&PosecoachConfig::default())?);
    Ok(())
}
