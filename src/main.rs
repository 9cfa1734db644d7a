//! SyncScope - Main Entry Point
//!
//! Command line front end for capturing simulated sessions and inspecting,
//! scrubbing and exporting recorded ones.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use syncscope::{
    clock::{MonotonicClock, OffsetClock, SharedClock},
    config::{self, ProducerSettings, SyncConfig},
    producer::{ExternalDeviceProducer, SignalPattern, SimulatedDevice},
    session::{
        companion_video_path, event_rows, sample_row, sample_rows, CaptureSession,
        PlaybackEngine, VideoInfo,
    },
    storage::{
        export::{export_csv, ExportLayout},
        LoadedRecord, RecordSink,
    },
    transport::{LocalTransport, Transport},
    types::{PointerEventKind, WindowReference},
};

#[derive(Parser)]
#[command(name = "syncscope")]
#[command(about = "Multi-stream session capture and synchronized replay")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the platform data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a session from a simulated device and pointer
    Simulate {
        /// Output directory; the record lands in <out>/<session>/
        #[arg(short, long, default_value = "recordings")]
        out: PathBuf,
        #[arg(long)]
        session: Option<String>,
        /// Recording length in seconds
        #[arg(short, long, default_value = "5")]
        duration: f64,
        /// Device sample rate in Hz
        #[arg(long, default_value = "128")]
        rate: f64,
        #[arg(long, default_value = "4")]
        channels: usize,
        /// Offset of the device clock from the local clock, in seconds
        #[arg(long, default_value = "0.25")]
        device_offset: f64,
    },
    /// Summarize a record file
    Inspect {
        record: PathBuf,
        /// Sample rows to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show what playback displays at a position
    Seek {
        record: PathBuf,
        /// Seconds since session start
        #[arg(short, long)]
        time: f64,
        /// Frame count of the companion video
        #[arg(long)]
        frames: Option<u64>,
        #[arg(long)]
        fps: Option<f64>,
        /// Trail window in seconds
        #[arg(long)]
        trail: Option<f64>,
    },
    /// Play a record back in real time, printing the nearest pointer position
    Play {
        record: PathBuf,
        /// Start position in seconds
        #[arg(long, default_value = "0")]
        from: f64,
        #[arg(long, default_value = "1")]
        speed: f64,
    },
    /// List structured events
    Events { record: PathBuf },
    /// Export samples as CSV
    Export {
        record: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, value_enum, default_value = "wide")]
        layout: Layout,
    },
    /// Write the default configuration file
    InitConfig {
        path: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Layout {
    Long,
    Wide,
}

impl From<Layout> for ExportLayout {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Long => ExportLayout::Long,
            Layout::Wide => ExportLayout::Wide,
        }
    }
}

fn main() -> Result<()> {
    let _log_guard = init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::load_default_location(),
    };

    match cli.command {
        Commands::Simulate {
            out,
            session,
            duration,
            rate,
            channels,
            device_offset,
        } => simulate(
            &config,
            &out,
            session,
            duration,
            rate,
            channels,
            device_offset,
        ),
        Commands::Inspect { record, limit } => inspect(&record, limit),
        Commands::Seek {
            record,
            time,
            frames,
            fps,
            trail,
        } => seek(&config, &record, time, frames, fps, trail),
        Commands::Play {
            record,
            from,
            speed,
        } => play(&config, &record, from, speed),
        Commands::Events { record } => events(&record),
        Commands::Export {
            record,
            out,
            layout,
        } => {
            let loaded = load(&record)?;
            let rows = export_csv(&loaded.record, layout.into(), &out)?;
            println!("Wrote {} row(s) to {}", rows, out.display());
            Ok(())
        }
        Commands::InitConfig { path, force } => init_config(path, force),
    }
}

/// Console logging plus a daily log file in the app data directory
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let (file_layer, guard) = match config::log_dir() {
        Some(dir) if std::fs::create_dir_all(&dir).is_ok() => {
            let appender = tracing_appender::rolling::daily(dir, "syncscope.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,syncscope=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

fn load(path: &Path) -> Result<LoadedRecord> {
    let loaded = RecordSink::load(path)?;
    if let Some(error) = &loaded.save_error {
        tracing::warn!("Record was saved in degraded form: {}", error);
    }
    if loaded.skipped_samples > 0 {
        tracing::warn!("Skipped {} malformed sample(s)", loaded.skipped_samples);
    }
    Ok(loaded)
}

fn simulate(
    config: &SyncConfig,
    out: &Path,
    session: Option<String>,
    duration: f64,
    rate: f64,
    channels: usize,
    device_offset: f64,
) -> Result<()> {
    let session_id =
        session.unwrap_or_else(|| chrono::Local::now().format("%Y%m%d_%H%M%S").to_string());
    tracing::info!("Starting simulated session '{}'", session_id);

    let transport: Arc<dyn Transport> =
        Arc::new(LocalTransport::new().with_queue_capacity(config.transport.queue_capacity));

    let device_clock: SharedClock =
        Arc::new(OffsetClock::new(MonotonicClock::shared(), device_offset));
    let patterns = (0..channels.max(1))
        .map(|i| SignalPattern::Sine {
            frequency: 0.5 + i as f64 * 0.5,
            amplitude: 1.0,
            offset: 0.0,
        })
        .collect();
    let device = SimulatedDevice::new(config.device.stream_name.clone(), rate, patterns)
        .with_clock(device_clock);
    let mut device_producer = ExternalDeviceProducer::start(
        Arc::clone(&transport),
        Box::new(device),
        config.device.clone(),
        format!("{}_device", ProducerSettings::source_id(&session_id)),
    )?;

    // The device announces its stream after warm-up; wait so the recorder sees it
    let deadline = Instant::now() + Duration::from_millis(config.device.warmup_ms + 2000);
    while !device_producer.stats().stream_announced() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    if !device_producer.stats().stream_announced() {
        tracing::warn!("Device stream not announced yet; recording without it");
    }

    let (mut capture, report) = CaptureSession::start(session_id, Arc::clone(&transport), config)?;
    if let Some(warning) = &report.warning {
        tracing::warn!("{}", warning);
    }
    let reference = config
        .producers
        .capture_reference
        .unwrap_or(WindowReference::new(1920.0, 1080.0));
    capture.set_capture_reference(Some(reference));
    capture.video_started(config.playback.default_fps)?;

    let bridge = capture.bridge_sender();
    let tick_interval = config.recorder.tick_interval();
    let pointer_period = Duration::from_millis(config.producers.pointer_period_ms.max(1));
    let total = Duration::from_secs_f64(duration.max(0.0));

    let started = Instant::now();
    let mut next_pointer = started;
    let mut next_heartbeat = started + Duration::from_secs(1);
    let mut step = 0u64;

    while started.elapsed() < total && !capture.end_requested() {
        let now = Instant::now();
        let t = started.elapsed().as_secs_f64();
        if now >= next_pointer {
            let x = reference.width * (0.5 + 0.4 * t.cos());
            let y = reference.height * (0.5 + 0.4 * t.sin());
            let kind = if step % 10 == 0 {
                PointerEventKind::Press
            } else {
                PointerEventKind::Move
            };
            if let Err(e) = capture.pointer(x, y, kind) {
                tracing::warn!("Pointer sample dropped: {}", e);
            }
            step += 1;
            next_pointer += pointer_period;
        }
        if now >= next_heartbeat {
            bridge.post(format!(
                r#"{{"type":"heartbeat","data":{{"elapsed":{:.3}}}}}"#,
                t
            ));
            next_heartbeat += Duration::from_secs(1);
        }

        let tick = capture.tick();
        for failure in &tick.recorded.failures {
            tracing::debug!("{}", failure);
        }
        std::thread::sleep(tick_interval);
    }

    let (record, saved) = capture.finish(out)?;
    if !device_producer.stop() {
        tracing::warn!("Device worker did not stop in time");
    }

    println!("Session:  {}", record.session_id);
    println!("Samples:  {}", record.sample_count());
    println!("Duration: {:.3}s", record.duration());
    for (name, count) in record.counts_by_stream() {
        println!("  {:<32} {}", name, count);
    }
    if let Some(path) = saved.path {
        println!("Saved to {}", path.display());
    }
    if let Some(reason) = saved.degraded {
        println!("Warning: degraded save ({})", reason);
    }
    Ok(())
}

fn inspect(path: &Path, limit: usize) -> Result<()> {
    let loaded = load(path)?;
    let record = &loaded.record;

    println!("Session:        {}", record.session_id);
    println!("Schema version: {}", loaded.source_version);
    if loaded.was_migrated() {
        println!("                (migrated on load)");
    }
    if let Some(recorded_at) = record.recorded_at {
        println!("Recorded at:    {}", recorded_at.to_rfc3339());
    }
    println!("Samples:        {}", record.sample_count());
    println!("Duration:       {:.3}s", record.duration());
    if let Some(anchor) = record.video_anchor() {
        println!("Video anchor:   {:.3}s", anchor);
    }
    if let Some(reference) = record.capture_reference {
        println!("Capture frame:  {}x{}", reference.width, reference.height);
    }
    if let Some(info) = &loaded.synchronization_info {
        println!("Sync:           {} ({})", info.sync_method, info.note);
    }

    println!("\nStreams:");
    for (stream, (_, count)) in record.streams.iter().zip(record.counts_by_stream()) {
        println!(
            "  {:<32} {:<8} {:>3} ch {:>8.2} Hz {:>8} sample(s)",
            stream.name,
            stream.kind.display_name(),
            stream.channel_count,
            stream.nominal_rate,
            count
        );
    }

    println!("\nFirst {} sample(s):", limit.min(record.sample_count()));
    for row in sample_rows(record, limit) {
        println!(
            "  {:>10.3}s  {:<32} {:<8} {}",
            row.relative_time, row.stream_name, row.channel, row.value
        );
    }
    Ok(())
}

fn seek(
    config: &SyncConfig,
    path: &Path,
    time: f64,
    frames: Option<u64>,
    fps: Option<f64>,
    trail: Option<f64>,
) -> Result<()> {
    let loaded = load(path)?;
    let mut engine = PlaybackEngine::with_settings(loaded.record, config.playback.clone());

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    match (frames, companion_video_path(dir, &engine.record().session_id)) {
        (Some(frames), _) => {
            let fps = fps.unwrap_or(config.playback.default_fps);
            engine.attach_video(&VideoInfo::new(fps, frames));
        }
        (None, Some(video)) => engine.set_video_unavailable(format!(
            "{} found but its frame count is unknown; pass --frames",
            video.display()
        )),
        (None, None) => engine.set_video_unavailable("no companion video"),
    }

    engine.seek(time);
    let now = engine.current_time();
    println!("Position: {:.3}s of {:.3}s", now, engine.duration());
    match engine.current_frame() {
        Ok(frame) => println!("Frame:    {}", frame),
        Err(e) => println!("Frame:    n/a ({})", e),
    }

    println!("\nNearest samples:");
    for sample in engine.samples_at(now) {
        let row = sample_row(sample);
        println!(
            "  {:<32} {:>10.3}s  {}",
            row.stream_name, row.relative_time, row.value
        );
    }

    let window = trail.unwrap_or(config.playback.trail_window_s);
    for stream in engine.record().streams.iter().filter(|s| s.is_pointer()) {
        let points = engine.trail_of(stream, now, window);
        println!(
            "\nTrail of '{}' over {:.2}s: {} point(s)",
            stream.name,
            window,
            points.len()
        );
    }
    Ok(())
}

fn play(config: &SyncConfig, path: &Path, from: f64, speed: f64) -> Result<()> {
    let loaded = load(path)?;
    let mut engine = PlaybackEngine::with_settings(loaded.record, config.playback.clone());
    let pointer = engine
        .record()
        .streams
        .iter()
        .find(|s| s.is_pointer())
        .map(|s| s.name.clone());

    let interval = Duration::from_millis(config.playback.update_interval_ms.max(1));
    engine.set_speed(speed);
    engine.seek(from);
    engine.play();

    let mut last = Instant::now();
    loop {
        let now = engine.current_time();
        let position = pointer
            .as_deref()
            .and_then(|name| engine.pointer_at(name, now));
        match position {
            Some((x, y)) => println!("{:>10.3}s  pointer ({:.3}, {:.3})", now, x, y),
            None => println!("{:>10.3}s", now),
        }
        if !engine.is_playing() {
            break;
        }

        std::thread::sleep(interval);
        let elapsed = last.elapsed().as_secs_f64();
        last = Instant::now();
        engine.advance(elapsed);
    }
    Ok(())
}

fn events(path: &Path) -> Result<()> {
    let loaded = load(path)?;
    let rows = event_rows(&loaded.record);
    if rows.is_empty() {
        println!("No structured events");
        return Ok(());
    }
    for row in rows {
        let wall_clock = row
            .wall_clock
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>10.2}s  {:<20} {:<32} {}",
            row.relative_time,
            row.event_type,
            wall_clock,
            row.details()
        );
    }
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => {
            config::ensure_app_data_dir()?;
            config::default_config_path().context("Could not determine config location")?
        }
    };
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    SyncConfig::default().save(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
