//! vvspeak main entry point
//!
//! Startup resolves the engine assets and loads the voice model; any failure
//! there ends the process. After that two threads run until SIGINT/SIGTERM:
//! 1. transport - accepts messages on the topic socket (and stdin)
//! 2. main - the single worker that synthesizes and plays them in order

use anyhow::Context;
use log::{debug, error, info, warn};
use nix::libc;
use nix::sys::signal::{self, SigHandler, Signal};
use std::fs::OpenOptions;
use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use vvspeak::assets::AssetLocator;
use vvspeak::audio::DeferredSink;
use vvspeak::bus::{self, Subscriber};
use vvspeak::cli::{Command, Options, USAGE};
use vvspeak::config::Config;
use vvspeak::pipeline::Pipeline;
use vvspeak::speech::VoicevoxEngine;
use vvspeak::worker;

/// Global flag set by SIGINT/SIGTERM handler
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Shutdown handler - sets flag, the loops notice within one poll interval
extern "C" fn handle_shutdown(_: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

fn main() {
    let opts = match Options::parse(std::env::args().skip(1)) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", USAGE);
            process::exit(2);
        }
    };

    init_logging(opts.debug, opts.log_file.as_deref());

    let result = match &opts.command {
        Command::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        Command::Version => {
            println!("{} {}", vvspeak::APP_NAME, vvspeak::VERSION);
            Ok(())
        }
        Command::Send(text) => send(&opts, text),
        Command::Run => run(&opts),
    };

    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        process::exit(1);
    }
}

fn init_logging(debug_mode: bool, log_file: Option<&Path>) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(log::LevelFilter::Info)
        .parse_default_env();
    if debug_mode {
        builder.filter_level(log::LevelFilter::Debug);
    }

    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                eprintln!(
                    "Warning: Failed to open {} for logging: {}",
                    path.display(),
                    e
                );
                eprintln!("Continuing with logging to stderr...");
            }
        }
    }

    builder.init();
}

fn load_config(opts: &Options) -> anyhow::Result<Config> {
    let mut config = match &opts.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    opts.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn send(opts: &Options, text: &str) -> anyhow::Result<()> {
    let config = load_config(opts)?;
    let path = config.socket_path()?;
    bus::publish(&path, text).with_context(|| format!("Publishing to {}", path.display()))?;
    debug!("Published {} bytes to {}", text.len(), path.display());
    Ok(())
}

fn run(opts: &Options) -> anyhow::Result<()> {
    info!("{} version {} starting", vvspeak::APP_NAME, vvspeak::VERSION);

    let config = load_config(opts)?;
    let pipeline_config = config.pipeline_config()?;
    info!("config      : {}", config.path().display());
    info!("engine_dir  : {}", pipeline_config.engine_root_dir.display());
    info!("vvm_file    : {}", pipeline_config.voice_model_file_name);
    info!("default style_id : {}", pipeline_config.default_style_id);

    // Set up signal handlers for shutdown
    unsafe {
        signal::signal(Signal::SIGINT, SigHandler::Handler(handle_shutdown))
            .context("Failed to set SIGINT handler")?;
        signal::signal(Signal::SIGTERM, SigHandler::Handler(handle_shutdown))
            .context("Failed to set SIGTERM handler")?;
    }

    let engine_options = config.engine_options()?;
    let backend = config.playback_backend()?;
    let player_command = config.player_command();
    let mut pipeline = Pipeline::start(
        &pipeline_config,
        &config.asset_names(),
        &AssetLocator::new(),
        |assets| VoicevoxEngine::new(assets, engine_options),
        || DeferredSink::new(backend, &player_command),
    )
    .context("VOICEVOX initialization failed")?;
    if !pipeline.sink().is_ready() {
        warn!("Playback unavailable; retrying with every message");
    }

    let (tx, rx) = worker::queue(config.queue_depth()?);

    let mut subscriber = Subscriber::bind(config.socket_path()?, config.socket_limits()?)?;
    info!(
        "Listening on topic '{}' at {}",
        config.topic()?,
        subscriber.path().display()
    );

    if opts.stdin {
        bus::stdin::spawn_reader(tx.clone()).context("Failed to start stdin reader")?;
        info!("Reading messages from stdin");
    }

    let transport = thread::Builder::new()
        .name("transport".to_string())
        .spawn(move || {
            if let Err(e) = subscriber.run(&tx, &SHUTDOWN) {
                error!("Transport stopped: {}", e);
            }
        })
        .context("Failed to start transport thread")?;

    info!("vvspeak ready (default style_id={})", pipeline.default_style_id());
    let stats = worker::run(&mut pipeline, rx, &SHUTDOWN);

    // The worker can also stop because every source closed
    SHUTDOWN.store(true, Ordering::Relaxed);
    if transport.join().is_err() {
        error!("Transport thread panicked");
    }

    info!(
        "Shutting down after {} messages: {} played, {} skipped, {} failed",
        stats.total(),
        stats.played,
        stats.skipped,
        stats.failed
    );
    drop(pipeline);
    debug!("Engine released");

    Ok(())
}
