//! vpad host entry point.
//!
//! Loads the configuration, builds the controller manager over a device
//! backend, and plays the configured input sequence until it finishes or
//! Ctrl-C is pressed.  Every controller still attached at exit is detached.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config_from()                   -- TOML config, defaults if absent
//!  └─ VirtualControllerManager::with_options()
//!  └─ ScriptApi + SequencePlayer
//!  └─ run_sequence_loop()                  -- once, or repeated per frame interval
//!  └─ detach_all()                         -- shutdown cleanup
//! ```
//!
//! # Command line
//!
//! ```text
//! vpad-host [--config <path>] [--sequence <path>] [--loop] [--write-config]
//! ```
//!
//! `VPAD_CONFIG` and `VPAD_SEQUENCE` may stand in for the first two flags.
//! `--sequence` and `--loop` override `host.sequence_path` and
//! `host.loop_sequence` from the config file.  Without a sequence the host
//! keeps running idle until Ctrl-C.  `--write-config` saves the effective
//! configuration to the config path and exits.
//!
//! A failed sequence ends the process with an error; when the failure carries
//! a result code (a backend error or a `fatal` step) the code is logged too.
//!
//! # Device backend
//!
//! The `InMemoryDeviceBackend` used here records devices and pushed state
//! instead of talking to a platform input service.  A platform build swaps in
//! its own `DeviceBackend` implementation at the marked line.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vpad_host::application::manage_controllers::{DeviceBackend, VirtualControllerManager};
use vpad_host::application::play_sequence::{
    run_sequence_loop, LoopOptions, Sequence, SequencePlayer,
};
use vpad_host::application::script_api::ScriptApi;
use vpad_host::infrastructure::device_backend::in_memory::InMemoryDeviceBackend;
use vpad_host::infrastructure::storage::config::{
    load_config_from, resolve_config_path, save_config_to, HostConfig,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// vpad virtual controller host.
#[derive(Debug, Parser)]
#[command(
    name = "vpad-host",
    about = "Attaches virtual gamepads and plays input sequences through them",
    version
)]
struct Cli {
    /// Config file to load instead of the platform default.
    #[arg(long, env = "VPAD_CONFIG")]
    config: Option<PathBuf>,

    /// Sequence file to play; overrides `host.sequence_path`.
    #[arg(long, env = "VPAD_SEQUENCE")]
    sequence: Option<PathBuf>,

    /// Replay the sequence until Ctrl-C; overrides `host.loop_sequence`.
    #[arg(long = "loop")]
    repeat: bool,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    write_config: bool,
}

/// Merges the playback flags over the `[host]` config section.
///
/// `--sequence` replaces `sequence_path`; `--loop` and `loop_sequence` are
/// combined, so either one turns repetition on.
fn playback_settings(cli: &Cli, host: &HostConfig) -> (Option<PathBuf>, LoopOptions) {
    let sequence = cli.sequence.clone().or_else(|| host.sequence_path.clone());
    let options = LoopOptions {
        repeat: cli.repeat || host.loop_sequence,
        interval: host.frame_interval(),
    };
    (sequence, options)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let config_path = resolve_config_path(args.config.as_deref())?;
    let config = load_config_from(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    if args.write_config {
        save_config_to(&config_path, &config)
            .with_context(|| format!("writing config to {}", config_path.display()))?;
        println!("config written to {}", config_path.display());
        return Ok(());
    }

    // Initialise structured logging; RUST_LOG wins over the config level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.host.log_level)),
        )
        .init();

    info!("vpad host starting");

    // ── Device backend ────────────────────────────────────────────────────────
    // Platform builds replace the in-memory backend here.
    let backend: Arc<dyn DeviceBackend> = Arc::new(InMemoryDeviceBackend::new());
    let manager = Arc::new(VirtualControllerManager::with_options(
        backend,
        config.controller.manager_options(),
    ));
    let api = ScriptApi::new(Arc::clone(&manager));

    // Shutdown flag.
    let running = Arc::new(AtomicBool::new(true));

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    // ── Sequence playback ─────────────────────────────────────────────────────
    let (sequence_path, options) = playback_settings(&args, &config.host);
    let outcome = match sequence_path {
        Some(path) => {
            let sequence = Sequence::load(&path)
                .with_context(|| format!("loading sequence from {}", path.display()))?;
            info!(path = %path.display(), steps = sequence.steps.len(), "sequence loaded");

            let player = SequencePlayer::new(api, config.controller.default_identity());
            run_sequence_loop(player, Arc::new(sequence), options, Arc::clone(&running))
                .await
                .map(|passes| info!(passes, "sequence playback finished"))
        }
        None => {
            info!("no sequence configured; idling until Ctrl-C");
            while running.load(Ordering::Relaxed) {
                tokio::time::sleep(options.interval).await;
            }
            Ok(())
        }
    };

    // ── Shutdown ──────────────────────────────────────────────────────────────
    for (handle, err) in manager.detach_all() {
        warn!(%handle, "detach on shutdown failed: {err}");
    }

    if let Err(e) = outcome {
        match e.result_code() {
            Some(code) => error!(%code, error_code = %code.error_code(), "sequence playback failed: {e}"),
            None => error!("sequence playback failed: {e}"),
        }
        return Err(e.into());
    }

    info!("vpad host stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(sequence: Option<&str>, repeat: bool) -> Cli {
        Cli {
            config: None,
            sequence: sequence.map(PathBuf::from),
            repeat,
            write_config: false,
        }
    }

    fn host(sequence: Option<&str>, loop_sequence: bool) -> HostConfig {
        HostConfig {
            sequence_path: sequence.map(PathBuf::from),
            loop_sequence,
            ..HostConfig::default()
        }
    }

    #[test]
    fn test_sequence_flag_wins_over_config() {
        let (sequence, _) = playback_settings(&cli(Some("flag.toml"), false), &host(Some("cfg.toml"), false));
        assert_eq!(sequence, Some(PathBuf::from("flag.toml")));
    }

    #[test]
    fn test_sequence_falls_back_to_config() {
        let (sequence, _) = playback_settings(&cli(None, false), &host(Some("cfg.toml"), false));
        assert_eq!(sequence, Some(PathBuf::from("cfg.toml")));
    }

    #[test]
    fn test_no_sequence_when_neither_is_set() {
        // Arrange / Act
        let (sequence, options) = playback_settings(&cli(None, false), &host(None, false));

        // Assert
        assert_eq!(sequence, None);
        assert!(!options.repeat);
        assert_eq!(options.interval, HostConfig::default().frame_interval());
    }

    #[test]
    fn test_loop_flag_and_config_are_combined() {
        for (flag, configured, expected) in [
            (false, false, false),
            (true, false, true),
            (false, true, true),
            (true, true, true),
        ] {
            let (_, options) = playback_settings(&cli(None, flag), &host(None, configured));
            assert_eq!(options.repeat, expected, "flag={flag} config={configured}");
        }
    }

    #[test]
    fn test_cli_parses_all_flags() {
        let parsed = Cli::try_parse_from([
            "vpad-host",
            "--config",
            "c.toml",
            "--sequence",
            "s.toml",
            "--loop",
            "--write-config",
        ])
        .expect("valid arguments");

        assert_eq!(parsed.config, Some(PathBuf::from("c.toml")));
        assert_eq!(parsed.sequence, Some(PathBuf::from("s.toml")));
        assert!(parsed.repeat);
        assert!(parsed.write_config);
    }
}
