//! `ardeidae-cli` – Ardeidae Command Line Interface
//!
//! This binary boots the sensor-ring dashboard.  It:
//!
//! 1. Checks for `~/.ardeidae/config.toml`; runs a **First-Run Wizard** when
//!    the file is absent.
//! 2. Probes the host process (or starts the built-in simulator) and brings
//!    up the pipeline, both scene views and the cockpit page.
//! 3. Drops the operator into an **interactive REPL** with slash-commands
//!    (`/start`, `/calibrate`, `/status`, `/log`, `/settings`, `/help`).
//! 4. Intercepts **Ctrl-C** to dispose every view before exiting.

mod config;
mod repl;
mod session;

use colored::Colorize;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use ardeidae_types::CalibrationMode;

use crate::config::Config;
use crate::repl::{prompt_str, prompt_u16};
use crate::session::{HostMode, Session};

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the level; ARDEIDAE_LOG_FORMAT=json switches to
    // newline-delimited JSON.  User-facing output stays on println!.
    let _telemetry = ardeidae_runtime::init_tracing("ardeidae");

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(None) => run_first_run_wizard(),
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            Config::default()
        }
    };
    let cfg = match cfg.validate() {
        Ok(()) => cfg,
        Err(e) => {
            println!("{}: {}", "Invalid config".red(), e);
            println!("  Using default configuration.");
            Config::default()
        }
    };

    // ── Async runtime ─────────────────────────────────────────────────────
    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start the async runtime".red(), e);
            std::process::exit(1);
        }
    };

    // ── Boot ──────────────────────────────────────────────────────────────
    if cfg.dashboard.simulate {
        print!("\n  Starting simulated host … ");
    } else {
        print!("\n  Probing host at {} … ", cfg.dashboard.host_url.dimmed());
    }
    std::io::stdout().flush().ok();
    let session = Arc::new(rt.block_on(Session::boot(&cfg)));
    match session.host_mode() {
        HostMode::Simulated => println!("{}", "simulated".yellow()),
        HostMode::Connected => println!("{}", "online".green()),
        HostMode::Offline => {
            println!("{}", "offline".yellow());
            println!(
                "  {}  Commands will be accepted but nothing will stream.",
                "No host detected.".dimmed()
            );
        }
    }
    println!(
        "  Calibration mode {}, {} fps",
        cfg.dashboard.calibration_mode.to_string().bold(),
        cfg.dashboard.frame_rate
    );
    println!(
        "  Cockpit at {}",
        format!("http://localhost:{}", cfg.dashboard.webui_port).bold()
    );

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    let session_ctrlc = session.clone();
    let handle = rt.handle().clone();

    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – disposing views …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
        handle.block_on(session_ctrlc.dispose());
        println!("{}", "  ✓ Views disposed.".green());
        println!("{}", "  ✓ Exiting Ardeidae.".green());
        std::process::exit(0);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; views will not be disposed on Ctrl-C");
    }

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(rt.handle(), &session, &cfg, shutdown);

    rt.block_on(session.dispose());
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║      Ardeidae First-Run Wizard       ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up Ardeidae.\n");

    let mut cfg = Config::default();

    // Host
    println!("  Where does the sensor data come from?");
    println!("    1) A host process over WebSocket  (default)");
    println!("    2) The built-in simulator");
    let choice = prompt_str("  Enter choice [1]: ", "1");
    cfg.dashboard.simulate = choice.trim() == "2";

    if !cfg.dashboard.simulate {
        cfg.dashboard.host_url = prompt_str(
            &format!("  Host WebSocket URL [{}]: ", cfg.dashboard.host_url),
            &cfg.dashboard.host_url,
        );
    }

    // Calibration
    println!("  Where should calibration baselines live?");
    println!("    1) In the dashboard only  (default)");
    println!("    2) Pushed to the host, which may report its own offsets");
    let choice = prompt_str("  Enter choice [1]: ", "1");
    cfg.dashboard.calibration_mode = match choice.trim() {
        "2" => CalibrationMode::Host,
        _ => CalibrationMode::Local,
    };

    // Web UI port
    cfg.dashboard.webui_port = prompt_u16(
        &format!("  Web UI HTTP port [{}]: ", cfg.dashboard.webui_port),
        cfg.dashboard.webui_port,
    );

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }

    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___            __    _    __          "#.bold().cyan());
    println!("{}", r#"  / _ | _______ _/ /__ (_)__/ /__ ____    "#.bold().cyan());
    println!("{}", r#" / __ |/ __/ _ `/ / -_) / _  / _ `/ -_)   "#.bold().cyan());
    println!("{}", r#"/_/ |_/_/  \_,_/_/\__/_/\_,_/\_,_/\__/    "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Ardeidae".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Sensor Ring Dashboard");
    println!();
}
