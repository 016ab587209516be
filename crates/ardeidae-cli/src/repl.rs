//! REPL – Read-Eval-Print Loop for the Ardeidae operator shell.
//!
//! Supported slash-commands:
//!   /help         – show this list
//!   /start        – ask the host to start streaming sensor data
//!   /calibrate    – capture the current readings as the baseline
//!   /status       – indicators, orientation and view frames
//!   /log          – the visible window of the event log
//!   /config       – print the active configuration
//!   /schema       – print the configuration JSON Schema
//!   /settings     – interactively edit `~/.ardeidae/config.toml`
//!   /quit | /exit – dispose the views and exit

use colored::{ColoredString, Colorize};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ardeidae_types::{Axis, CalibrationMode, Color, StyledSegment};
use tokio::runtime::Handle;

use crate::config::{self, Config};
use crate::session::{HostMode, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Start,
    Calibrate,
    Status,
    Log,
    Config,
    Schema,
    Settings,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    match line.trim() {
        "" => Command::Empty,
        "/help" | "/?" => Command::Help,
        "/start" => Command::Start,
        "/calibrate" => Command::Calibrate,
        "/status" => Command::Status,
        "/log" => Command::Log,
        "/config" => Command::Config,
        "/schema" => Command::Schema,
        "/settings" => Command::Settings,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(rt: &Handle, session: &Session, cfg: &Config, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "ardeidae>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        match parse_command(&line) {
            Command::Empty => continue,
            Command::Help => cmd_help(),
            Command::Start => cmd_start(rt, session),
            Command::Calibrate => cmd_calibrate(rt, session),
            Command::Status => cmd_status(rt, session),
            Command::Log => cmd_log(rt, session),
            Command::Config => cmd_config(cfg),
            Command::Schema => cmd_schema(),
            Command::Settings => cmd_settings(),
            Command::Quit => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Command::Unknown(other) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Ardeidae Commands".bold().underline());
    println!("  {}        – ask the host to start the sensors", "/start".bold().cyan());
    println!("  {}    – capture the current orientation as baseline", "/calibrate".bold().cyan());
    println!("  {}       – indicators, orientation and views", "/status".bold().cyan());
    println!("  {}          – show the event log", "/log".bold().cyan());
    println!("  {}       – print the active configuration", "/config".bold().cyan());
    println!("  {}       – print the configuration JSON Schema", "/schema".bold().cyan());
    println!("  {}     – edit ~/.ardeidae/config.toml", "/settings".bold().cyan());
    println!("  {}  – exit the dashboard", "/quit  /exit".bold().cyan());
    println!();
}

fn cmd_start(rt: &Handle, session: &Session) {
    if session.host_mode() == HostMode::Offline {
        println!(
            "  {} no host attached; the request is a no-op.",
            "Warning:".yellow()
        );
    }
    match rt.block_on(session.dashboard().start_sensors()) {
        Ok(()) => println!("{}", "✓ Start sensors requested.".green()),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn cmd_calibrate(rt: &Handle, session: &Session) {
    match rt.block_on(session.dashboard().calibrate()) {
        Ok(b) => println!(
            "{} x={:.2} y={:.2} z={:.2}",
            "✓ Baseline captured:".green(),
            b.x,
            b.y,
            b.z
        ),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn cmd_status(rt: &Handle, session: &Session) {
    let status = match rt.block_on(session.dashboard().status()) {
        Ok(s) => s,
        Err(e) => {
            println!("{}: {}", "Error".red(), e);
            return;
        }
    };
    let o = session.dashboard().orientation();

    println!("{}", "Status".bold().underline());
    let host = match session.host_mode() {
        HostMode::Simulated => "simulated".yellow(),
        HostMode::Connected => "connected".green(),
        HostMode::Offline => "offline".red(),
    };
    println!("  {} host", indicator(status.host_available));
    println!("     ({host})");
    println!("  {} sensors started", indicator(status.sensors_started));
    println!("  {} accelerometer active", indicator(status.accelerometer_active));
    println!("  {} ring connected", indicator(status.ring_connected));

    println!();
    println!("{}", "Orientation (degrees)".bold().underline());
    println!("  {:<10}{:>10}{:>12}", "", "raw", "calibrated");
    for axis in Axis::ALL {
        println!(
            "  {:<10}{:>10}{:>12}",
            axis.to_string(),
            fmt_deg(o.reading(axis)),
            fmt_deg(o.calibrated(axis))
        );
    }
    println!("  {:<10}{:>10}", "distance", fmt_deg(o.distance));
    println!(
        "  baseline  x={:.2} y={:.2} z={:.2}  (mode {}, epoch {})",
        o.baseline.x,
        o.baseline.y,
        o.baseline.z,
        o.mode,
        o.calibration_epoch
    );

    println!();
    println!("{}", "Views".bold().underline());
    for f in rt.block_on(session.latest_frames()) {
        println!(
            "  {:<8} #{:<7} x={:>7.3} y={:>7.3} z={:>7.3}  {}x{}  {}",
            f.view.bold(),
            f.frame,
            f.rotation.x,
            f.rotation.y,
            f.rotation.z,
            f.width,
            f.height,
            if f.content_loaded { "loaded".green() } else { "no model".dimmed() }
        );
    }
}

fn cmd_log(rt: &Handle, session: &Session) {
    match rt.block_on(session.dashboard().visible_log()) {
        Ok(entries) if entries.is_empty() => println!("  {}", "(no log entries yet)".dimmed()),
        Ok(entries) => {
            for entry in entries {
                let line: String = entry.segments.iter().map(|s| paint(s).to_string()).collect();
                println!("  {:>4} {}", entry.index.to_string().dimmed(), line);
            }
        }
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn cmd_config(cfg: &Config) {
    println!("{}", "Active configuration".bold().underline());
    println!("  {}", config::config_path().display().to_string().dimmed());
    match config::to_toml(cfg) {
        Ok(text) => println!("{text}"),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn cmd_schema() {
    match Config::json_schema() {
        Ok(schema) => println!("{schema}"),
        Err(e) => println!("{}: {}", "Error".red(), e),
    }
}

fn cmd_settings() {
    let mut cfg = match config::load() {
        Ok(Some(c)) => c,
        Ok(None) => Config::default(),
        Err(e) => {
            println!("{}: {}", "Error loading config".red(), e);
            return;
        }
    };

    println!("{}", "Settings Editor".bold().underline());
    let d = &mut cfg.dashboard;

    d.host_url = prompt_str(&format!("  Host URL         [{}]: ", d.host_url), &d.host_url);
    d.webui_port = prompt_u16(&format!("  Web UI port      [{}]: ", d.webui_port), d.webui_port);

    let mode = prompt_str(
        &format!("  Calibration mode [{}] (local / host): ", d.calibration_mode),
        &d.calibration_mode.to_string(),
    );
    match mode.parse::<CalibrationMode>() {
        Ok(m) => d.calibration_mode = m,
        Err(_) => println!(
            "  {} '{}' is not a calibration mode, keeping {}",
            "Warning:".yellow(),
            mode,
            d.calibration_mode
        ),
    }

    let rate = prompt_str(&format!("  Frame rate       [{}]: ", d.frame_rate), &d.frame_rate.to_string());
    match rate.parse::<u32>() {
        Ok(r) => d.frame_rate = r,
        Err(_) => println!("  {} '{}' is not a number, keeping {}", "Warning:".yellow(), rate, d.frame_rate),
    }

    let simulate = prompt_str(&format!("  Simulate host    [{}]: ", d.simulate), &d.simulate.to_string());
    if let Some(flag) = config::parse_flag(&simulate) {
        d.simulate = flag;
    }

    cfg.osc.port = prompt_u16(&format!("  OSC port         [{}]: ", cfg.osc.port), cfg.osc.port);

    if let Err(e) = cfg.validate() {
        println!("{}: {}", "Not saved".red(), e);
        return;
    }
    match config::save(&cfg) {
        Ok(()) => {
            println!(
                "{} {}",
                "✓ Settings saved to".green(),
                config::config_path().display().to_string().bold()
            );
            println!("  Restart the dashboard to apply them.");
        }
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn indicator(on: bool) -> ColoredString {
    if on { "🟢".green() } else { "🔴".red() }
}

/// Two-decimal rendering of an optional angle; `–` when absent.
pub(crate) fn fmt_deg(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "–".to_string(),
    }
}

pub(crate) fn term_color(color: Color) -> colored::Color {
    match color {
        Color::Black => colored::Color::Black,
        Color::Red => colored::Color::Red,
        Color::Green => colored::Color::Green,
        Color::Yellow => colored::Color::Yellow,
        Color::Blue => colored::Color::Blue,
        Color::Magenta => colored::Color::Magenta,
        Color::Cyan => colored::Color::Cyan,
        Color::White => colored::Color::White,
    }
}

fn paint(segment: &StyledSegment) -> ColoredString {
    let mut out = segment.text.as_str().normal();
    if let Some(fg) = segment.style.foreground {
        out = out.color(term_color(fg));
    }
    if let Some(bg) = segment.style.background {
        out = out.on_color(term_color(bg));
    }
    if segment.style.bold {
        out = out.bold();
    }
    if segment.style.underline {
        out = out.underline();
    }
    out
}

/// Prompt for a u16 port.  Returns `default` when the user presses Enter.
pub(crate) fn prompt_u16(msg: &str, default: u16) -> u16 {
    let raw = prompt_str(msg, &default.to_string());
    match raw.parse::<u16>() {
        Ok(v) if v != 0 => v,
        _ => {
            println!(
                "  {} '{}' is not a valid port number, keeping {}",
                "Warning:".yellow(),
                raw,
                default
            );
            default
        }
    }
}

/// Prompt for a string value.  Returns `default` when the user presses Enter.
pub(crate) fn prompt_str(msg: &str, default: &str) -> String {
    print!("{}", msg);
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let trimmed = line.trim().to_string();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed
            }
        }
        Err(_) => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ardeidae_types::Style;

    #[test]
    fn parses_slash_commands() {
        assert_eq!(parse_command("/start\n"), Command::Start);
        assert_eq!(parse_command("  /calibrate "), Command::Calibrate);
        assert_eq!(parse_command("/exit"), Command::Quit);
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command(""), Command::Empty);
        assert_eq!(parse_command("calibrate"), Command::Unknown("calibrate".into()));
    }

    #[test]
    fn degrees_use_two_decimals() {
        assert_eq!(fmt_deg(Some(12.345)), "12.35");
        assert_eq!(fmt_deg(Some(0.0)), "0.00");
        assert_eq!(fmt_deg(Some(-3.0)), "-3.00");
        assert_eq!(fmt_deg(None), "–");
    }

    #[test]
    fn every_log_colour_maps_to_its_terminal_colour() {
        assert_eq!(term_color(Color::Green), colored::Color::Green);
        assert_eq!(term_color(Color::Blue), colored::Color::Blue);
        assert_eq!(term_color(Color::White), colored::Color::White);
    }

    #[test]
    fn painting_keeps_segment_text() {
        colored::control::set_override(false);
        let seg = StyledSegment {
            style: Style {
                foreground: Some(Color::Green),
                background: None,
                bold: true,
                underline: false,
            },
            text: "Ring connected".into(),
        };
        assert_eq!(paint(&seg).to_string(), "Ring connected");
    }
}
