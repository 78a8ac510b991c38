//! `topscan` – depth-camera topology scanner shell.
//!
//! This binary:
//!
//! 1. Installs structured logging (see `topscan_runtime::telemetry`).
//! 2. Checks for `~/.topscan/config.toml`; runs a **First-Run Wizard** when the
//!    file is absent.
//! 3. Probes the machine controller and reports its position.
//! 4. Drops the operator into an **interactive REPL** with slash-commands
//!    (`/reference`, `/object`, `/topology`, `/move`, `/help`, …).
//! 5. Intercepts **Ctrl-C** so the shell exits after the current request.

mod config;
mod preview;
mod repl;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use topscan_hal::machine::MachineClient;

fn main() {
    let _telemetry = topscan_runtime::init_tracing("topscan");

    print_banner();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – finishing the current request …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

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
            config::Config::default()
        }
    };

    probe_machine(&cfg);

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(&cfg, shutdown);
}

fn probe_machine(cfg: &config::Config) {
    if cfg.uses_sim_machine() {
        println!("\n  Machine: {}", "simulated".yellow());
        return;
    }
    print!("\n  Probing machine at {} … ", cfg.machine_url.dimmed());
    std::io::Write::flush(&mut std::io::stdout()).ok();
    match MachineClient::connect(cfg.machine_url.clone(), cfg.request_timeout()) {
        Ok(mut client) => match client.query_position().position() {
            Some(p) => println!("{} at {}", "online".green(), p.to_string().bold()),
            None => println!("{}", "offline".yellow()),
        },
        Err(e) => println!("{} ({e})", "unavailable".red()),
    }
}

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║       TopScan First-Run Wizard       ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up the scanner.\n");

    let mut cfg = config::Config::default();

    cfg.machine_url = prompt_line(
        &format!(
            "  Machine API URL, or '{}' for a simulated machine [{}]: ",
            config::SIM_MACHINE,
            cfg.machine_url
        ),
        &cfg.machine_url,
    );

    let calibration = cfg.calibration_path.display().to_string();
    cfg.calibration_path =
        prompt_line(&format!("  Calibration file [{calibration}]: "), &calibration).into();

    let output = cfg.output_dir.display().to_string();
    cfg.output_dir = prompt_line(&format!("  Output directory [{output}]: "), &output).into();

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

fn print_banner() {
    println!();
    println!("{}", r#"  ______          _____                 "#.bold().cyan());
    println!("{}", r#" /_  __/__  ___  / ___/______ ____      "#.bold().cyan());
    println!("{}", r#"  / / / _ \/ _ \_\ \/ __/ _ `/ _ \     "#.bold().cyan());
    println!("{}", r#" /_/  \___/ .__/___/\__/\_,_/_//_/     "#.bold().cyan());
    println!("{}", r#"         /_/                           "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "TopScan".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Depth-camera topology scanner");
    println!();
}

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
