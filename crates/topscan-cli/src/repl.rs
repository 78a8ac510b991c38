//! REPL – the interactive scanning shell.
//!
//! Every accepted command runs one iteration of the [`ControlLoop`]: a depth
//! frame is acquired, the command's action is applied, and the frame is
//! handed to the preview.
//!
//! Supported slash-commands:
//!   /reference            – capture the current frame into the reference set
//!   /object               – capture the current frame into the object set
//!   /topology             – build and save the topology
//!   /print <set>          – list a point set
//!   /save <set>           – sort, deduplicate and save a point set
//!   /clear <set>          – empty a point set
//!   /calibrate            – reload the origin from the calibration file
//!   /origin-from-machine  – adopt the machine position as the origin
//!   /origin               – show the current origin
//!   /move <x> <y> <z>     – send a rapid move to the machine
//!   /gcode <command>      – send a raw G-code line
//!   /position             – query the machine position
//!   /scene <table|box>    – change the simulated scene
//!   /preview              – toggle the ASCII depth preview
//!   /frame                – acquire a frame without doing anything else
//!   /help                 – show this list
//!   /quit | /exit         – exit the shell

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use topscan_hal::machine::{HttpTransport, MachineClient, Transport};
use topscan_hal::sim::{SimBox, SimDepthSource, SimMachine};
use topscan_runtime::{Action, CaptureTarget, ControlLoop, Report, ScanSession, SetKind};

use crate::config::Config;
use crate::preview::TerminalSink;

/// Distance from the simulated sensor to the table, in millimetres.
const SIM_TABLE_DEPTH: u16 = 1000;

/// Height of the simulated box, in millimetres.
const SIM_BOX_HEIGHT: u16 = 150;

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(Action),
    /// Acquire and preview only.
    Frame,
    Scene { with_box: bool },
    TogglePreview,
    ShowOrigin,
    Help,
    Quit,
}

/// Parse one shell line.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();

    let command = match head {
        "/reference" => Command::Run(Action::Capture(CaptureTarget::Reference)),
        "/object" => Command::Run(Action::Capture(CaptureTarget::Object)),
        "/topology" => Command::Run(Action::BuildTopology),
        "/print" => Command::Run(Action::Print(parse_set(&args)?)),
        "/save" => Command::Run(Action::Save(parse_set(&args)?)),
        "/clear" => Command::Run(Action::Clear(parse_set(&args)?)),
        "/calibrate" => Command::Run(Action::Calibrate),
        "/origin-from-machine" => Command::Run(Action::CalibrateFromMachine),
        "/origin" => Command::ShowOrigin,
        "/move" => {
            let [x, y, z] = args.as_slice() else {
                return Err("usage: /move <x> <y> <z>".to_string());
            };
            Command::Run(Action::MoveTo {
                x: parse_coord(x)?,
                y: parse_coord(y)?,
                z: parse_coord(z)?,
            })
        }
        "/gcode" => {
            if args.is_empty() {
                return Err("usage: /gcode <command>".to_string());
            }
            Command::Run(Action::SendGcode(args.join(" ")))
        }
        "/position" => Command::Run(Action::QueryPosition),
        "/scene" => match args.as_slice() {
            ["table"] => Command::Scene { with_box: false },
            ["box"] => Command::Scene { with_box: true },
            _ => return Err("usage: /scene <table|box>".to_string()),
        },
        "/preview" => Command::TogglePreview,
        "/frame" => Command::Frame,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => return Err(format!("Unknown command: '{other}'")),
    };
    Ok(command)
}

fn parse_set(args: &[&str]) -> Result<SetKind, String> {
    match args {
        ["reference" | "ref"] => Ok(SetKind::Reference),
        ["object" | "obj" | "topology-reference"] => Ok(SetKind::Object),
        ["topology" | "topo"] => Ok(SetKind::Topology),
        _ => Err("expected a set: reference | object | topology".to_string()),
    }
}

fn parse_coord(raw: &str) -> Result<f32, String> {
    raw.parse::<f32>()
        .map_err(|_| format!("'{raw}' is not a number"))
}

/// Machine client over the transport selected by `cfg`.
fn machine_client(cfg: &Config) -> Result<MachineClient<Box<dyn Transport>>, String> {
    let transport: Box<dyn Transport> = if cfg.uses_sim_machine() {
        Box::new(SimMachine::new())
    } else {
        Box::new(HttpTransport::new(cfg.request_timeout()).map_err(|e| e.to_string())?)
    };
    let base_url = if cfg.uses_sim_machine() {
        "http://sim".to_string()
    } else {
        cfg.machine_url.clone()
    };
    Ok(MachineClient::with_transport(base_url, transport))
}

fn sim_source(cfg: &Config, with_box: bool) -> SimDepthSource {
    let source = SimDepthSource::new(cfg.sim_width, cfg.sim_height, SIM_TABLE_DEPTH);
    if !with_box {
        return source;
    }
    source.with_box(SimBox {
        x0: cfg.sim_width / 4,
        y0: cfg.sim_height / 4,
        x1: cfg.sim_width * 3 / 4,
        y1: cfg.sim_height * 3 / 4,
        height: SIM_BOX_HEIGHT,
    })
}

/// Entry point for the interactive shell.
///
/// `shutdown` is polled each iteration; when set the shell exits cleanly.
pub fn run(cfg: &Config, shutdown: Arc<AtomicBool>) {
    let machine = match machine_client(cfg) {
        Ok(m) => m,
        Err(e) => {
            println!("{}: {}", "Machine client error".red(), e);
            return;
        }
    };
    let preview = Arc::new(AtomicBool::new(false));
    let mut control = ControlLoop::new(
        ScanSession::new(cfg.session_config()),
        Box::new(sim_source(cfg, false)),
        machine,
    )
    .with_sink(Box::new(TerminalSink::new(preview.clone())))
    .with_frame_timeout(cfg.frame_timeout());

    let mut editor = match DefaultEditor::new() {
        Ok(ed) => ed,
        Err(e) => {
            println!("{}: {}", "Terminal error".red(), e);
            return;
        }
    };
    let prompt = format!("{} ", "topscan>".bold().cyan());

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let line = match editor.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = editor.add_history_entry(line) {
            warn!(error = %e, "history entry dropped");
        }

        match parse_command(line) {
            Ok(Command::Run(action)) => {
                for report in control.step(&[action]) {
                    print_report(&report);
                }
            }
            Ok(Command::Frame) => {
                control.step(&[]);
            }
            Ok(Command::Scene { with_box }) => {
                control.replace_source(Box::new(sim_source(cfg, with_box)));
                println!(
                    "  Scene: {}",
                    (if with_box { "box on table" } else { "bare table" }).bold()
                );
            }
            Ok(Command::TogglePreview) => {
                let on = !preview.load(Ordering::Relaxed);
                preview.store(on, Ordering::Relaxed);
                println!("  Preview {}", if on { "on".green() } else { "off".yellow() });
            }
            Ok(Command::ShowOrigin) => {
                println!("  Origin: {}", control.session().origin().to_string().bold());
            }
            Ok(Command::Help) => cmd_help(),
            Ok(Command::Quit) => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Err(e) => {
                println!(
                    "{} {}. Type {} for available commands.",
                    "Error:".red(),
                    e.yellow(),
                    "/help".bold()
                );
            }
        }
    }
}

fn print_report(report: &Report) {
    match report {
        Report::Captured {
            target,
            added,
            total,
        } => println!(
            "  {} Sample saved: {} point(s) added to {} ({} total)",
            "✓".green(),
            added,
            SetKind::from(*target).to_string().bold(),
            total
        ),
        Report::CaptureSkipped { target, reason } => println!(
            "  {} No frame for {}: {}",
            "⚠".yellow(),
            SetKind::from(*target).to_string().bold(),
            reason.dimmed()
        ),
        Report::TopologyBuilt {
            summary,
            saved,
            elapsed,
        } => {
            println!(
                "  {} Topology: {} point(s), {} matched, {} unmatched",
                "✓".green(),
                summary.points,
                summary.matched,
                summary.unmatched
            );
            match saved {
                Ok(path) => println!("    saved to {}", path.display().to_string().bold()),
                Err(e) => println!("    {}: {}", "save failed".red(), e),
            }
            println!("    Elapsed time: {:.3} s", elapsed.as_secs_f64());
        }
        Report::Points { kind, points } => {
            println!("  {} ({} point(s))", kind.to_string().bold().underline(), points.len());
            for p in points {
                println!("    {p}");
            }
        }
        Report::Saved { kind, result } => match result {
            Ok((path, count)) => println!(
                "  {} {} saved: {} point(s) to {}",
                "✓".green(),
                kind.to_string().bold(),
                count,
                path.display()
            ),
            Err(e) => println!("  {} saving {}: {}", "Error".red(), kind, e),
        },
        Report::Cleared(kind) => println!("  {} {} cleared", "✓".green(), kind.to_string().bold()),
        Report::Calibrated { success, origin } => {
            if *success {
                println!("  {} Origin set to {}", "✓".green(), origin.to_string().bold());
            } else {
                println!(
                    "  {} Calibration failed; origin stays {}",
                    "⚠".yellow(),
                    origin.to_string().bold()
                );
            }
        }
        Report::MachineCommand { command, result } => match result {
            Ok(()) => println!("  {} sent {}", "✓".green(), command.bold()),
            Err(e) => println!("  {} {}: {}", "Error".red(), command, e),
        },
        Report::Position(status) => match status.position() {
            Some(p) => println!("  Machine at {}", p.to_string().bold()),
            None => println!("  {} machine position unavailable", "⚠".yellow()),
        },
    }
}

fn cmd_help() {
    println!();
    println!("{}", "Scanner Commands".bold().underline());
    let rows = [
        ("/reference", "capture the current frame into the reference set"),
        ("/object", "capture the current frame into the object set"),
        ("/topology", "build the topology and save topology.xyz"),
        ("/print <set>", "list reference | object | topology"),
        ("/save <set>", "sort, deduplicate and save a set"),
        ("/clear <set>", "empty a set"),
        ("/calibrate", "reload the origin from the calibration file"),
        ("/origin-from-machine", "use the machine position as origin"),
        ("/origin", "show the current origin"),
        ("/move <x> <y> <z>", "rapid move"),
        ("/gcode <command>", "send a raw G-code line"),
        ("/position", "query the machine position"),
        ("/scene <table|box>", "change the simulated scene"),
        ("/preview", "toggle the ASCII depth preview"),
        ("/frame", "acquire one frame"),
        ("/quit  /exit", "exit the shell"),
    ];
    for (cmd, what) in rows {
        println!("  {:<22} – {}", cmd.bold().cyan(), what);
    }
    println!();
}
