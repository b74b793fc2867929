//! APT Stage Probe
//!
//! A standalone tool to exercise one APT motor controller: print its hardware
//! info and status, and optionally home it or move it.
//!
//! Usage:
//!   cargo run --example stage_probe -- [OPTIONS] [PORT]
//!
//! Options:
//!   --serial SN       Locate the controller by USB serial number
//!   --stage MODEL     mts50, lts300, kdc101, prm1 (default: mts50)
//!   --home            Home the stage before anything else
//!   --goto MM         Move to an absolute position
//!   --move MM         Move by a relative distance
//!   --velocity MM_S   Set the maximum velocity first
//!   --timeout MS      Bound every reply wait
//!   --list            List attached controllers and exit

use aptstage_core::prelude::*;
use aptstage_core::protocol::list_controllers;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut config = ControllerConfig {
        stage: StageModel::Mts50,
        ..ControllerConfig::default()
    };
    let mut home = false;
    let mut goto: Option<f64> = None;
    let mut relative: Option<f64> = None;
    let mut velocity: Option<f64> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--serial" | "-s" => {
                i += 1;
                if i < args.len() {
                    config.serial_number = Some(args[i].clone());
                }
            }
            "--stage" => {
                i += 1;
                if i < args.len() {
                    config.stage = match args[i].as_str() {
                        "mts50" => StageModel::Mts50,
                        "lts300" => StageModel::Lts300,
                        "kdc101" => StageModel::Kdc101,
                        "prm1" => StageModel::Prm1,
                        other => {
                            eprintln!("Unknown stage: {}", other);
                            return;
                        }
                    };
                }
            }
            "--home" => {
                home = true;
            }
            "--goto" => {
                i += 1;
                goto = args.get(i).and_then(|a| a.parse().ok());
            }
            "--move" => {
                i += 1;
                relative = args.get(i).and_then(|a| a.parse().ok());
            }
            "--velocity" => {
                i += 1;
                velocity = args.get(i).and_then(|a| a.parse().ok());
            }
            "--timeout" | "-t" => {
                i += 1;
                config.request_timeout_ms = args.get(i).and_then(|a| a.parse().ok());
            }
            "--list" => {
                list();
                return;
            }
            "--help" | "-h" => {
                print_help();
                return;
            }
            arg if !arg.starts_with('-') => {
                config.port_name = arg.to_string();
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
            }
        }
        i += 1;
    }

    if config.port_name.is_empty() && config.serial_number.is_none() {
        match list_controllers().into_iter().next() {
            Some(port) => config.port_name = port.name,
            None => {
                eprintln!("No APT controllers found");
                std::process::exit(1);
            }
        }
    }

    let mut controller = match Controller::open(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to open controller: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&mut controller, home, goto, relative, velocity) {
        eprintln!("Error: {}", e);
        // stop the stage and release the port before exiting
        drop(controller);
        std::process::exit(1);
    }
}

fn run(
    controller: &mut Controller,
    home: bool,
    goto: Option<f64>,
    relative: Option<f64>,
    velocity: Option<f64>,
) -> AptResult<()> {
    let unit = if controller.config().stage.is_rotary() {
        "deg"
    } else {
        "mm"
    };

    let info = controller.info()?;
    println!("Controller:");
    println!("  Serial number:     {}", info.serial_number);
    println!("  Model:             {}", info.model);
    println!("  Hardware type:     {}", info.hardware_type);
    println!("  Firmware version:  {}", info.firmware_version);
    println!("  Notes:             {}", info.notes);
    println!("  Hardware version:  {}", info.hardware_version);
    println!("  Mod state:         {}", info.modification_state);
    println!("  Channels:          {}", info.channels);

    if velocity.is_some() {
        controller.set_velocity_parameters(None, velocity, DEFAULT_CHANNEL)?;
    }
    let vel = controller.velocity_parameters(DEFAULT_CHANNEL)?;
    println!(
        "  Velocity params:   min={:.3}{u}/s acc={:.3}{u}/s² max={:.3}{u}/s",
        vel.min_velocity,
        vel.acceleration,
        vel.max_velocity,
        u = unit
    );

    if home {
        println!("Homing...");
        if let Some(status) = controller.home(true, None, 0.0)? {
            println!("  {}", status);
        }
    }

    if let Some(target) = goto {
        println!("Moving to {:.3}{}...", target, unit);
        if let Some(status) = controller.goto(target, DEFAULT_CHANNEL, true)? {
            println!("  {}", status);
        }
    }

    if let Some(distance) = relative {
        println!("Moving by {:.3}{}...", distance, unit);
        if let Some(status) = controller.move_by(distance, DEFAULT_CHANNEL, true)? {
            println!("  {}", status);
        }
    }

    let status = controller.status(DEFAULT_CHANNEL)?;
    println!("Status:");
    println!(
        "  Position:  {:.3}{} ({} cnt)",
        status.position(),
        unit,
        status.position_raw
    );
    println!("  Velocity:  {:.3}{}/s", status.velocity(), unit);
    println!("  Flags:     {} {:?}", status.short_status(), status.flag_strings());

    controller.close()
}

fn list() {
    let ports = list_controllers();
    if ports.is_empty() {
        println!("No APT controllers found");
    }
    for port in ports {
        println!(
            "{}  S/N: {}  {}",
            port.name,
            port.serial_number.as_deref().unwrap_or("?"),
            port.product.as_deref().unwrap_or("")
        );
    }
}

fn print_help() {
    println!("APT Stage Probe");
    println!();
    println!("Usage: stage_probe [OPTIONS] [PORT]");
    println!();
    println!("Options:");
    println!("  --serial, -s SN     Locate the controller by USB serial number");
    println!("  --stage MODEL       mts50, lts300, kdc101, prm1 (default: mts50)");
    println!("  --home              Home the stage first");
    println!("  --goto MM           Move to an absolute position");
    println!("  --move MM           Move by a relative distance");
    println!("  --velocity MM_S     Set the maximum velocity first");
    println!("  --timeout, -t MS    Bound every reply wait");
    println!("  --list              List attached controllers");
    println!("  --help, -h          Show this help");
}
