use clap::Parser;
use log::{error, info, warn};
use sm83emu::config::{self, BootSetting, RunnerConfig};
use sm83emu::runner::Runner;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
struct Args {
    /// Path to the program image
    image: PathBuf,

    /// Path to a runner config file (defaults to the per-user location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address the image is loaded at
    #[arg(long, value_parser = config::parse_address)]
    load_address: Option<u16>,

    /// PC to start from after reset
    #[arg(long, value_parser = config::parse_address)]
    entry_point: Option<u16>,

    /// Start from the power-on state instead of the post-boot-ROM state
    #[arg(long)]
    power_on: bool,

    /// Machine-cycle budget
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Keep running when the CPU halts with interrupts disabled
    #[arg(long)]
    no_stop_on_halt: bool,

    /// Log every executed instruction
    #[arg(long)]
    trace: bool,

    /// Enable debug logging of CPU state changes
    #[arg(long)]
    debug: bool,

    /// Write the effective settings to the config file and continue
    #[arg(long)]
    save_config: bool,
}

fn apply_overrides(cfg: &mut RunnerConfig, args: &Args) {
    if let Some(addr) = args.load_address {
        cfg.load_address = addr;
    }
    if let Some(entry) = args.entry_point {
        cfg.entry_point = Some(entry);
    }
    if args.power_on {
        cfg.boot_mode = BootSetting::PowerOn;
    }
    if let Some(max) = args.max_cycles {
        cfg.max_cycles = max;
    }
    if args.no_stop_on_halt {
        cfg.stop_on_halt = false;
    }
    if args.trace {
        cfg.trace = true;
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let (mut cfg, parse_error) = match config::try_load_from_file(&config_path) {
        Ok(cfg) => (cfg.unwrap_or_default(), None),
        Err(e) => (RunnerConfig::default(), Some(e)),
    };
    apply_overrides(&mut cfg, &args);

    // Logging starts once the merged config is known.
    let default_level = cfg.default_log_filter(args.debug);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    if let Some(e) = parse_error {
        warn!(
            "Failed to parse runner config {}: {e}; using defaults",
            config_path.display()
        );
    }

    if args.save_config {
        match config::save_to_file(&config_path, &cfg) {
            Ok(()) => info!("Saved runner config to {}", config_path.display()),
            Err(e) => error!("Failed to save runner config {}: {e}", config_path.display()),
        }
    }

    let mut runner = match Runner::new(cfg) {
        Ok(r) => r,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = runner.load_file(&args.image) {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    let outcome = runner.run();

    let serial = runner.serial_output();
    if !serial.is_empty() {
        println!("{}", String::from_utf8_lossy(serial));
    }
    println!("{outcome}");
    println!("{}", runner.cpu.debug_state());

    if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
