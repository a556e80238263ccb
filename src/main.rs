use clap::{Parser, Subcommand};
use pocket_engine::chip8::Processor;
use pocket_engine::gameboy::Engine;
use pocket_engine::options::Options;
use std::fs;
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pocket-engine", version, about = "A CHIP-8 interpreter and Game Boy core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a CHIP-8 ROM for a fixed number of cycles, headless.
    Chip8 {
        rom: PathBuf,
        #[arg(long, default_value_t = Options::default().processor_speed_hertz)]
        speed_hertz: u64,
        #[arg(long, default_value_t = 60)]
        cycles: u64,
    },
    /// Run a Game Boy ROM for a fixed number of frames, headless.
    Gameboy {
        rom: PathBuf,
        #[arg(long)]
        boot: Option<PathBuf>,
        #[arg(long, default_value_t = 60)]
        frames: u32,
        #[arg(long)]
        debug_log: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Chip8 {
            rom,
            speed_hertz,
            cycles,
        } => run_chip8(&rom, speed_hertz, cycles),
        Command::Gameboy {
            rom,
            boot,
            frames,
            debug_log,
        } => run_gameboy(&rom, boot.as_deref(), frames, debug_log.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{}", message);
            ExitCode::FAILURE
        }
    }
}

fn run_chip8(rom_path: &std::path::Path, speed_hertz: u64, cycles: u64) -> Result<(), String> {
    let rom = fs::read(rom_path).map_err(|e| format!("failed to read {}: {}", rom_path.display(), e))?;
    let options = Options {
        processor_speed_hertz: speed_hertz,
        ..Options::default()
    };
    let mut processor =
        Processor::initialise_and_load(&rom, &options).map_err(|e| e.to_string())?;
    info!(cycles, "running chip8 rom");
    for _ in 0..cycles {
        processor.step().map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn run_gameboy(
    rom_path: &std::path::Path,
    boot_path: Option<&std::path::Path>,
    frames: u32,
    debug_log_path: Option<&std::path::Path>,
) -> Result<(), String> {
    let rom = fs::read(rom_path).map_err(|e| format!("failed to read {}: {}", rom_path.display(), e))?;
    let mut options = Options::default();
    options.debug_mode = debug_log_path.is_some();
    let mut engine = Engine::initialize_cartridge(&rom, &options);

    if let Some(boot_path) = boot_path {
        let boot_rom = fs::read(boot_path)
            .map_err(|e| format!("failed to read {}: {}", boot_path.display(), e))?;
        engine.initialize_boot_rom(&boot_rom);
    }
    if let Some(log_path) = debug_log_path {
        let file = File::create(log_path)
            .map_err(|e| format!("failed to create {}: {}", log_path.display(), e))?;
        engine.set_debug_log(Box::new(file));
    }

    info!(frames, "running gameboy rom");
    for _ in 0..frames {
        engine.fetch_next_frame().map_err(|e| e.to_string())?;
    }
    Ok(())
}
