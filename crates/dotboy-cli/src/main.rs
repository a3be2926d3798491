mod config;
mod screenshot;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use dotboy_core::{
    cartridge::Cartridge,
    gameboy::{GameBoy, IdleCpu},
};

use config::EmulationMode;

#[derive(Parser, Debug)]
#[command(name = "dotboy", about = "Headless Game Boy / Game Boy Color runner")]
struct Args {
    /// Path to ROM file
    rom: PathBuf,

    /// Number of frames to run (overrides the config file)
    #[arg(long)]
    frames: Option<usize>,

    /// Write the last frame to this PNG file
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Force DMG mode
    #[arg(long, conflicts_with = "cgb")]
    dmg: bool,

    /// Force CGB mode
    #[arg(long, conflicts_with = "dmg")]
    cgb: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/dotboy/cli.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print bytes sent over the serial port
    #[arg(long)]
    serial: bool,
}

impl Args {
    /// Command line flags win over the config file.
    fn emulation_mode(&self, configured: EmulationMode) -> EmulationMode {
        if self.dmg {
            EmulationMode::ForceDmg
        } else if self.cgb {
            EmulationMode::ForceCgb
        } else {
            configured
        }
    }
}

fn print_serial(bytes: &[u8]) {
    let mut text = String::with_capacity(bytes.len());
    for &b in bytes {
        if b.is_ascii_graphic() || b == b' ' || b == b'\n' {
            text.push(b as char);
        } else {
            text.push_str(&format!("\\x{b:02X}"));
        }
    }
    println!("[SERIAL] {text}");
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let cfg = config::load_from_file(&config_path);

    let cart = match Cartridge::from_file(&args.rom) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load ROM: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("Title: {}", cart.title);
    println!("Cartridge type: {:#04x} ({:?})", cart.cart_type(), cart.mbc);
    if cart.header_errors().is_empty() {
        println!("Header: OK");
    } else {
        for err in cart.header_errors() {
            println!("Header: {err}");
        }
    }

    let cgb_mode = args.emulation_mode(cfg.emulation_mode).resolve(cart.cgb);
    let mut gb = GameBoy::new_with_mode(IdleCpu::new(), cart, cgb_mode);
    println!(
        "Emulator initialized in {} mode",
        if cgb_mode { "CGB" } else { "DMG" }
    );

    let frame_limit = args.frames.unwrap_or(cfg.frames);
    let mut frame_count = 0usize;
    for _ in 0..frame_limit {
        if gb.run_frame() {
            frame_count += 1;
        }
    }
    log::info!("Rendered {frame_count} of {frame_limit} frames");

    if let Some(path) = &args.screenshot {
        match screenshot::write_png(path, gb.framebuffer()) {
            Ok(()) => println!("Saved screenshot to {}", path.display()),
            Err(e) => eprintln!("Failed to write screenshot {}: {e}", path.display()),
        }
    }

    if args.serial {
        let serial = gb.mmu.take_serial();
        if !serial.is_empty() {
            print_serial(&serial);
        }
    }

    if cfg.save_on_exit
        && let Err(e) = gb.save()
    {
        log::error!("Failed to save cartridge RAM: {e}");
    }

    ExitCode::SUCCESS
}
