//! Headless front end: load a cartridge and a BIOS, then run frames until
//! stopped. Display, audio and input belong to a real host; this binary
//! exists to execute ROMs and to give the core a process-level contract:
//!
//! - exit 0 on a clean shutdown,
//! - exit 1 when core state cannot be set up (missing/short files),
//! - exit -1 when no cartridge path is given,
//! - exit 2 on a decode/execute fault.

use std::process::exit;

use emu::cartridge::Cartridge;
use emu::cpu::hardware::internal_memory::BIOS_SIZE;
use emu::gba::Gba;
use logger::{init_logger, log, LogKind};

const DEFAULT_BIOS_PATH: &str = "gba_bios.bin";

struct Options {
    rom_path: String,
    bios_path: String,
    frames: Option<u64>,
}

fn parse_options() -> Options {
    let mut args = std::env::args().skip(1);

    let mut rom_path = None;
    let mut bios_path = DEFAULT_BIOS_PATH.to_string();
    let mut frames = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bios" => match args.next() {
                Some(path) => bios_path = path,
                None => {
                    eprintln!("--bios needs a path");
                    exit(-1);
                }
            },
            "--frames" => match args.next().and_then(|n| n.parse().ok()) {
                Some(count) => frames = Some(count),
                None => {
                    eprintln!("--frames needs a number");
                    exit(-1);
                }
            },
            _ => rom_path = Some(arg),
        }
    }

    let Some(rom_path) = rom_path else {
        eprintln!("No .gba file provided");
        exit(-1);
    };

    Options {
        rom_path,
        bios_path,
        frames,
    }
}

fn load_bios(path: &str) -> Result<[u8; BIOS_SIZE], String> {
    let data = std::fs::read(path).map_err(|e| format!("file ({path}) failed to open: {e}"))?;
    data.try_into()
        .map_err(|_| format!("BIOS image ({path}) must be exactly 16 KiB"))
}

fn main() {
    init_logger(LogKind::Stdout);

    let options = parse_options();

    let rom = match std::fs::read(&options.rom_path) {
        Ok(rom) => rom,
        Err(e) => {
            eprintln!("ERROR: file ({}) failed to open: {e}", options.rom_path);
            exit(1);
        }
    };

    let bios = match load_bios(&options.bios_path) {
        Ok(bios) => bios,
        Err(e) => {
            eprintln!("ERROR: {e}");
            exit(1);
        }
    };

    let mut gba = Gba::new(Cartridge::new(rom), bios, true);
    log(format!("running {}", options.rom_path));

    let mut frame_count: u64 = 0;
    loop {
        if let Err(e) = gba.run_frame() {
            eprintln!("ERROR: {e}");
            exit(2);
        }

        // Audio has no sink here; keep the buffer from growing.
        gba.drain_audio();

        frame_count += 1;
        if options.frames.is_some_and(|limit| frame_count >= limit) {
            break;
        }
    }

    log(format!("finished after {frame_count} frames"));
    exit(0);
}
