use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use n64sym_core::{analysis::function_start::collect_function_starts, rom::rom::Rom};

/// Prints header information about a ROM image without scanning it.
#[derive(Args)]
pub struct Info {
    /// Path to the ROM image.
    rom_path: PathBuf,
}

impl Info {
    pub fn run(&self) -> Result<()> {
        let rom = Rom::from_file(&self.rom_path)?;

        match rom.info() {
            Some(info) => {
                println!("byte order: {}", info.endian);
                println!("entry point: {:#010x}", info.entry_point as u32);
                match info.boot_code {
                    Some(boot_code) => println!("boot code: {boot_code}"),
                    None => println!("boot code: unknown"),
                }
            }
            None => println!("byte order: not an N64 ROM"),
        }

        let candidates = collect_function_starts(rom.data());
        println!("function start candidates: {}", candidates.len());

        Ok(())
    }
}
