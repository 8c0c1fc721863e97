use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use n64sym_core::{
    config::signatures::SignatureList,
    rom::rom::Rom,
    scan::{scan, ScanMode, ScanOptions},
};

use crate::util::progress::ProgressBar;

/// Scans a ROM image for functions matching a signature library.
#[derive(Args)]
pub struct Scan {
    /// Path to the ROM image.
    rom_path: PathBuf,

    /// Path to the signature library.
    #[arg(long, short = 's')]
    signatures: PathBuf,

    /// Only test offsets that look like function starts. Much faster, but misses functions the heuristic
    /// does not find.
    #[arg(long, short = 'f', default_value_t = false)]
    fast: bool,

    /// Number of scan threads, defaults to one per CPU core.
    #[arg(long, short = 'j')]
    jobs: Option<usize>,

    /// Disables the progress display.
    #[arg(long, short = 'q', default_value_t = false)]
    quiet: bool,
}

impl Scan {
    pub fn run(&self) -> Result<()> {
        let rom = Rom::from_file(&self.rom_path)?;
        if let Some(info) = rom.info() {
            match info.boot_code {
                Some(boot_code) => log::info!(
                    "Detected {} ROM with boot code {}, entry point {:#010x}",
                    info.endian,
                    boot_code,
                    info.entry_point as u32
                ),
                None => log::info!("Detected {} ROM, entry point {:#010x}", info.endian, info.entry_point as u32),
            }
        }

        let signatures = SignatureList::from_file(&self.signatures)?;
        log::info!("Loaded {} signatures", signatures.len());

        let options =
            ScanOptions { mode: if self.fast { ScanMode::Fast } else { ScanMode::Thorough }, workers: self.jobs };

        let bar = (!self.quiet).then(ProgressBar::new);
        let results = scan(&rom, &signatures, &options, |completed, total| {
            if let Some(bar) = &bar {
                bar.update(completed, total);
            }
        })?;
        if let Some(bar) = &bar {
            bar.finish();
        }

        let entry_point = rom.entry_point();
        for result in &results {
            println!("- [{:#x}, \"{}\"]", result.resolved_address(entry_point), result.name);
        }
        log::info!("Identified {} functions", results.len());

        Ok(())
    }
}
