use std::{collections::BTreeSet, path::PathBuf};

use anyhow::Result;
use clap::Args;
use n64sym_core::config::signatures::SignatureList;

/// Validates a signature library file.
#[derive(Args)]
pub struct Check {
    /// Path to the signature library.
    signatures: PathBuf,
}

impl Check {
    pub fn run(&self) -> Result<()> {
        let signatures = SignatureList::from_file(&self.signatures)?;

        let mut names = BTreeSet::new();
        for signature in signatures.iter() {
            if !names.insert(signature.name.as_str()) {
                log::warn!("Duplicate signature for '{}'", signature.name);
            }
        }

        let relocs: usize = signatures.iter().map(|signature| signature.relocs.len()).sum();
        log::info!("{}: {} signatures, {} relocation records", self.signatures.display(), signatures.len(), relocs);

        Ok(())
    }
}
