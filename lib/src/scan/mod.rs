use std::{
    backtrace::Backtrace,
    panic::{self, AssertUnwindSafe},
    thread,
};

use crossbeam_channel::Sender;
use snafu::Snafu;

use crate::{
    analysis::{function_start::collect_function_starts, signature::match_signature},
    config::signatures::{Signature, SignatureList},
    rom::rom::Rom,
};

/// How candidate offsets are chosen for each signature.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScanMode {
    /// Try every 4-byte-aligned offset the signature fits at.
    Thorough,
    /// Only try the heuristically collected function starts.
    Fast,
}

#[derive(Clone, Copy, Debug)]
pub struct ScanOptions {
    pub mode: ScanMode,
    /// Worker thread count, one per CPU core when unset.
    pub workers: Option<usize>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self { mode: ScanMode::Thorough, workers: None }
    }
}

/// One identified function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub name: String,
    pub kind: ResultKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Offset into the scanned image, for functions located by fingerprint.
    Offset(u32),
    /// Absolute address recovered from relocation metadata.
    Address(u32),
}

impl ScanResult {
    pub fn resolved_address(&self, entry_point: i32) -> u32 {
        match self.kind {
            ResultKind::Offset(offset) => (entry_point as u32).wrapping_add(offset),
            ResultKind::Address(address) => address,
        }
    }
}

enum ScanMessage {
    Match { name: String, offset: u32 },
    RelocMatch { name: String, address: u32 },
    Progress,
    Done,
    Failed,
}

#[derive(Debug, Snafu)]
pub enum ScanError {
    #[snafu(display("a scan worker failed, results are incomplete:\n{backtrace}"))]
    Worker { backtrace: Backtrace },
}

/// Scans the ROM for every signature in the list.
///
/// The signature list is split into one contiguous shard per worker thread; each worker reports matches,
/// per-signature progress and completion over a channel, and the receiving side owns all mutable state.
/// `progress` is invoked with `(completed, total)` after each fully processed signature. Results are
/// deduplicated by resolved address (first one wins) and ordered ascending by resolved address.
pub fn scan(
    rom: &Rom,
    signatures: &SignatureList,
    options: &ScanOptions,
    mut progress: impl FnMut(usize, usize),
) -> Result<Vec<ScanResult>, ScanError> {
    let code = rom.data();
    let entry_point = rom.entry_point();
    let offsets = collect_function_starts(code);

    let workers = options.workers.unwrap_or_else(num_cpus::get).max(1);
    let per_worker = signatures.len() / workers;
    let remainder = signatures.len() % workers;
    let total = signatures.len();
    let mode = options.mode;

    let (sender, receiver) = crossbeam_channel::unbounded();

    thread::scope(|scope| {
        let mut start = 0;
        for index in 0..workers {
            let count = per_worker + if index == 0 { remainder } else { 0 };
            let shard = &signatures.as_slice()[start..start + count];
            start += count;

            let sender = sender.clone();
            let offsets = &offsets;
            scope.spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| scan_shard(code, shard, offsets, mode, &sender)));
                let _ = sender.send(match outcome {
                    Ok(()) => ScanMessage::Done,
                    Err(_) => ScanMessage::Failed,
                });
            });
        }
        drop(sender);

        let mut results = vec![];
        let mut active = workers;
        let mut completed = 0;
        let mut failed = false;

        while active > 0 {
            let Ok(message) = receiver.recv() else {
                // All senders dropped without reporting completion.
                failed = true;
                break;
            };
            match message {
                ScanMessage::Match { name, offset } => {
                    add_result(&mut results, ScanResult { name, kind: ResultKind::Offset(offset) }, entry_point);
                }
                ScanMessage::RelocMatch { name, address } => {
                    add_result(&mut results, ScanResult { name, kind: ResultKind::Address(address) }, entry_point);
                }
                ScanMessage::Progress => {
                    completed += 1;
                    progress(completed, total);
                }
                ScanMessage::Done => active -= 1,
                ScanMessage::Failed => {
                    failed = true;
                    active -= 1;
                }
            }
        }

        if failed {
            WorkerSnafu.fail()
        } else {
            Ok(results)
        }
    })
}

fn scan_shard(code: &[u8], shard: &[Signature], offsets: &[u32], mode: ScanMode, sender: &Sender<ScanMessage>) {
    for signature in shard {
        match mode {
            ScanMode::Thorough => {
                let size = signature.size as usize;
                let mut offset = 0;
                while offset + size <= code.len() {
                    if report_match(code, offset, signature, sender) {
                        break;
                    }
                    offset += 4;
                }
            }
            ScanMode::Fast => {
                for &offset in offsets {
                    if report_match(code, offset as usize, signature, sender) {
                        break;
                    }
                }
            }
        }
        let _ = sender.send(ScanMessage::Progress);
    }
}

fn report_match(code: &[u8], offset: usize, signature: &Signature, sender: &Sender<ScanMessage>) -> bool {
    let Some(recovered) = match_signature(code, offset, signature) else {
        return false;
    };
    for symbol in recovered {
        let _ = sender.send(ScanMessage::RelocMatch { name: symbol.name, address: symbol.address });
    }
    let _ = sender.send(ScanMessage::Match { name: signature.name.clone(), offset: offset as u32 });
    true
}

fn add_result(results: &mut Vec<ScanResult>, result: ScanResult, entry_point: i32) {
    let address = result.resolved_address(entry_point);
    if results.iter().any(|existing| existing.resolved_address(entry_point) == address) {
        return;
    }
    results.push(result);
    results.sort_by_key(|result| result.resolved_address(entry_point));
}
