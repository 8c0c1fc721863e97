use crate::{
    config::{relocation::RelocationKind, signatures::Signature},
    util::{bytes::FromSlice, crc::Crc32},
};

/// An absolute address recovered from a matched signature's relocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredSymbol {
    pub name: String,
    pub address: u32,
}

/// One relocated word, flattened out of the per-symbol offset lists.
struct FlatReloc<'a> {
    offset: u32,
    kind: RelocationKind,
    name: &'a str,
}

/// Tests one signature against one candidate offset.
///
/// The signature's checksums were computed with the variable bits of relocated words zeroed out, so the
/// candidate's words are stripped the same way before checksumming. Returns `None` if the candidate does
/// not fingerprint identically, otherwise the addresses recovered from the signature's relocations (empty
/// for relocation-less signatures).
pub fn match_signature(code: &[u8], offset: usize, signature: &Signature) -> Option<Vec<RecoveredSymbol>> {
    let size = signature.size as usize;
    if offset + size > code.len() {
        return None;
    }

    if signature.relocs.is_empty() {
        let mut crc = Crc32::new();
        crc.update(&code[offset..offset + size]);
        return (crc.value() == signature.crc_b).then(Vec::new);
    }

    let relocs = flatten_relocs(signature);

    let mut crc_a = Crc32::new();
    let mut crc_b = Crc32::new();
    let limit_a = size.min(8);
    let mut pos = 0;
    let mut cursor = 0;

    // Checksum the prefix, splicing in stripped words at relocated offsets. Both checksums accumulate the
    // same byte stream here; only the comparison points differ.
    while pos < limit_a && cursor < relocs.len() {
        let reloc = &relocs[cursor];
        let reloc_offset = reloc.offset as usize;
        if pos < reloc_offset {
            let length = reloc_offset.min(limit_a) - pos;
            let span = &code[offset + pos..offset + pos + length];
            crc_a.update(span);
            crc_b.update(span);
            pos += length;
        } else if pos == reloc_offset {
            let word = stripped_word(code, offset + pos, reloc.kind);
            crc_a.update(&word);
            crc_b.update(&word);
            pos += 4;
            cursor += 1;
        } else {
            // Relocations overlapping an already consumed word contribute nothing.
            cursor += 1;
        }
    }
    if pos < limit_a {
        let span = &code[offset + pos..offset + limit_a];
        crc_a.update(span);
        crc_b.update(span);
        pos = limit_a;
    }

    if crc_a.value() != signature.crc_a {
        return None;
    }

    // Prefix matched, continue the running checksum over the rest of the function.
    while pos < size && cursor < relocs.len() {
        let reloc = &relocs[cursor];
        let reloc_offset = reloc.offset as usize;
        if pos < reloc_offset {
            crc_b.update(&code[offset + pos..offset + reloc_offset]);
            pos = reloc_offset;
        } else if pos == reloc_offset {
            let word = stripped_word(code, offset + pos, reloc.kind);
            crc_b.update(&word);
            pos += 4;
            cursor += 1;
        } else {
            cursor += 1;
        }
    }
    if pos < size {
        crc_b.update(&code[offset + pos..offset + size]);
    }

    (crc_b.value() == signature.crc_b).then(|| recover_addresses(code, offset, &relocs))
}

fn flatten_relocs(signature: &Signature) -> Vec<FlatReloc<'_>> {
    let mut relocs = signature
        .relocs
        .iter()
        .flat_map(|reloc| {
            reloc.offsets.iter().map(move |&offset| FlatReloc { offset, kind: reloc.kind, name: &reloc.name })
        })
        .collect::<Vec<_>>();
    relocs.sort_by_key(|reloc| reloc.offset);
    relocs
}

fn stripped_word(code: &[u8], at: usize, kind: RelocationKind) -> [u8; 4] {
    match kind {
        // Keep the 6-bit opcode field, zero the 26-bit target.
        RelocationKind::Targ26 => [code[at] & 0xfc, 0x00, 0x00, 0x00],
        // Keep the opcode and register fields, zero the 16-bit immediate.
        RelocationKind::Hi16 | RelocationKind::Lo16 => [code[at], code[at + 1], 0x00, 0x00],
    }
}

fn recover_addresses(code: &[u8], offset: usize, relocs: &[FlatReloc]) -> Vec<RecoveredSymbol> {
    let mut symbols = vec![];
    for (index, reloc) in relocs.iter().enumerate() {
        match reloc.kind {
            RelocationKind::Targ26 => {
                let word = u32::from_be_slice(&code[offset + reloc.offset as usize..]);
                let address = 0x80000000 + (word & 0x3ffffff) * 4;
                symbols.push(RecoveredSymbol { name: reloc.name.to_string(), address });
            }
            RelocationKind::Lo16 => {
                // Only a lo16 directly following its hi16 forms a full address.
                let Some(hi_reloc) = index.checked_sub(1).map(|i| &relocs[i]) else { continue };
                if hi_reloc.kind != RelocationKind::Hi16 || hi_reloc.name != reloc.name {
                    continue;
                }
                let hi = u16::from_be_slice(&code[offset + hi_reloc.offset as usize + 2..]);
                let lo = i16::from_be_slice(&code[offset + reloc.offset as usize + 2..]);
                let address = ((hi as u32) << 16).wrapping_add(lo as i32 as u32);
                symbols.push(RecoveredSymbol { name: reloc.name.to_string(), address });
            }
            RelocationKind::Hi16 => {}
        }
    }
    symbols
}
