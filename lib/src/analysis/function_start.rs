use std::collections::BTreeSet;

use crate::util::bytes::FromSlice;

/// `jr ra`, the usual function epilogue.
pub const INS_RETURN: u32 = 0x03e00008;
/// Top halfword of `addiu sp, sp, imm`.
const OPCODE_ADDIU_SP: u32 = 0x27bd;

pub fn is_return(word: u32) -> bool {
    word == INS_RETURN
}

/// `addiu sp, sp, -n`: a stack frame allocation, the usual function prologue.
pub fn is_stack_frame_allocation(word: u32) -> bool {
    word >> 16 == OPCODE_ADDIU_SP && (word as u16 as i16) < 0
}

/// Collects offsets likely to start a function: every stack frame allocation, and the first non-zero word
/// past a return and its delay slot (skipping alignment padding). Purely a heuristic to prune fast-mode
/// scans; it is neither sound nor complete.
pub fn collect_function_starts(code: &[u8]) -> Vec<u32> {
    let mut offsets = BTreeSet::new();

    for (index, bytes) in code.chunks_exact(4).enumerate() {
        let offset = index * 4;
        let word = u32::from_be_slice(bytes);

        if is_return(word) {
            let mut next = offset + 8;
            while next + 4 <= code.len() {
                if u32::from_be_slice(&code[next..]) != 0 {
                    offsets.insert(next as u32);
                    break;
                }
                next += 4;
            }
        }

        if is_stack_frame_allocation(word) {
            offsets.insert(offset as u32);
        }
    }

    offsets.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|word| word.to_be_bytes()).collect()
    }

    #[test]
    fn test_frame_allocation_is_a_start() {
        // addiu sp, sp, -0x18 ... addiu sp, sp, 0x18
        let code = words(&[0x27bdffe8, 0x00000000, 0x27bd0018]);
        assert_eq!(collect_function_starts(&code), vec![0]);
    }

    #[test]
    fn test_return_skips_padding() {
        // jr ra; nop (delay slot); two words of padding; first real word
        let code = words(&[0x03e00008, 0x00000000, 0x00000000, 0x00000000, 0x3c088010]);
        assert_eq!(collect_function_starts(&code), vec![0x10]);
    }

    #[test]
    fn test_return_at_end_of_buffer() {
        // Nothing but padding after the return, so nothing to record.
        let code = words(&[0x03e00008, 0x00000000, 0x00000000]);
        assert_eq!(collect_function_starts(&code), vec![]);
    }

    #[test]
    fn test_duplicates_are_merged() {
        // The word after the return is itself a frame allocation; both rules hit offset 0x10.
        let code = words(&[0x03e00008, 0x00000000, 0x00000000, 0x00000000, 0x27bdffe0, 0x03e00008]);
        assert_eq!(collect_function_starts(&code), vec![0x10]);
    }
}
