use n64sym_core::{
    config::signatures::{Signature, SignatureList},
    rom::rom::{Rom, RomEndian, MAGIC_BIG_ENDIAN},
    scan::{scan, ResultKind, ScanMode, ScanOptions},
    util::crc::crc32,
};

const ENTRY_WORD: u32 = 0x80001000;
const FUNCTION_OFFSET: usize = 0x1000;

/// 64 KiB image with a valid header and one function at the start of the code segment, preceded by the
/// epilogue of the boot stub and some alignment padding.
fn sample_image() -> Vec<u8> {
    let mut data = vec![0u8; 0x10000];
    data[0..4].copy_from_slice(&MAGIC_BIG_ENDIAN.to_be_bytes());
    data[8..12].copy_from_slice(&ENTRY_WORD.to_be_bytes());

    // jr ra at 0xff0, then zero padding up to the function.
    data[0xff0..0xff4].copy_from_slice(&0x03e00008u32.to_be_bytes());

    // addiu sp, sp, -0x18; sw ra, 0x14(sp); jr ra
    let body = [0x27bdffe8u32, 0xafbf0014, 0x03e00008];
    for (index, word) in body.iter().enumerate() {
        let at = FUNCTION_OFFSET + index * 4;
        data[at..at + 4].copy_from_slice(&word.to_be_bytes());
    }

    data
}

fn function_signature(data: &[u8]) -> Signature {
    let body = &data[FUNCTION_OFFSET..FUNCTION_OFFSET + 12];
    Signature {
        name: "foo".to_string(),
        size: 12,
        crc_a: crc32(&body[..8]),
        crc_b: crc32(body),
        relocs: vec![],
    }
}

#[test]
fn test_scan_finds_function_in_rom() {
    let rom = Rom::new(sample_image());
    let info = rom.info().expect("image should be recognized as a ROM");
    assert_eq!(info.endian, RomEndian::Big);
    assert_eq!(info.entry_point as u32, ENTRY_WORD - 0x1000);

    let signatures = SignatureList::from_signatures(vec![function_signature(rom.data())]);

    for mode in [ScanMode::Thorough, ScanMode::Fast] {
        let mut ticks = 0;
        let options = ScanOptions { mode, workers: None };
        let results = scan(&rom, &signatures, &options, |_, _| ticks += 1).unwrap();

        assert_eq!(ticks, 1);
        assert_eq!(results.len(), 1, "one match expected in {mode:?} mode");
        assert_eq!(results[0].name, "foo");
        assert_eq!(results[0].kind, ResultKind::Offset(FUNCTION_OFFSET as u32));
        assert_eq!(results[0].resolved_address(rom.entry_point()), ENTRY_WORD);
    }
}

#[test]
fn test_scan_of_byte_swapped_image_matches_canonical() {
    let canonical = sample_image();
    let signatures = SignatureList::from_signatures(vec![function_signature(&canonical)]);

    let mut swapped = canonical.clone();
    for half in swapped.chunks_exact_mut(2) {
        half.swap(0, 1);
    }

    let rom = Rom::new(swapped);
    assert_eq!(rom.info().unwrap().endian, RomEndian::ByteSwapped);
    assert_eq!(rom.data(), &canonical[..]);

    let options = ScanOptions { mode: ScanMode::Fast, workers: None };
    let results = scan(&rom, &signatures, &options, |_, _| {}).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].resolved_address(rom.entry_point()), ENTRY_WORD);
}
