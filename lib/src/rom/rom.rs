use std::{fmt::Display, path::Path};

use crate::util::{
    bytes::FromSlice,
    crc::crc32,
    io::{read_file, FileError},
};

/// Magic word at offset 0 of a big-endian ("z64") image.
pub const MAGIC_BIG_ENDIAN: u32 = 0x80371240;
/// The same word as stored by a 32-bit byte-swapped ("n64") image.
pub const MAGIC_LITTLE_ENDIAN: u32 = 0x40123780;
/// The same word as stored by a halfword-swapped ("v64") image.
pub const MAGIC_BYTE_SWAPPED: u32 = 0x37804012;

const HEADER_ENTRY_POINT: usize = 0x08;
const CODE_LOAD_OFFSET: u32 = 0x1000;
const BOOT_CODE_START: usize = 0x40;
const BOOT_CODE_SIZE: usize = 0xfc0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RomEndian {
    Big,
    Little,
    ByteSwapped,
}

impl Display for RomEndian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Big => write!(f, "big-endian"),
            Self::Little => write!(f, "little-endian"),
            Self::ByteSwapped => write!(f, "byte-swapped"),
        }
    }
}

/// Boot code revision, identified by checksumming the IPL3 region of the header.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BootCode {
    Cic6101,
    Cic6102,
    Cic6103,
    Cic6105,
    Cic6106,
}

impl BootCode {
    pub fn from_checksum(checksum: u32) -> Option<Self> {
        match checksum {
            0x6170a4a1 => Some(Self::Cic6101),
            0x90bb6cb5 => Some(Self::Cic6102),
            0x0b050ee0 => Some(Self::Cic6103),
            0x98bc2c86 => Some(Self::Cic6105),
            0xacc8580a => Some(Self::Cic6106),
            _ => None,
        }
    }

    /// Correction for revisions whose loader places the program away from the address in the header.
    pub fn entry_point_correction(self) -> i32 {
        match self {
            Self::Cic6103 => -0x100000,
            Self::Cic6106 => -0x200000,
            _ => 0,
        }
    }
}

impl Display for BootCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cic6101 => write!(f, "6101"),
            Self::Cic6102 => write!(f, "6102"),
            Self::Cic6103 => write!(f, "6103"),
            Self::Cic6105 => write!(f, "6105"),
            Self::Cic6106 => write!(f, "6106"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RomInfo {
    /// Byte order the image was stored in, before normalization.
    pub endian: RomEndian,
    /// Address of the first instruction past the header, i.e. of offset 0x1000.
    pub entry_point: i32,
    pub boot_code: Option<BootCode>,
}

/// A ROM image, held in canonical big-endian byte order.
pub struct Rom {
    data: Vec<u8>,
    info: Option<RomInfo>,
}

impl Rom {
    /// Takes ownership of a raw image, detects its byte order and reorders it to canonical big-endian in
    /// place before anything else reads it. Images without a recognized magic word are left untouched and
    /// carry no [`RomInfo`]; they can still be scanned as headerless code.
    pub fn new(mut data: Vec<u8>) -> Self {
        let Some(endian) = detect_endian(&data) else {
            log::warn!("Image is not recognized as an N64 ROM, treating it as raw code");
            return Self { data, info: None };
        };
        normalize(&mut data, endian);

        let header_entry = u32::from_be_slice(&data[HEADER_ENTRY_POINT..]);
        let mut entry_point = header_entry.wrapping_sub(CODE_LOAD_OFFSET) as i32;

        let boot_checksum = crc32(&data[BOOT_CODE_START..BOOT_CODE_START + BOOT_CODE_SIZE]);
        let boot_code = BootCode::from_checksum(boot_checksum);
        match boot_code {
            Some(boot_code) => entry_point = entry_point.wrapping_add(boot_code.entry_point_correction()),
            None => log::warn!("Unknown boot code checksum {boot_checksum:#010x}, entry point left uncorrected"),
        }

        Self { data, info: Some(RomInfo { endian, entry_point, boot_code }) }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FileError> {
        Ok(Self::new(read_file(path)?))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn info(&self) -> Option<&RomInfo> {
        self.info.as_ref()
    }

    /// Address the first scanned byte corresponds to, zero for unrecognized images.
    pub fn entry_point(&self) -> i32 {
        self.info.map(|info| info.entry_point).unwrap_or(0)
    }
}

fn detect_endian(data: &[u8]) -> Option<RomEndian> {
    // The header and boot code must be present for this to be a ROM at all.
    if data.len() < BOOT_CODE_START + BOOT_CODE_SIZE {
        return None;
    }
    match u32::from_be_slice(data) {
        MAGIC_BIG_ENDIAN => Some(RomEndian::Big),
        MAGIC_LITTLE_ENDIAN => Some(RomEndian::Little),
        MAGIC_BYTE_SWAPPED => Some(RomEndian::ByteSwapped),
        _ => None,
    }
}

fn normalize(data: &mut [u8], endian: RomEndian) {
    match endian {
        RomEndian::Big => {}
        RomEndian::Little => {
            for word in data.chunks_exact_mut(4) {
                word.reverse();
            }
        }
        RomEndian::ByteSwapped => {
            for half in data.chunks_exact_mut(2) {
                half.swap(0, 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical_image() -> Vec<u8> {
        let mut data = vec![0u8; 0x1000];
        data[0..4].copy_from_slice(&MAGIC_BIG_ENDIAN.to_be_bytes());
        data[8..12].copy_from_slice(&0x80100400u32.to_be_bytes());
        data[0x40..0x44].copy_from_slice(&0x3c093456u32.to_be_bytes());
        data
    }

    #[test]
    fn test_big_endian_is_untouched() {
        let data = canonical_image();
        let rom = Rom::new(data.clone());
        assert_eq!(rom.data(), &data[..]);
        assert_eq!(rom.info().unwrap().endian, RomEndian::Big);
    }

    #[test]
    fn test_little_endian_is_normalized() {
        let canonical = canonical_image();
        let mut data = canonical.clone();
        for word in data.chunks_exact_mut(4) {
            word.reverse();
        }
        let rom = Rom::new(data);
        assert_eq!(rom.data(), &canonical[..]);
        assert_eq!(rom.info().unwrap().endian, RomEndian::Little);
    }

    #[test]
    fn test_byte_swapped_is_normalized() {
        let canonical = canonical_image();
        let mut data = canonical.clone();
        for half in data.chunks_exact_mut(2) {
            half.swap(0, 1);
        }
        let rom = Rom::new(data);
        assert_eq!(rom.data(), &canonical[..]);
        assert_eq!(rom.info().unwrap().endian, RomEndian::ByteSwapped);
    }

    #[test]
    fn test_entry_point() {
        let rom = Rom::new(canonical_image());
        // Boot checksum is not a known revision, so no correction applies.
        let info = rom.info().unwrap();
        assert_eq!(info.boot_code, None);
        assert_eq!(info.entry_point, 0x800ff400u32 as i32);
    }

    #[test]
    fn test_unrecognized_magic() {
        let mut data = canonical_image();
        data[0] = 0x7f;
        let original = data.clone();
        let rom = Rom::new(data);
        assert!(rom.info().is_none());
        assert_eq!(rom.entry_point(), 0);
        assert_eq!(rom.data(), &original[..]);
    }

    #[test]
    fn test_short_image_is_not_a_rom() {
        let mut data = vec![0u8; 0x100];
        data[0..4].copy_from_slice(&MAGIC_BIG_ENDIAN.to_be_bytes());
        assert!(Rom::new(data).info().is_none());
    }

    #[test]
    fn test_boot_code_corrections() {
        assert_eq!(BootCode::from_checksum(0x6170a4a1), Some(BootCode::Cic6101));
        assert_eq!(BootCode::from_checksum(0x90bb6cb5), Some(BootCode::Cic6102));
        assert_eq!(BootCode::from_checksum(0x0b050ee0), Some(BootCode::Cic6103));
        assert_eq!(BootCode::from_checksum(0x98bc2c86), Some(BootCode::Cic6105));
        assert_eq!(BootCode::from_checksum(0xacc8580a), Some(BootCode::Cic6106));
        assert_eq!(BootCode::from_checksum(0xdeadbeef), None);

        assert_eq!(BootCode::Cic6102.entry_point_correction(), 0);
        assert_eq!(BootCode::Cic6103.entry_point_correction(), -0x100000);
        assert_eq!(BootCode::Cic6106.entry_point_correction(), -0x200000);
    }
}
