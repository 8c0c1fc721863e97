use std::{
    backtrace::Backtrace,
    fmt::Display,
    io::{self, BufRead, BufReader, BufWriter, Write},
    num::ParseIntError,
    path::Path,
    str::SplitWhitespace,
};

use snafu::{ensure, Snafu};

use crate::util::{
    io::{create_file, open_file, FileError},
    parse::parse_u32,
};

use super::{
    iter_attributes,
    relocation::{Relocation, RelocationParseError},
    ParseContext,
};

/// An ordered list of function fingerprints, shared read-only with every scan worker.
pub struct SignatureList {
    signatures: Vec<Signature>,
}

#[derive(Debug, Snafu)]
pub enum SignaturesParseError {
    #[snafu(transparent)]
    File { source: FileError },
    #[snafu(transparent)]
    Io { source: io::Error },
    #[snafu(transparent)]
    SignatureParse { source: SignatureParseError },
    #[snafu(transparent)]
    RelocationParse { source: RelocationParseError },
    #[snafu(display("{context}: relocation before any signature:\n{backtrace}"))]
    RelocationBeforeSignature { context: ParseContext, backtrace: Backtrace },
    #[snafu(display("{context}: relocation offset {offset:#x} is not word-aligned:\n{backtrace}"))]
    MisalignedOffset { context: ParseContext, offset: u32, backtrace: Backtrace },
    #[snafu(display("{context}: relocation offset {offset:#x} is out of bounds for function size {size:#x}:\n{backtrace}"))]
    OffsetOutOfBounds { context: ParseContext, offset: u32, size: u32, backtrace: Backtrace },
}

#[derive(Debug, Snafu)]
pub enum SignaturesWriteError {
    #[snafu(transparent)]
    File { source: FileError },
    #[snafu(transparent)]
    Io { source: io::Error },
}

impl SignatureList {
    pub fn new() -> Self {
        Self { signatures: vec![] }
    }

    pub fn from_signatures(signatures: Vec<Signature>) -> Self {
        Self { signatures }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SignaturesParseError> {
        let path = path.as_ref();
        let mut context = ParseContext { file_path: path.to_string_lossy().to_string(), row: 0 };

        let file = open_file(path)?;
        let reader = BufReader::new(file);

        let mut signatures: Vec<Signature> = vec![];
        for line in reader.lines() {
            context.row += 1;

            let line = line?;
            let comment_start = line.find("//").unwrap_or(line.len());
            let line = &line[..comment_start];

            let mut words = line.split_whitespace();
            let Some(first) = words.next() else { continue };

            if first == "reloc" {
                let Some(signature) = signatures.last_mut() else {
                    return RelocationBeforeSignatureSnafu { context }.fail();
                };
                let reloc = Relocation::parse(words, &context)?;
                for &offset in &reloc.offsets {
                    ensure!(offset % 4 == 0, MisalignedOffsetSnafu { context: &context, offset });
                    ensure!(
                        offset < signature.size && signature.size - offset >= 4,
                        OffsetOutOfBoundsSnafu { context: &context, offset, size: signature.size }
                    );
                }
                signature.relocs.push(reloc);
            } else {
                signatures.push(Signature::parse(first, words, &context)?);
            }
        }

        Ok(Self { signatures })
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SignaturesWriteError> {
        let file = create_file(path)?;
        let mut writer = BufWriter::new(file);

        for signature in &self.signatures {
            write!(writer, "{signature}")?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.iter()
    }

    pub fn as_slice(&self) -> &[Signature] {
        &self.signatures
    }
}

/// Content fingerprint of one known function: checksums of its first eight bytes and of its full body,
/// both computed with relocated words stripped, plus the relocations themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    /// Byte length of the function body.
    pub size: u32,
    /// Checksum of the first `min(size, 8)` bytes.
    pub crc_a: u32,
    /// Checksum of all `size` bytes.
    pub crc_b: u32,
    pub relocs: Vec<Relocation>,
}

#[derive(Debug, Snafu)]
pub enum SignatureParseError {
    #[snafu(display("{context}: failed to parse \"size\" '{value}': {error}\n{backtrace}"))]
    ParseSize { context: ParseContext, value: String, error: ParseIntError, backtrace: Backtrace },
    #[snafu(display("{context}: failed to parse \"{attribute}\" checksum '{value}': {error}\n{backtrace}"))]
    ParseChecksum { context: ParseContext, attribute: String, value: String, error: ParseIntError, backtrace: Backtrace },
    #[snafu(display("{context}: expected signature attribute 'size', 'crc_a' or 'crc_b' but got '{key}':\n{backtrace}"))]
    UnknownAttribute { context: ParseContext, key: String, backtrace: Backtrace },
    #[snafu(display("{context}: missing '{attribute}' attribute:\n{backtrace}"))]
    MissingAttribute { context: ParseContext, attribute: String, backtrace: Backtrace },
}

impl Signature {
    fn parse(name: &str, words: SplitWhitespace<'_>, context: &ParseContext) -> Result<Self, SignatureParseError> {
        let mut size = None;
        let mut crc_a = None;
        let mut crc_b = None;
        for (key, value) in iter_attributes(words) {
            match key {
                "size" => size = Some(parse_u32(value).map_err(|error| ParseSizeSnafu { context, value, error }.build())?),
                "crc_a" => {
                    crc_a = Some(
                        parse_u32(value)
                            .map_err(|error| ParseChecksumSnafu { context, attribute: "crc_a", value, error }.build())?,
                    )
                }
                "crc_b" => {
                    crc_b = Some(
                        parse_u32(value)
                            .map_err(|error| ParseChecksumSnafu { context, attribute: "crc_b", value, error }.build())?,
                    )
                }
                _ => return UnknownAttributeSnafu { context, key }.fail(),
            }
        }

        Ok(Self {
            name: name.to_string(),
            size: size.ok_or_else(|| MissingAttributeSnafu { context, attribute: "size" }.build())?,
            crc_a: crc_a.ok_or_else(|| MissingAttributeSnafu { context, attribute: "crc_a" }.build())?,
            crc_b: crc_b.ok_or_else(|| MissingAttributeSnafu { context, attribute: "crc_b" }.build())?,
            relocs: vec![],
        })
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} size:{:#x} crc_a:{:#010x} crc_b:{:#010x}", self.name, self.size, self.crc_a, self.crc_b)?;
        for reloc in &self.relocs {
            writeln!(f, "    {reloc}")?;
        }
        Ok(())
    }
}
