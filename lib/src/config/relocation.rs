use std::{backtrace::Backtrace, fmt::Display, num::ParseIntError, str::SplitWhitespace};

use snafu::Snafu;

use crate::util::parse::parse_u32;

use super::{iter_attributes, ParseContext};

/// Where and how link-time address patching altered words within a function, and the symbol it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub kind: RelocationKind,
    /// Name of the symbol this relocation points to.
    pub name: String,
    /// Offsets within the function code where this kind/name pair occurs.
    pub offsets: Vec<u32>,
}

#[derive(Debug, Snafu)]
pub enum RelocationParseError {
    #[snafu(transparent)]
    RelocationKindParse { source: RelocationKindParseError },
    #[snafu(display("{context}: failed to parse relocation offset '{value}': {error}\n{backtrace}"))]
    ParseOffset { context: ParseContext, value: String, error: ParseIntError, backtrace: Backtrace },
    #[snafu(display("{context}: expected relocation attribute 'kind', 'name' or 'offsets' but got '{key}':\n{backtrace}"))]
    UnknownAttribute { context: ParseContext, key: String, backtrace: Backtrace },
    #[snafu(display("{context}: missing '{attribute}' attribute:\n{backtrace}"))]
    MissingAttribute { context: ParseContext, attribute: String, backtrace: Backtrace },
}

impl Relocation {
    pub(crate) fn parse(words: SplitWhitespace<'_>, context: &ParseContext) -> Result<Self, RelocationParseError> {
        let mut kind = None;
        let mut name = None;
        let mut offsets = None;
        for (key, value) in iter_attributes(words) {
            match key {
                "kind" => kind = Some(RelocationKind::parse(value, context)?),
                "name" => name = Some(value.to_string()),
                "offsets" => {
                    offsets = Some(
                        value
                            .split(',')
                            .map(|offset| {
                                parse_u32(offset).map_err(|error| ParseOffsetSnafu { context, value: offset, error }.build())
                            })
                            .collect::<Result<Vec<_>, _>>()?,
                    )
                }
                _ => return UnknownAttributeSnafu { context, key }.fail(),
            }
        }

        Ok(Self {
            kind: kind.ok_or_else(|| MissingAttributeSnafu { context, attribute: "kind" }.build())?,
            name: name.ok_or_else(|| MissingAttributeSnafu { context, attribute: "name" }.build())?,
            offsets: offsets.ok_or_else(|| MissingAttributeSnafu { context, attribute: "offsets" }.build())?,
        })
    }
}

impl Display for Relocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "reloc kind:{} name:{} offsets:", self.kind, self.name)?;
        for (index, offset) in self.offsets.iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            write!(f, "{offset:#x}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationKind {
    /// 26-bit absolute jump target, as in `j`/`jal`.
    Targ26,
    /// Upper half of a split absolute address, as in `lui`.
    Hi16,
    /// Lower half of a split absolute address, as in `addiu`/`lw`.
    Lo16,
}

#[derive(Debug, Snafu)]
pub enum RelocationKindParseError {
    #[snafu(display("{context}: unknown relocation kind '{value}', must be one of: targ26, hi16, lo16:\n{backtrace}"))]
    UnknownKind { context: ParseContext, value: String, backtrace: Backtrace },
}

impl RelocationKind {
    fn parse(value: &str, context: &ParseContext) -> Result<Self, RelocationKindParseError> {
        match value {
            "targ26" => Ok(Self::Targ26),
            "hi16" => Ok(Self::Hi16),
            "lo16" => Ok(Self::Lo16),
            _ => UnknownKindSnafu { context, value }.fail(),
        }
    }
}

impl Display for RelocationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Targ26 => write!(f, "targ26"),
            Self::Hi16 => write!(f, "hi16"),
            Self::Lo16 => write!(f, "lo16"),
        }
    }
}
