//! Output text encodings.

use std::fmt;
use std::str::FromStr;

/// Default encoding when neither the configuration nor the project sets one.
pub const DEFAULT_ENCODING: &str = "UTF-8";

/// Supported output encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputEncoding {
    #[default]
    Utf8,
    UsAscii,
    Latin1,
    Utf16Le,
    Utf16Be,
}

/// A character that cannot be represented in the target encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unmappable {
    pub encoding: OutputEncoding,
    pub character: char,
    pub offset: usize,
}

impl fmt::Display for Unmappable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "character {:?} at byte {} cannot be encoded as {}",
            self.character, self.offset, self.encoding
        )
    }
}

impl std::error::Error for Unmappable {}

impl OutputEncoding {
    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            OutputEncoding::Utf8 => "UTF-8",
            OutputEncoding::UsAscii => "US-ASCII",
            OutputEncoding::Latin1 => "ISO-8859-1",
            OutputEncoding::Utf16Le => "UTF-16LE",
            OutputEncoding::Utf16Be => "UTF-16BE",
        }
    }

    /// Encode `text` into bytes.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, Unmappable> {
        let limit = match self {
            OutputEncoding::Utf8 => return Ok(text.as_bytes().to_vec()),
            OutputEncoding::Utf16Le => {
                return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect())
            }
            OutputEncoding::Utf16Be => {
                return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect())
            }
            OutputEncoding::UsAscii => 0x7f,
            OutputEncoding::Latin1 => 0xff,
        };

        text.char_indices()
            .map(|(offset, character)| {
                u8::try_from(u32::from(character))
                    .ok()
                    .filter(|&b| u32::from(b) <= limit)
                    .ok_or(Unmappable { encoding: *self, character, offset })
            })
            .collect()
    }
}

impl fmt::Display for OutputEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String =
            s.chars().filter(|c| *c != '-' && *c != '_').collect::<String>().to_ascii_uppercase();
        match normalized.as_str() {
            "UTF8" => Ok(OutputEncoding::Utf8),
            "USASCII" | "ASCII" => Ok(OutputEncoding::UsAscii),
            "ISO88591" | "LATIN1" => Ok(OutputEncoding::Latin1),
            "UTF16LE" => Ok(OutputEncoding::Utf16Le),
            "UTF16BE" => Ok(OutputEncoding::Utf16Be),
            _ => Err(format!("unsupported encoding '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("UTF-8".parse::<OutputEncoding>(), Ok(OutputEncoding::Utf8));
        assert_eq!("utf8".parse::<OutputEncoding>(), Ok(OutputEncoding::Utf8));
        assert_eq!("ISO-8859-1".parse::<OutputEncoding>(), Ok(OutputEncoding::Latin1));
        assert_eq!("us-ascii".parse::<OutputEncoding>(), Ok(OutputEncoding::UsAscii));
        assert_eq!("UTF-16BE".parse::<OutputEncoding>(), Ok(OutputEncoding::Utf16Be));
        assert!("EBCDIC".parse::<OutputEncoding>().is_err());
    }

    #[test]
    fn test_encode_latin1() {
        assert_eq!(OutputEncoding::Latin1.encode("é").unwrap(), vec![0xe9]);
        let err = OutputEncoding::Latin1.encode("a€").unwrap_err();
        assert_eq!(err.character, '€');
        assert_eq!(err.offset, 1);
    }

    #[test]
    fn test_encode_ascii_rejects_high_bytes() {
        assert_eq!(OutputEncoding::UsAscii.encode("a{}").unwrap(), b"a{}".to_vec());
        assert!(OutputEncoding::UsAscii.encode("é").is_err());
    }

    #[test]
    fn test_encode_utf16() {
        assert_eq!(OutputEncoding::Utf16Le.encode("a").unwrap(), vec![0x61, 0x00]);
        assert_eq!(OutputEncoding::Utf16Be.encode("a").unwrap(), vec![0x00, 0x61]);
    }
}
