use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Options controlling how special characters in a pattern are interpreted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct RegexFlags: u32 {
        /// Letters match regardless of case (ASCII ranges in classes)
        const IGNORECASE = 2;
        /// `^` and `$` also match at line boundaries
        const MULTILINE = 8;
        /// `.` also matches a newline
        const DOTALL = 16;
        /// `\d`, `\w`, `\s` and `\b` consider ASCII characters only
        const ASCII = 256;
        /// `\r`, U+0085, U+2028 and U+2029 count as line terminators
        const EXT_NEWLINE = 512;
    }
}

impl RegexFlags {
    pub const DEFAULT: RegexFlags = RegexFlags::empty();

    /// Bits set in `self` that no known flag defines.
    pub fn unrecognized_bits(self) -> u32 {
        self.bits() & !RegexFlags::all().bits()
    }

    #[inline]
    pub fn is_multiline(self) -> bool {
        self.contains(RegexFlags::MULTILINE)
    }

    #[inline]
    pub fn is_dotall(self) -> bool {
        self.contains(RegexFlags::DOTALL)
    }

    #[inline]
    pub fn is_ignorecase(self) -> bool {
        self.contains(RegexFlags::IGNORECASE)
    }

    #[inline]
    pub fn is_ascii(self) -> bool {
        self.contains(RegexFlags::ASCII)
    }

    #[inline]
    pub fn is_ext_newline(self) -> bool {
        self.contains(RegexFlags::EXT_NEWLINE)
    }
}

impl Default for RegexFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for RegexFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "DEFAULT");
        }
        let mut first = true;
        for (name, _) in self.iter_names() {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(name)?;
            first = false;
        }
        let extra = self.unrecognized_bits();
        if extra != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{:#x}", extra)?;
        }
        Ok(())
    }
}

/// How parenthesized groups are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CaptureGroups {
    /// Every group keeps its match offsets for later retrieval
    #[default]
    Extract,
    /// Groups only group; their offsets are not tracked
    NonCapture,
}

impl fmt::Display for CaptureGroups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureGroups::Extract => write!(f, "EXTRACT"),
            CaptureGroups::NonCapture => write!(f, "NON_CAPTURE"),
        }
    }
}
