use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// Severity bits of a runtime error.
///
/// Severities combine into a mask; the error handler only promotes errors
/// whose bit is enabled in its active reporting mask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Severity(u32);

impl Severity {
    pub const FATAL: Severity = Severity(1);
    pub const ERROR: Severity = Severity(1 << 1);
    pub const WARNING: Severity = Severity(1 << 2);
    pub const NOTICE: Severity = Severity(1 << 3);
    pub const DEPRECATED: Severity = Severity(1 << 4);

    pub const NONE: Severity = Severity(0);
    pub const ALL: Severity = Severity(0b1_1111);

    /// Builds a mask from raw bits, dropping unknown ones.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Severity(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Severity) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Severity) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Human readable label of the highest set bit.
    pub fn label(self) -> &'static str {
        if self.contains(Self::FATAL) {
            "Fatal error"
        } else if self.contains(Self::ERROR) {
            "Error"
        } else if self.contains(Self::WARNING) {
            "Warning"
        } else if self.contains(Self::NOTICE) {
            "Notice"
        } else if self.contains(Self::DEPRECATED) {
            "Deprecated"
        } else {
            "Unknown"
        }
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for Severity {
    type Output = Severity;

    fn bitor(self, rhs: Self) -> Self::Output {
        Severity(self.0 | rhs.0)
    }
}

impl BitOrAssign for Severity {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Severity {
    type Output = Severity;

    fn bitand(self, rhs: Self) -> Self::Output {
        Severity(self.0 & rhs.0)
    }
}

impl Not for Severity {
    type Output = Severity;

    fn not(self) -> Self::Output {
        Severity(!self.0 & Self::ALL.0)
    }
}

impl fmt::Debug for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Severity({:#07b})", self.0)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_operations() {
        let mask = Severity::ALL & !Severity::NOTICE;
        assert!(mask.contains(Severity::WARNING));
        assert!(!mask.intersects(Severity::NOTICE));
        assert!((Severity::WARNING | Severity::NOTICE).intersects(Severity::NOTICE));
    }

    #[test]
    fn test_from_bits_truncate_drops_unknown_bits() {
        assert_eq!(Severity::from_bits_truncate(u32::MAX), Severity::ALL);
        assert!(Severity::from_bits_truncate(0).is_empty());
    }
}
