//! Per-version limits of the Z-machine.

use super::error::{EmitError, EmitResult};
use std::fmt;

/// A validated Z-machine version (1-8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZVersion(u8);

impl ZVersion {
    pub fn new(version: i32) -> EmitResult<Self> {
        match version {
            1..=8 => Ok(ZVersion(version as u8)),
            _ => Err(EmitError::UnsupportedVersion(version)),
        }
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Highest property number; properties are numbered downward from here.
    pub fn max_properties(self) -> u16 {
        if self.0 >= 4 { 63 } else { 31 }
    }

    /// Highest flag (attribute) number; flags are numbered downward from here.
    pub fn max_flags(self) -> u16 {
        if self.0 >= 4 { 47 } else { 31 }
    }

    pub fn max_property_length(self) -> usize {
        if self.0 > 3 { 64 } else { 8 }
    }

    pub fn max_call_arguments(self) -> usize {
        if self.0 > 3 { 7 } else { 3 }
    }

    /// Whether CALL1/CALL2/XCALL exist alongside CALL.
    pub fn has_sized_calls(self) -> bool {
        self.0 >= 4
    }

    /// Whether the ICALL family (call without storing a result) exists.
    pub fn has_no_store_calls(self) -> bool {
        self.0 >= 5
    }

    /// Whether routine locals carry initial values in the routine header.
    /// From version 5 on, locals start at zero and defaults are assigned by code.
    pub fn has_header_defaults(self) -> bool {
        self.0 < 5
    }

    pub fn has_header_block(self) -> bool {
        self.0 > 4
    }

    /// Words used for the flag bitmask in an object record.
    pub fn flag_words(self) -> usize {
        if self.0 >= 4 { 3 } else { 2 }
    }

    /// Bytes taken by an encoded dictionary word.
    pub fn zword_bytes(self) -> usize {
        if self.0 >= 4 { 6 } else { 4 }
    }
}

impl fmt::Display for ZVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_range() {
        assert!(ZVersion::new(0).is_err());
        assert!(ZVersion::new(9).is_err());
        assert!(matches!(
            ZVersion::new(-1),
            Err(EmitError::UnsupportedVersion(-1))
        ));
        for v in 1..=8 {
            assert_eq!(ZVersion::new(v).unwrap().number(), v as u8);
        }
    }

    #[test]
    fn test_limits() {
        let v3 = ZVersion::new(3).unwrap();
        let v4 = ZVersion::new(4).unwrap();
        let v5 = ZVersion::new(5).unwrap();

        assert_eq!(v3.max_properties(), 31);
        assert_eq!(v3.max_flags(), 31);
        assert_eq!(v3.max_property_length(), 8);
        assert_eq!(v3.max_call_arguments(), 3);
        assert_eq!(v4.max_properties(), 63);
        assert_eq!(v4.max_flags(), 47);
        assert_eq!(v4.max_property_length(), 64);
        assert_eq!(v4.max_call_arguments(), 7);
        assert!(!v4.has_no_store_calls());
        assert!(v5.has_no_store_calls());
        assert!(!v4.has_header_block());
        assert!(v5.has_header_block());
    }
}
