//! Raw status codes reported by the platform device backend.
//!
//! The platform input service answers every call with a 32-bit result code.
//! Zero means success; anything else identifies the failing module and the
//! reason.  The code is structured as follows:
//!
//! - **Bits 0-8:** Module ID
//! - **Bits 9-21:** Description
//! - **Bits 22-31:** Reserved
//!
//! Two textual forms are used:
//!
//! - [`Display`](std::fmt::Display) renders the raw value as fixed-width
//!   hexadecimal (`0x0000cc22`).  Every caller-facing error message embeds
//!   this form.
//! - [`ResultCode::error_code`] renders the human `2XXX-YYYY` form, where
//!   `XXX` is the module and `YYYY` the description.

use std::fmt;

use serde::{Deserialize, Serialize};

const MODULE_MASK: u32 = 0x1FF;
const DESCRIPTION_SHIFT: u32 = 9;
const DESCRIPTION_MASK: u32 = 0x1FFF;

/// A raw platform result code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCode(u32);

impl ResultCode {
    /// The success code.
    pub const SUCCESS: Self = Self(0);

    /// Wraps a raw value exactly as the backend reported it.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Builds a code from its module and description parts.
    ///
    /// Out-of-range parts are truncated to their bit widths.
    pub const fn from_parts(module: u32, description: u32) -> Self {
        Self((module & MODULE_MASK) | ((description & DESCRIPTION_MASK) << DESCRIPTION_SHIFT))
    }

    /// Returns the raw `u32` value.
    pub const fn to_raw(self) -> u32 {
        self.0
    }

    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    pub const fn is_failure(self) -> bool {
        self.0 != 0
    }

    /// Returns the module that produced the code.
    pub const fn module(self) -> u32 {
        self.0 & MODULE_MASK
    }

    /// Returns the description value.
    pub const fn description(self) -> u32 {
        (self.0 >> DESCRIPTION_SHIFT) & DESCRIPTION_MASK
    }

    /// Formats the code as `2XXX-YYYY`.
    pub fn error_code(self) -> String {
        format!("{:04}-{:04}", 2000 + self.module(), self.description())
    }
}

impl From<u32> for ResultCode {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::Debug for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResultCode({:#010x}, {})", self.0, self.error_code())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_fixed_width_hex() {
        assert_eq!(ResultCode::from_raw(0xCC22).to_string(), "0x0000cc22");
        assert_eq!(ResultCode::from_raw(0xDEAD_BEEF).to_string(), "0xdeadbeef");
        assert_eq!(ResultCode::SUCCESS.to_string(), "0x00000000");
    }

    #[test]
    fn test_from_parts_splits_back_into_module_and_description() {
        // Arrange
        let code = ResultCode::from_parts(202, 100);

        // Act / Assert
        assert_eq!(code.module(), 202);
        assert_eq!(code.description(), 100);
        assert_eq!(code.to_raw(), 202 | (100 << 9));
    }

    #[test]
    fn test_from_parts_truncates_oversized_parts() {
        let code = ResultCode::from_parts(0x3FF, 0x3FFF);
        assert_eq!(code.module(), 0x1FF);
        assert_eq!(code.description(), 0x1FFF);
    }

    #[test]
    fn test_error_code_uses_2xxx_yyyy_form() {
        let code = ResultCode::from_parts(202, 100);
        assert_eq!(code.error_code(), "2202-0100");
    }

    #[test]
    fn test_success_and_failure_predicates() {
        assert!(ResultCode::SUCCESS.is_success());
        assert!(!ResultCode::SUCCESS.is_failure());
        assert!(ResultCode::from(1).is_failure());
    }

    #[test]
    fn test_debug_includes_both_forms() {
        let text = format!("{:?}", ResultCode::from_parts(1, 2));
        assert!(text.contains("0x00000401"), "got {text}");
        assert!(text.contains("2001-0002"), "got {text}");
    }
}
