//! The 64-bit button mask carried in every controller snapshot.
//!
//! Each bit is one independently settable logical input.  Scripts usually
//! pass the raw integer; the named constants below describe the bits of the
//! representative full-key gamepad so that sequence files and tests can refer
//! to buttons by name.
//!
//! | Bits  | Inputs                                         |
//! |-------|------------------------------------------------|
//! | 0-3   | A, B, X, Y                                     |
//! | 4-5   | Left / right stick click                       |
//! | 6-9   | L, R, ZL, ZR                                   |
//! | 10-11 | Plus, Minus                                    |
//! | 12-15 | D-pad left, up, right, down                    |
//! | 16-23 | Left / right stick digital directions          |
//! | 24-27 | Side rail buttons (left SL/SR, right SL/SR)    |
//!
//! The remaining bits have no name but are still stored and pushed verbatim.
//!
//! # Parsing
//!
//! Sequence files name buttons as text.  Names are case-insensitive, `-` may
//! stand for `_`, and several buttons can be joined with `|`:
//!
//! ```text
//! "a"             -> A
//! "dpad-up | zr"  -> DPAD_UP | ZR
//! "0x30"          -> STICK_L | STICK_R
//! ```

use std::str::FromStr;

use bitflags::bitflags;
use thiserror::Error;

/// Returned by [`ButtonMask::from_str`] for an unrecognised button name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown button name: {0:?}")]
pub struct UnknownButton(pub String);

bitflags! {
    /// Bitmask of pressed buttons.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[repr(transparent)]
    pub struct ButtonMask: u64 {
        const A = 1 << 0;
        const B = 1 << 1;
        const X = 1 << 2;
        const Y = 1 << 3;
        const STICK_L = 1 << 4;
        const STICK_R = 1 << 5;
        const L = 1 << 6;
        const R = 1 << 7;
        const ZL = 1 << 8;
        const ZR = 1 << 9;
        const PLUS = 1 << 10;
        const MINUS = 1 << 11;
        const DPAD_LEFT = 1 << 12;
        const DPAD_UP = 1 << 13;
        const DPAD_RIGHT = 1 << 14;
        const DPAD_DOWN = 1 << 15;
        const STICK_L_LEFT = 1 << 16;
        const STICK_L_UP = 1 << 17;
        const STICK_L_RIGHT = 1 << 18;
        const STICK_L_DOWN = 1 << 19;
        const STICK_R_LEFT = 1 << 20;
        const STICK_R_UP = 1 << 21;
        const STICK_R_RIGHT = 1 << 22;
        const STICK_R_DOWN = 1 << 23;
        const LEFT_SL = 1 << 24;
        const LEFT_SR = 1 << 25;
        const RIGHT_SL = 1 << 26;
        const RIGHT_SR = 1 << 27;

        // Unnamed bits are part of the mask too.
        const _ = !0;
    }
}

impl FromStr for ButtonMask {
    type Err = UnknownButton;

    /// Parses one or more `|`-separated button names or hex literals.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<String> = s
            .split('|')
            .map(|token| {
                let token = token.trim();
                if token.starts_with("0x") {
                    token.to_string()
                } else {
                    token.to_ascii_uppercase().replace('-', "_")
                }
            })
            .collect();
        if tokens.iter().any(String::is_empty) {
            return Err(UnknownButton(s.to_string()));
        }
        bitflags::parser::from_str(&tokens.join(" | ")).map_err(|_| UnknownButton(s.to_string()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use bitflags::Flags;

    #[test]
    fn test_named_bits_are_distinct() {
        let mut seen = ButtonMask::empty();
        for flag in ButtonMask::FLAGS.iter().filter(|flag| flag.is_named()) {
            let bit = *flag.value();
            assert_eq!(bit.bits().count_ones(), 1, "{} must be a single bit", flag.name());
            assert!(!seen.intersects(bit), "{} overlaps an earlier button", flag.name());
            seen |= bit;
        }
        assert_eq!(seen.bits(), (1 << 28) - 1);
    }

    #[test]
    fn test_parse_button_names() {
        assert_eq!("A".parse::<ButtonMask>(), Ok(ButtonMask::A));
        assert_eq!("a".parse::<ButtonMask>(), Ok(ButtonMask::A));
        assert_eq!("dpad-up".parse::<ButtonMask>(), Ok(ButtonMask::DPAD_UP));
        assert_eq!(" ZR ".parse::<ButtonMask>(), Ok(ButtonMask::ZR));
    }

    #[test]
    fn test_parse_combined_names_and_hex() {
        assert_eq!(
            "a | stick_r-down".parse::<ButtonMask>(),
            Ok(ButtonMask::A | ButtonMask::STICK_R_DOWN)
        );
        assert_eq!(
            "0x30".parse::<ButtonMask>(),
            Ok(ButtonMask::STICK_L | ButtonMask::STICK_R)
        );
    }

    #[test]
    fn test_parse_unknown_button_fails() {
        let err = "turbo".parse::<ButtonMask>().unwrap_err();
        assert_eq!(err, UnknownButton("turbo".to_string()));
    }

    #[test]
    fn test_parse_empty_name_fails() {
        assert!("".parse::<ButtonMask>().is_err());
        assert!("a |".parse::<ButtonMask>().is_err());
    }

    #[test]
    fn test_union_and_difference() {
        // Arrange
        let mask = ButtonMask::A.union(ButtonMask::B);

        // Act
        let released = mask.difference(ButtonMask::A);

        // Assert
        assert!(mask.contains(ButtonMask::A | ButtonMask::B));
        assert_eq!(released, ButtonMask::B);
    }

    #[test]
    fn test_unnamed_high_bits_are_preserved() {
        let mask = ButtonMask::from_bits_retain(1 << 63 | 1);
        assert_eq!(mask.bits(), 0x8000_0000_0000_0001);
        assert_eq!(
            mask.iter_names().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["A"]
        );
        assert_eq!((!ButtonMask::empty()).bits(), u64::MAX);
        assert_eq!(ButtonMask::all().bits(), u64::MAX);
    }

    #[test]
    fn test_debug_lists_named_bits() {
        let text = format!("{:?}", ButtonMask::A | ButtonMask::PLUS);
        assert!(text.contains("A | PLUS"), "got {text}");
    }
}
