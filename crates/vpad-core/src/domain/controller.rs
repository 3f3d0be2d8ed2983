//! Virtual controller identity, device profile, and live input snapshot.
//!
//! # Snapshot model (for beginners)
//!
//! The platform input service does not accept "button A went down" deltas.
//! It accepts a *snapshot*: the complete input state of the device at one
//! moment (every button bit, both stick positions, the battery level).  Each
//! update replaces the previous snapshot entirely.
//!
//! [`ControllerState`] is that snapshot.  The host keeps one per attached
//! controller, mutates it when a script asks, and pushes the whole value to
//! the backend after every change.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::buttons::ButtonMask;

// ── Identity and profile ──────────────────────────────────────────────────────

/// Cosmetic colors of a virtual controller, each a packed 32-bit color.
///
/// No validation is performed: every value is a valid color.  The identity is
/// fixed once the controller is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ControllerIdentity {
    pub body_color: u32,
    pub buttons_color: u32,
    pub grip_left_color: u32,
    pub grip_right_color: u32,
}

impl ControllerIdentity {
    pub const fn new(
        body_color: u32,
        buttons_color: u32,
        grip_left_color: u32,
        grip_right_color: u32,
    ) -> Self {
        Self {
            body_color,
            buttons_color,
            grip_left_color,
            grip_right_color,
        }
    }
}

/// Kind of device the platform should emulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// Full-featured gamepad: two sticks, face buttons, shoulders, triggers.
    FullKey,
}

/// How the emulated device claims to be connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceType {
    Bluetooth,
}

/// Device profile handed to the backend at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerProfile {
    pub device_type: DeviceType,
    pub interface: InterfaceType,
}

impl ControllerProfile {
    /// The single representative profile: a wireless full-key gamepad.
    pub const WIRELESS_GAMEPAD: Self = Self {
        device_type: DeviceType::FullKey,
        interface: InterfaceType::Bluetooth,
    };
}

impl Default for ControllerProfile {
    fn default() -> Self {
        Self::WIRELESS_GAMEPAD
    }
}

// ── Sticks ────────────────────────────────────────────────────────────────────

/// Returned when a script selects a stick other than 1 or 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid joystick index {0}: expected 1 (left) or 2 (right)")]
pub struct InvalidStickIndex(pub i64);

/// One of the two analog sticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stick {
    Left,
    Right,
}

impl Stick {
    /// Maps the 1-based script index to a stick: 1 is left, 2 is right.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStickIndex`] for any other value.
    pub fn from_index(index: i64) -> Result<Self, InvalidStickIndex> {
        match index {
            1 => Ok(Self::Left),
            2 => Ok(Self::Right),
            other => Err(InvalidStickIndex(other)),
        }
    }

    /// The 1-based script index of this stick.
    pub const fn index(self) -> u8 {
        match self {
            Self::Left => 1,
            Self::Right => 2,
        }
    }

    const fn slot(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }
}

/// Signed deflection of one analog stick.
///
/// Values are stored exactly as given; the backend decides how to treat
/// deflections outside its native range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StickState {
    pub x: i32,
    pub y: i32,
}

impl StickState {
    pub const CENTERED: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

// ── Battery ───────────────────────────────────────────────────────────────────

/// Battery charge reported for the device.
///
/// Emulated controllers have no battery, so they always report [`BatteryLevel::Full`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BatteryLevel {
    Empty = 0,
    Critical = 1,
    Low = 2,
    Medium = 3,
    #[default]
    Full = 4,
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// Complete input snapshot of one virtual controller.
///
/// The default snapshot has no buttons pressed, both sticks centered, and a
/// full battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControllerState {
    buttons: ButtonMask,
    sticks: [StickState; 2],
    battery: BatteryLevel,
}

impl ControllerState {
    pub fn buttons(&self) -> ButtonMask {
        self.buttons
    }

    pub fn stick(&self, stick: Stick) -> StickState {
        self.sticks[stick.slot()]
    }

    pub fn left_stick(&self) -> StickState {
        self.stick(Stick::Left)
    }

    pub fn right_stick(&self) -> StickState {
        self.stick(Stick::Right)
    }

    pub fn battery(&self) -> BatteryLevel {
        self.battery
    }

    /// Replaces the whole button mask (not a merge).
    pub fn set_buttons(&mut self, buttons: ButtonMask) {
        self.buttons = buttons;
    }

    /// Replaces one stick's deflection; the other stick is untouched.
    pub fn set_stick(&mut self, stick: Stick, value: StickState) {
        self.sticks[stick.slot()] = value;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
