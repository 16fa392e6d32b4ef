// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GPIO pin descriptions and register programming for STM32 parts.
//!
//! Board code describes each pin it cares about with a [`PinSet`] and a
//! [`PinConfig`], and applies them to the port returned by
//! [`bank::get_gpio_regs`].

#![cfg_attr(not(test), no_std)]

pub mod bank;

/// Enumerates the GPIO ports, from the perspective of driver software. This
/// does not mean the port is bonded out on the package; we don't model
/// package differences.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[repr(u8)]
pub enum Port {
    A = 0,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
}

impl Port {
    /// Turns a `Port` into a `PinSet` containing one pin, number `index`.
    #[inline(always)]
    pub const fn pin(self, index: usize) -> PinSet {
        PinSet {
            port: self,
            pin_mask: 1 << index,
        }
    }

    /// Creates a `PinSet` with several pins of this port.
    #[inline(always)]
    pub const fn pins<const N: usize>(self, indexes: [usize; N]) -> PinSet {
        let mut pin_mask = 0;
        let mut i = 0;
        while i < N {
            pin_mask |= 1 << indexes[i];
            i += 1;
        }
        PinSet {
            port: self,
            pin_mask,
        }
    }
}

/// A set of pins on one port, the target of a configuration or output
/// operation. The hardware can configure up to 16 pins of a port at once.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PinSet {
    pub port: Port,
    /// 1s in affected positions, 0s in others.
    pub pin_mask: u16,
}

impl PinSet {
    /// Derives a `PinSet` by setting mask bit `index`.
    #[inline(always)]
    pub const fn and_pin(self, index: usize) -> Self {
        Self {
            pin_mask: self.pin_mask | 1 << index,
            ..self
        }
    }
}

/// Possible modes for a GPIO pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mode {
    /// Digital input, through a Schmitt trigger. To park an unused pin, use
    /// `Analog` instead.
    Input = 0b00,
    /// Software-controlled output, driven from ODR.
    Output = 0b01,
    /// Connected to a peripheral through the function mux; see `Alternate`.
    Alternate = 0b10,
    /// Highest-impedance state, also used for ADC channels.
    Analog = 0b11,
}

/// Drive modes for a GPIO pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputType {
    PushPull = 0,
    /// High side driver off: writing 1 leaves the pin floating.
    OpenDrain = 1,
}

/// Drive speeds / slew rate limits. Check the datasheet of the specific part
/// for actual numbers; when in doubt, use `Low`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Speed {
    Low = 0b00,
    Medium = 0b01,
    High = 0b10,
    VeryHigh = 0b11,
}

/// Switchable weak pull resistors. These apply in every mode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Pull {
    None = 0b00,
    Up = 0b01,
    Down = 0b10,
}

/// Alternate function numbers for AFRL/AFRH. Which peripheral signal each
/// number selects depends on the pin; see the datasheet.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Alternate {
    AF0 = 0,
    AF1 = 1,
    AF2 = 2,
    AF3 = 3,
    AF4 = 4,
    AF5 = 5,
    AF6 = 6,
    AF7 = 7,
    AF8 = 8,
    AF9 = 9,
    AF10 = 10,
    AF11 = 11,
    AF12 = 12,
    AF13 = 13,
    AF14 = 14,
    AF15 = 15,
}

/// Logic level of a pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Level {
    Low,
    High,
}

/// Everything needed to initialize a pin.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PinConfig {
    pub mode: Mode,
    pub output_type: OutputType,
    pub speed: Speed,
    pub pull: Pull,
    /// Only meaningful in `Mode::Alternate`.
    pub alternate: Alternate,
}

impl PinConfig {
    pub const fn input(pull: Pull) -> Self {
        Self {
            mode: Mode::Input,
            output_type: OutputType::PushPull,
            speed: Speed::Low,
            pull,
            alternate: Alternate::AF0,
        }
    }

    pub const fn output(
        output_type: OutputType,
        speed: Speed,
        pull: Pull,
    ) -> Self {
        Self {
            mode: Mode::Output,
            output_type,
            speed,
            pull,
            alternate: Alternate::AF0,
        }
    }

    pub const fn alternate(
        alternate: Alternate,
        output_type: OutputType,
        speed: Speed,
        pull: Pull,
    ) -> Self {
        Self {
            mode: Mode::Alternate,
            output_type,
            speed,
            pull,
            alternate,
        }
    }

    /// Packs the configuration into the attribute word consumed by
    /// [`bank::AnyGpioPeriph::configure`]:
    ///
    /// - bits 1:0 mode
    /// - bit 2 output type
    /// - bits 4:3 speed
    /// - bits 6:5 pull
    /// - bits 10:7 alternate function
    pub const fn encode(&self) -> u16 {
        self.mode as u16
            | (self.output_type as u16) << 2
            | (self.speed as u16) << 3
            | (self.pull as u16) << 5
            | (self.alternate as u16) << 7
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_sets() {
        assert_eq!(Port::A.pin(9).pin_mask, 1 << 9);
        assert_eq!(Port::A.pins([11, 12]).pin_mask, 0b1_1000_0000_0000);
        assert_eq!(Port::E.pins([2, 3]).and_pin(4), Port::E.pins([2, 3, 4]));
    }

    #[test]
    fn encode_layout() {
        let cfg = PinConfig::alternate(
            Alternate::AF10,
            OutputType::OpenDrain,
            Speed::High,
            Pull::Up,
        );
        let v = cfg.encode();
        assert_eq!(v & 0b11, Mode::Alternate as u16);
        assert_eq!((v >> 2) & 1, 1);
        assert_eq!((v >> 3) & 0b11, Speed::High as u16);
        assert_eq!((v >> 5) & 0b11, Pull::Up as u16);
        assert_eq!((v >> 7) & 0b1111, 10);
    }
}
