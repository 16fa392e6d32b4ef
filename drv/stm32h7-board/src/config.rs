// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Board description, generated at build time from the board's TOML file
//! (see `build-board-config`).

use drv_stm32xx_gpio_common::{Level, PinConfig, PinSet};
use lib_usart::DeviceId;

/// One entry in the board's pin table.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoardPin {
    pub name: &'static str,
    pub pins: PinSet,
    pub config: PinConfig,
    /// Level at which the pin is "on".
    pub active: Level,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UartConfig {
    pub device: DeviceId,
    pub baud: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct UsbConfig {
    /// Root hub port used by the device stack: 0 is the FS block (OTG2),
    /// 1 the HS block (OTG1).
    pub device_rhport: Option<u8>,
    /// Root hub port used by the host stack.
    pub host_rhport: Option<u8>,
    /// Sense VBUS on PA9 instead of overriding B-session valid.
    pub fs_vbus_sense: bool,
    /// ULPI PHY pins, one per entry.
    pub ulpi: &'static [PinSet],
}

impl UsbConfig {
    /// Whether anything runs on the HS block.
    pub const fn uses_hs(&self) -> bool {
        matches!(self.device_rhport, Some(1))
            || matches!(self.host_rhport, Some(1))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TickMode {
    /// SysTick runs at 1kHz and drives [`crate::millis`].
    BareMetal,
    /// SysTick belongs to the RTOS; USB interrupts are placed at the
    /// highest priority the RTOS allows calls from.
    Rtos { max_syscall_priority: u8 },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoardConfig {
    pub name: &'static str,
    /// Applied in order at boot.
    pub pins: &'static [BoardPin],
    pub led: Option<BoardPin>,
    pub button: Option<BoardPin>,
    pub uart: Option<UartConfig>,
    pub usb: UsbConfig,
    pub tick: TickMode,
}

mod generated {
    #![allow(unused_imports)]

    use super::*;
    use drv_stm32xx_gpio_common::{
        Alternate, Mode, OutputType, PinConfig, Port, Pull, Speed,
    };

    include!(concat!(env!("OUT_DIR"), "/board_config.rs"));
}

pub use generated::{BOARD, PINS};
