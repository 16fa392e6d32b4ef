// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Board support for STM32H743/753 boards running a USB stack.
//!
//! [`board_init`] performs the one-time bring-up: caches and clocks (through
//! `drv-stm32h7-startup`), GPIO bank clocks, the board's pin table, the
//! millisecond tick, the console UART, and the USB OTG blocks. It hands back
//! a [`Board`], through which the USB stack and application reach the LED,
//! button, UART, unique ID, and tick.
//!
//! The board itself is described by a TOML file compiled into
//! [`config::BOARD`]; see `build-board-config` for the format.
//!
//! Everything after the clock setup is done in [`bring_up`], through the PAC
//! register blocks a [`Registers`] hands out, so the sequence can be checked
//! on the host against scratch memory.

#![cfg_attr(not(test), no_std)]

pub mod config;
#[cfg(test)]
mod fake;
pub mod irq;
pub mod pins;
pub mod regs;
pub mod tick;
pub mod trace;
pub mod usb;

use drv_stm32xx_uid::copy_uid;
use lib_usart::{DeviceId, Usart};
use ringbuf::{ringbuf, ringbuf_entry};

pub use config::{BoardConfig, TickMode, BOARD};
pub use regs::{OnChip, Registers};
pub use tick::{millis, on_systick};

cfg_if::cfg_if! {
    if #[cfg(feature = "h743")] {
        use stm32h7::stm32h743 as device;
    } else if #[cfg(feature = "h753")] {
        use stm32h7::stm32h753 as device;
    } else {
        compile_error!("unsupported or missing SoC model feature");
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BoardError {
    /// The board has no console UART, or it couldn't be set up.
    NoUart,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    GpioClocks,
    TraceEtm,
    PinTable { pins: u8 },
    SysTick { reload: u32 },
    RtosTick { priority: u8 },
    Uart(DeviceId),
    UartBaudUnreachable { clock_hz: u32, baud: u32 },
    UsbHs,
    Init2,
    VbusOn { rhport: u8 },
    UartTimeout { sent: u16 },
}

ringbuf!(Trace, 16, Trace::None);

/// Clock frequencies the bring-up needs to know about.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Clocks {
    pub cpu_hz: u32,
    pub pclk1_hz: u32,
    pub pclk2_hz: u32,
}

impl Clocks {
    /// Kernel clock of `device`, assuming the reset kernel clock selection.
    pub fn uart_clock(&self, device: DeviceId) -> u32 {
        if device.on_apb2() {
            self.pclk2_hz
        } else {
            self.pclk1_hz
        }
    }
}

#[cfg(target_arch = "arm")]
impl From<&drv_stm32h7_startup::ClockConfig> for Clocks {
    fn from(c: &drv_stm32h7_startup::ClockConfig) -> Self {
        Self {
            cpu_hz: c.cpu_hz,
            pclk1_hz: c.pclk1_hz,
            pclk2_hz: c.pclk2_hz,
        }
    }
}

/// Board-specific extension points called at the end of bring-up.
#[derive(Copy, Clone, Default)]
pub struct Hooks {
    /// Second-stage init, run after all of the generic setup.
    pub init2: Option<fn()>,
    /// Switches VBUS power on a root hub port. Called with `true` for the
    /// host port if the board runs a USB host.
    pub vbus_set: Option<fn(u8, bool)>,
}

impl Hooks {
    pub const NONE: Self = Self {
        init2: None,
        vbus_set: None,
    };
}

/// A brought-up board.
pub struct Board<R> {
    regs: R,
    config: &'static BoardConfig,
    uart: Option<Usart>,
}

/// Brings up the board: caches and clock tree, then everything in
/// [`bring_up`].
///
/// # Panics
///
/// If called more than once.
#[cfg(target_arch = "arm")]
pub fn board_init(
    clocks: &drv_stm32h7_startup::ClockConfig,
    config: &'static BoardConfig,
    hooks: &Hooks,
) -> Board<OnChip> {
    // Taking the peripherals here is what makes a second call panic; the
    // rest of bring-up reaches the blocks through `OnChip`.
    let _peripherals = drv_stm32h7_startup::system_init(clocks);

    // Safety: this is the part the PAC describes, and nothing else is
    // running yet.
    let regs = unsafe { OnChip::new() };
    bring_up(regs, config, &Clocks::from(clocks), hooks)
}

/// The part of bring-up that follows the clock setup, in order: GPIO bank
/// clocks, ETM trace pins (with the `trace-etm` feature), the pin table, the
/// tick, the UART, USB FS, USB HS if a stack runs on port 1, the USB
/// voltage detector, `hooks.init2`, and VBUS power for a host port.
///
/// A UART whose baud rate can't be generated is left off; the board then
/// behaves as if it had none.
pub fn bring_up<R: Registers>(
    regs: R,
    config: &'static BoardConfig,
    clocks: &Clocks,
    hooks: &Hooks,
) -> Board<R> {
    pins::enable_gpio_clocks(regs.rcc());
    ringbuf_entry!(Trace::GpioClocks);

    if cfg!(feature = "trace-etm") {
        trace::enable_etm(&regs);
        ringbuf_entry!(Trace::TraceEtm);
    }

    pins::apply_table(&regs, config.pins);
    ringbuf_entry!(Trace::PinTable {
        pins: config.pins.len() as u8
    });

    match config.tick {
        TickMode::BareMetal => {
            tick::start_systick(regs.syst(), regs.scb(), clocks.cpu_hz);
            ringbuf_entry!(Trace::SysTick {
                reload: clocks.cpu_hz / 1000 - 1
            });
        }
        TickMode::Rtos {
            max_syscall_priority,
        } => {
            tick::hand_to_rtos(regs.syst(), regs.nvic(), max_syscall_priority);
            ringbuf_entry!(Trace::RtosTick {
                priority: max_syscall_priority
            });
        }
    }

    let uart = config.uart.and_then(|u| {
        ringbuf_entry!(Trace::Uart(u.device));
        let clock_hz = clocks.uart_clock(u.device);
        match Usart::turn_on(
            regs.rcc(),
            regs.usart(u.device),
            u.device,
            clock_hz,
            u.baud,
        ) {
            Ok(uart) => Some(uart),
            Err(e) => {
                ringbuf_entry!(Trace::UartBaudUnreachable {
                    clock_hz: e.clock_hz,
                    baud: e.baud
                });
                None
            }
        }
    });

    usb::init_fs(&regs, config.usb.fs_vbus_sense);
    if config.usb.uses_hs() {
        usb::init_hs(&regs, config.usb.ulpi);
        ringbuf_entry!(Trace::UsbHs);
    }
    usb::enable_voltage_detector(regs.pwr());

    let board = Board { regs, config, uart };

    if let Some(init2) = hooks.init2 {
        ringbuf_entry!(Trace::Init2);
        init2();
    }
    if let (Some(rhport), Some(vbus_set)) =
        (config.usb.host_rhport, hooks.vbus_set)
    {
        ringbuf_entry!(Trace::VbusOn { rhport });
        vbus_set(rhport, true);
    }

    board
}

impl<R: Registers> Board<R> {
    /// Turns the LED on or off. Does nothing on boards without one.
    pub fn led_write(&self, on: bool) {
        if let Some(led) = &self.config.led {
            pins::drive(&self.regs, led, on);
        }
    }

    /// 1 if the button is pressed, else 0. Always 0 on boards without one.
    pub fn button_read(&self) -> u32 {
        match &self.config.button {
            Some(button) => u32::from(pins::is_active(&self.regs, button)),
            None => 0,
        }
    }

    /// Copies the 96-bit device UID into `buf`, returning the number of
    /// bytes written: 12, unless `buf` is shorter.
    pub fn unique_id(&self, buf: &mut [u8]) -> usize {
        copy_uid(self.regs.uid(), buf)
    }

    /// Reception isn't supported; always 0.
    pub fn uart_read(&self, _buf: &mut [u8]) -> usize {
        0
    }

    /// Sends `buf` on the console UART, blocking until it has been handed to
    /// the transmitter. Returns `buf.len()`.
    ///
    /// A byte that can't be sent within the per-byte poll limit ends the
    /// transfer early; this is recorded but not reported.
    pub fn uart_write(&self, buf: &[u8]) -> Result<usize, BoardError> {
        let uart = self.uart.as_ref().ok_or(BoardError::NoUart)?;
        if let Err(e) = uart.write_blocking(buf) {
            ringbuf_entry!(Trace::UartTimeout {
                sent: e.sent as u16
            });
        }
        Ok(buf.len())
    }

    /// Milliseconds since bring-up, in bare-metal tick mode.
    pub fn millis(&self) -> u32 {
        tick::millis()
    }
}
