// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polled USART interface.
//!
//! Boot-time console output doesn't warrant interrupts or buffering: bytes
//! are pushed straight into the transmitter, spinning (with a bound) until it
//! has room. USARTs are inherently single-owner, so the handle is a plain
//! value owned by the board code.

#![cfg_attr(not(test), no_std)]

use ringbuf::{ringbuf, ringbuf_entry};

pub mod stm32h7;

pub use self::stm32h7::DeviceId;
use self::stm32h7::device;

/// How many times to poll for transmitter space before giving up on a byte.
pub const TX_POLL_LIMIT: u32 = 0xffff;

/// BRR range with 16x oversampling: the divisor has to be at least 16, and
/// the register is 16 bits wide.
const BRR_MIN: u32 = 16;
const BRR_MAX: u32 = 0xFFFF;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    TurnOn { brr: u16 },
    BadBaud { clock_hz: u32, baud: u32 },
    TxTimeout { sent: u16 },
}

ringbuf!(Trace, 8, Trace::None);

/// The requested baud rate can't be generated from the kernel clock.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BadBaudRate {
    pub clock_hz: u32,
    pub baud: u32,
}

/// The transmitter stayed full for [`TX_POLL_LIMIT`] polls.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TxTimeout {
    /// Bytes handed to the transmitter before the timeout.
    pub sent: usize,
}

/// BRR value for `baud` from a kernel clock of `clock_hz`, with 16x
/// oversampling, rounded to nearest. `None` if the divisor doesn't fit.
pub const fn brr_for(clock_hz: u32, baud: u32) -> Option<u16> {
    if baud == 0 {
        return None;
    }
    let clock_hz = clock_hz as u64;
    let baud = baud as u64;
    let div = (clock_hz + (baud / 2)) / baud;
    if div < BRR_MIN as u64 || div > BRR_MAX as u64 {
        None
    } else {
        Some(div as u16)
    }
}

/// Handle to an enabled USART.
pub struct Usart {
    usart: &'static device::usart1::RegisterBlock,
}

impl Usart {
    /// Turns on the USART `id`, whose registers are `usart`, as 8N1 with no
    /// flow control, transmitter and receiver enabled, 16x oversampling, at
    /// `baud` from a kernel clock of `clock_hz`.
    ///
    /// Nothing is touched if `baud` can't be reached.
    pub fn turn_on(
        rcc: &device::rcc::RegisterBlock,
        usart: &'static device::usart1::RegisterBlock,
        id: DeviceId,
        clock_hz: u32,
        baud: u32,
    ) -> Result<Self, BadBaudRate> {
        let Some(brr) = brr_for(clock_hz, baud) else {
            ringbuf_entry!(Trace::BadBaud { clock_hz, baud });
            return Err(BadBaudRate { clock_hz, baud });
        };

        // Turn the actual peripheral on so that we can interact with it.
        id.enable_clock(rcc);

        // Most framing bits can only be changed while UE is clear.
        usart.cr1.modify(|_, w| w.ue().clear_bit());
        usart.cr1.modify(|_, w| {
            w.m0()
                .clear_bit()
                .m1()
                .clear_bit()
                .pce()
                .clear_bit()
                .over8()
                .clear_bit()
        });
        // One stop bit.
        #[allow(unused_unsafe)]
        usart.cr2.modify(|_, w| unsafe { w.stop().bits(0b00) });
        usart.cr3.modify(|_, w| w.rtse().clear_bit().ctse().clear_bit());

        usart.brr.write(|w| w.brr().bits(brr));

        // Enable the UART, transmitter, and receiver.
        usart
            .cr1
            .modify(|_, w| w.ue().set_bit().te().set_bit().re().set_bit());
        ringbuf_entry!(Trace::TurnOn { brr });

        Ok(Self { usart })
    }

    /// Sends `byte` if the transmitter has room, returning whether it did.
    pub fn try_write_tx(&self, byte: u8) -> bool {
        // See if TX register is empty
        if self.usart.isr.read().txe().bit() {
            // Stuff byte into transmitter.
            self.usart.tdr.write(|w| w.tdr().bits(u16::from(byte)));
            true
        } else {
            false
        }
    }

    /// Sends every byte of `bytes`, spinning for transmitter space.
    pub fn write_blocking(&self, bytes: &[u8]) -> Result<(), TxTimeout> {
        for (sent, &byte) in bytes.iter().enumerate() {
            if !(0..TX_POLL_LIMIT).any(|_| self.try_write_tx(byte)) {
                ringbuf_entry!(Trace::TxTimeout { sent: sent as u16 });
                return Err(TxTimeout { sent });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmio::{peek, poke, scratch_block};

    const TXE: u32 = 1 << 7;

    fn blocks() -> (
        &'static device::rcc::RegisterBlock,
        &'static device::usart1::RegisterBlock,
    ) {
        (scratch_block(), scratch_block())
    }

    #[test]
    fn brr_rounds_to_nearest() {
        assert_eq!(brr_for(100_000_000, 115_200), Some(868));
        assert_eq!(brr_for(64_000_000, 9_600), Some(6667));
        assert_eq!(brr_for(16_000_000, 1_000_000), Some(16));
    }

    #[test]
    fn brr_out_of_range() {
        // 83333 doesn't fit in 16 bits.
        assert_eq!(brr_for(100_000_000, 1_200), None);
        // Below the 16x oversampling minimum.
        assert_eq!(brr_for(16_000_000, 2_000_000), None);
        assert_eq!(brr_for(100_000_000, 0), None);
        // Largest divisor that still fits.
        assert_eq!(brr_for(0xFFFF, 1), Some(0xFFFF));
    }

    #[test]
    fn turn_on_programs_8n1() {
        let (rcc, usart) = blocks();
        // Pretend a previous owner left 9-bit parity mode and RTS on.
        usart
            .cr1
            .write(|w| w.m0().set_bit().pce().set_bit().ue().set_bit());
        usart.cr3.write(|w| w.rtse().set_bit());

        Usart::turn_on(rcc, usart, DeviceId::Usart3, 100_000_000, 115_200)
            .unwrap();

        assert_eq!(usart.brr.read().bits(), 868);
        let cr1 = usart.cr1.read();
        assert!(cr1.ue().bit() && cr1.te().bit() && cr1.re().bit());
        assert!(!cr1.m0().bit() && !cr1.m1().bit() && !cr1.pce().bit());
        assert!(!cr1.over8().bit());
        assert_eq!(usart.cr2.read().stop().bits(), 0);
        assert_eq!(usart.cr3.read().bits(), 0);
        assert!(rcc.apb1lenr.read().usart3en().bit());
    }

    #[test]
    fn unreachable_baud_leaves_usart_off() {
        let (rcc, usart) = blocks();

        let err = Usart::turn_on(rcc, usart, DeviceId::Usart3, 100_000_000, 1_200);
        assert_eq!(
            err.err(),
            Some(BadBaudRate {
                clock_hz: 100_000_000,
                baud: 1_200
            })
        );
        assert_eq!(usart.brr.read().bits(), 0);
        assert!(!usart.cr1.read().ue().bit());
        assert_eq!(rcc.apb1lenr.read().bits(), 0);
    }

    #[test]
    fn write_sends_each_byte() {
        let (rcc, usart) = blocks();
        let port =
            Usart::turn_on(rcc, usart, DeviceId::Usart3, 100_000_000, 115_200)
                .unwrap();
        poke(&usart.isr, TXE);

        assert_eq!(port.write_blocking(b"hi!"), Ok(()));
        // TDR holds the last byte sent.
        assert_eq!(peek(&usart.tdr), u32::from(b'!'));
    }

    #[test]
    fn full_transmitter_times_out() {
        let (rcc, usart) = blocks();
        let port =
            Usart::turn_on(rcc, usart, DeviceId::Usart3, 100_000_000, 115_200)
                .unwrap();

        assert_eq!(port.write_blocking(b"xy"), Err(TxTimeout { sent: 0 }));
        assert_eq!(peek(&usart.tdr), 0);
        // Nothing to send is never a timeout.
        assert_eq!(port.write_blocking(&[]), Ok(()));
    }
}
