// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! USB OTG pins, clocks, and VBUS handling. The stack itself configures
//! the cores; this only gets the PHY side to a state it can start from.

use drv_stm32xx_gpio_common::{
    Alternate, OutputType, PinConfig, PinSet, Port, Pull, Speed,
};
use ringbuf::{ringbuf, ringbuf_entry};

use crate::device;
use crate::pins;
use crate::regs::Registers;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    VoltageDetector,
    FullSpeed { vbus_sense: bool },
    HighSpeed { ulpi_pins: u8 },
}

ringbuf!(Trace, 8, Trace::None);

/// PA11 (DM) and PA12 (DP).
const FS_DATA: PinSet = Port::A.pins([11, 12]);
/// PA10, the OTG ID line.
const FS_ID: PinSet = Port::A.pin(10);
/// PA9, VBUS.
const FS_VBUS: PinSet = Port::A.pin(9);

const FS_DATA_CONFIG: PinConfig = PinConfig::alternate(
    Alternate::AF10,
    OutputType::PushPull,
    Speed::High,
    Pull::None,
);
const FS_ID_CONFIG: PinConfig = PinConfig::alternate(
    Alternate::AF10,
    OutputType::OpenDrain,
    Speed::High,
    Pull::Up,
);
const ULPI_CONFIG: PinConfig = PinConfig::alternate(
    Alternate::AF10,
    OutputType::PushPull,
    Speed::VeryHigh,
    Pull::None,
);

/// Turns on the USB supply voltage detector. Repeating this is harmless.
pub fn enable_voltage_detector(pwr: &device::pwr::RegisterBlock) {
    pwr.cr3.modify(|_, w| w.usb33den().set_bit());
    ringbuf_entry!(Trace::VoltageDetector);
}

/// Brings up the FS block (OTG2, root hub port 0).
pub fn init_fs<R: Registers>(regs: &R, vbus_sense: bool) {
    pins::configure(regs, FS_DATA, &FS_DATA_CONFIG);
    pins::configure(regs, FS_ID, &FS_ID_CONFIG);

    enable_voltage_detector(regs.pwr());
    regs.rcc().ahb1enr.modify(|_, w| w.usb2otgen().set_bit());

    let otg = regs.otg_fs();
    if vbus_sense {
        pins::configure(regs, FS_VBUS, &PinConfig::input(Pull::None));
        otg.gccfg.modify(|_, w| w.vbden().set_bit());
    } else {
        override_b_session_valid(otg);
    }
    ringbuf_entry!(Trace::FullSpeed { vbus_sense });
}

/// Brings up the HS block (OTG1, root hub port 1) on an external ULPI PHY,
/// forced into device mode.
pub fn init_hs<R: Registers>(regs: &R, ulpi: &[PinSet]) {
    for &set in ulpi {
        pins::configure(regs, set, &ULPI_CONFIG);
    }

    let rcc = regs.rcc();
    rcc.ahb1enr.modify(|_, w| w.usb1ulpien().set_bit());
    rcc.ahb1enr.modify(|_, w| w.usb1otgen().set_bit());

    // VBUS sensing on this block isn't supported; the board config is
    // refused at build time if it asks for it.
    let otg = regs.otg_hs();
    override_b_session_valid(otg);

    otg.gusbcfg
        .modify(|_, w| w.fhmod().clear_bit().fdmod().set_bit());
    ringbuf_entry!(Trace::HighSpeed {
        ulpi_pins: ulpi.len() as u8
    });
}

/// Without a VBUS pin, tell the core the B-session is always valid.
fn override_b_session_valid(otg: &device::otg1_hs_global::RegisterBlock) {
    otg.gccfg.modify(|_, w| w.vbden().clear_bit());
    otg.gotgctl.modify(|_, w| w.bvaloen().set_bit());
    otg.gotgctl.modify(|_, w| w.bvaloval().set_bit());
}
