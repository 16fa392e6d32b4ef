// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ETM trace port on PE2..PE6 (TRACECLK, TRACED0..3).

use drv_stm32xx_gpio_common::{
    Alternate, OutputType, PinConfig, PinSet, Port, Pull, Speed,
};

use crate::pins;
use crate::regs::Registers;

const TRACE_PINS: PinSet = Port::E.pins([2, 3, 4, 5, 6]);

const TRACE_CONFIG: PinConfig = PinConfig::alternate(
    Alternate::AF0,
    OutputType::PushPull,
    Speed::VeryHigh,
    Pull::Up,
);

/// Routes the trace port to its pins and clocks it, including in the D1 and
/// D3 domains.
pub fn enable_etm<R: Registers>(regs: &R) {
    pins::configure(regs, TRACE_PINS, &TRACE_CONFIG);
    regs.dbgmcu().cr.modify(|_, w| {
        w.traceclken()
            .set_bit()
            .d1dbgcken()
            .set_bit()
            .d3dbgcken()
            .set_bit()
    });
}
