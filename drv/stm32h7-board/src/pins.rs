// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GPIO bank clocks, the board pin table, and active-level pin access.

use drv_stm32xx_gpio_common::bank::configure_pins;
use drv_stm32xx_gpio_common::{Level, PinConfig, PinSet};

use crate::config::BoardPin;
use crate::device;
use crate::regs::Registers;

/// Turns on the clocks of every GPIO bank.
pub fn enable_gpio_clocks(rcc: &device::rcc::RegisterBlock) {
    // GPIOK has no pins on most packages, and the vendor bring-up stops at
    // GPIOJ, but enabling its clock costs nothing and lets a pin table name
    // it.
    rcc.ahb4enr.modify(|_, w| {
        w.gpioaen()
            .set_bit()
            .gpioben()
            .set_bit()
            .gpiocen()
            .set_bit()
            .gpioden()
            .set_bit()
            .gpioeen()
            .set_bit()
            .gpiofen()
            .set_bit()
            .gpiogen()
            .set_bit()
            .gpiohen()
            .set_bit()
            .gpioien()
            .set_bit()
            .gpiojen()
            .set_bit()
            .gpioken()
            .set_bit()
    });
    // The enable has to land before the first GPIO access.
    let _ = rcc.ahb4enr.read().bits();
}

/// Applies `config` to `pins`.
pub fn configure<R: Registers>(regs: &R, pins: PinSet, config: &PinConfig) {
    configure_pins(regs.gpio(pins.port), pins, config);
}

/// Configures every pin in `table`, in order.
pub fn apply_table<R: Registers>(regs: &R, table: &[BoardPin]) {
    for pin in table {
        configure(regs, pin.pins, &pin.config);
    }
}

/// The level that represents `on` for `pin`.
fn level_for(pin: &BoardPin, on: bool) -> Level {
    match (pin.active, on) {
        (Level::High, true) | (Level::Low, false) => Level::High,
        (Level::High, false) | (Level::Low, true) => Level::Low,
    }
}

/// Drives `pin` to its active level if `on`, and to the other level if not.
pub fn drive<R: Registers>(regs: &R, pin: &BoardPin, on: bool) {
    regs.gpio(pin.pins.port)
        .write(pin.pins.pin_mask, level_for(pin, on));
}

/// Whether `pin` currently reads as its active level.
pub fn is_active<R: Registers>(regs: &R, pin: &BoardPin) -> bool {
    let high = regs.gpio(pin.pins.port).read() & pin.pins.pin_mask != 0;
    high == (pin.active == Level::High)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Block, FakeRegisters};
    use drv_stm32xx_gpio_common::{OutputType, Port, Pull, Speed};

    fn led(active: Level) -> BoardPin {
        BoardPin {
            name: "led",
            pins: Port::B.pin(0),
            config: PinConfig::output(OutputType::PushPull, Speed::Low, Pull::None),
            active,
        }
    }

    fn button(active: Level) -> BoardPin {
        BoardPin {
            name: "button",
            pins: Port::C.pin(13),
            config: PinConfig::input(Pull::Down),
            active,
        }
    }

    #[test]
    fn gpio_clocks_are_a_through_k() {
        let regs = FakeRegisters::new();
        // BKPRAMEN, left on by someone else.
        regs.rcc.ahb4enr.write(|w| unsafe { w.bits(1 << 28) });
        enable_gpio_clocks(regs.rcc);
        assert_eq!(regs.rcc.ahb4enr.read().bits(), (1 << 28) | 0x7FF);
    }

    #[test]
    fn table_is_applied_in_order() {
        let regs = FakeRegisters::new();
        apply_table(&regs, &[button(Level::High), led(Level::High)]);

        assert!(regs.first(Block::Gpio(Port::C)) < regs.first(Block::Gpio(Port::B)));
        assert_eq!(
            *regs.port(Port::B).configured.borrow(),
            [(1, led(Level::High).config.encode())]
        );
        assert_eq!(
            *regs.port(Port::C).configured.borrow(),
            [(1 << 13, button(Level::High).config.encode())]
        );
    }

    #[test]
    fn led_polarity() {
        let regs = FakeRegisters::new();
        let bsrr = &regs.port(Port::B).bsrr;

        drive(&regs, &led(Level::High), true);
        assert_eq!(bsrr.get(), 1);
        drive(&regs, &led(Level::High), false);
        assert_eq!(bsrr.get(), 1 << 16);

        // Active-low LED: on means driving low.
        drive(&regs, &led(Level::Low), true);
        assert_eq!(bsrr.get(), 1 << 16);
        drive(&regs, &led(Level::Low), false);
        assert_eq!(bsrr.get(), 1);
    }

    #[test]
    fn button_polarity() {
        let regs = FakeRegisters::new();
        let idr = &regs.port(Port::C).idr;

        idr.set(1 << 13);
        assert!(is_active(&regs, &button(Level::High)));
        assert!(!is_active(&regs, &button(Level::Low)));

        idr.set(!(1 << 13));
        assert!(!is_active(&regs, &button(Level::High)));
        assert!(is_active(&regs, &button(Level::Low)));
    }
}
