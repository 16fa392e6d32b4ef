// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Board smoke test: blinks the LED, faster while the button is held, and
//! prints a line on the console UART every blink.

#![no_std]
#![no_main]

extern crate panic_halt; // halts on panic; break on `rust_begin_unwind`

cfg_if::cfg_if! {
    if #[cfg(feature = "h743")] {
        use stm32h7::stm32h743 as device;
    } else if #[cfg(feature = "h753")] {
        use stm32h7::stm32h753 as device;
    } else {
        compile_error!("enable one of the h743 or h753 features");
    }
}

use cortex_m_rt::{entry, exception, ExceptionFrame};
use device::interrupt;
use drv_stm32h7_board::{board_init, Hooks, BOARD};
use drv_stm32h7_startup::{ClockConfig, ClockSource};

/// The Nucleo board doesn't include an external crystal, so we derive clocks
/// from the HSI64 oscillator.
const CLOCKS: ClockConfig = ClockConfig {
    source: ClockSource::Hsi64,
    // 64MHz is outside the VCO input range of 2-16MHz; divide by 4 to 16MHz.
    divm: 4,
    // This means the VCO must accept its wider input range:
    vcosel: device::rcc::pllcfgr::PLL1VCOSEL_A::WIDEVCO,
    pllrange: device::rcc::pllcfgr::PLL1RGE_A::RANGE8,
    // 50x for an 800MHz intermediate frequency. The PLL adds one to what we
    // write.
    divn: 50 - 1,
    // 400MHz system clock.
    divp: device::rcc::pll1divr::DIVP1_A::DIV2,
    // 200MHz kernel clocks.
    divq: 4 - 1,
    // R feeds the trace unit; leave it fast.
    divr: 2 - 1,

    cpu_div: device::rcc::d1cfgr::D1CPRE_A::DIV1,
    // AHB at 200MHz, every APB at 100MHz.
    ahb_div: device::rcc::d1cfgr::HPRE_A::DIV2,
    apb1_div: device::rcc::d2cfgr::D2PPRE1_A::DIV2,
    apb2_div: device::rcc::d2cfgr::D2PPRE2_A::DIV2,
    apb3_div: device::rcc::d1cfgr::D1PPRE_A::DIV2,
    apb4_div: device::rcc::d3cfgr::D3PPRE_A::DIV2,

    // Flash runs at 200MHz: 2WS, 2 programming cycles. See reference manual
    // Table 13.
    flash_latency: 2,
    flash_write_delay: 2,

    cpu_hz: 400_000_000,
    pclk1_hz: 100_000_000,
    pclk2_hz: 100_000_000,
};

const BLINK_MS: u32 = 500;
const BLINK_PRESSED_MS: u32 = 100;

#[entry]
fn main() -> ! {
    let board = board_init(&CLOCKS, &BOARD, &Hooks::NONE);

    let mut led = false;
    let mut last = board.millis();
    loop {
        let interval = if board.button_read() != 0 {
            BLINK_PRESSED_MS
        } else {
            BLINK_MS
        };

        let now = board.millis();
        if now.wrapping_sub(last) >= interval {
            last = now;
            led = !led;
            board.led_write(led);
            let msg: &[u8] = if led { b"on\r\n" } else { b"off\r\n" };
            // A board without a console still blinks.
            let _ = board.uart_write(msg);
        }
    }
}

#[exception]
fn SysTick() {
    drv_stm32h7_board::on_systick();
}

#[interrupt]
fn OTG_FS() {
    drv_stm32h7_board::irq::on_otg_fs();
}

#[interrupt]
fn OTG_HS() {
    drv_stm32h7_board::irq::on_otg_hs();
}

#[exception]
unsafe fn HardFault(_frame: &ExceptionFrame) -> ! {
    cortex_m::asm::bkpt();
    loop {
        cortex_m::asm::nop();
    }
}
