// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Early system setup for STM32H743/753: caches, supply voltage, PLL1, bus
//! dividers, flash wait states, and the system clock switch.
//!
//! Board crates describe their clock tree with a [`ClockConfig`] and call
//! [`system_init`] once, before touching any other peripheral.

#![no_std]

use ringbuf::{ringbuf, ringbuf_entry};

#[cfg(feature = "h743")]
pub use stm32h7::stm32h743 as device;

#[cfg(feature = "h753")]
pub use stm32h7::stm32h753 as device;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    SupplyLocked,
    VoltageReady,
    HseReady,
    PllLocked,
    FlashLatency(u8),
    SysclkSwitched,
    Hsi48Ready,
}

ringbuf!(Trace, 16, Trace::None);

/// Clock tree settings. The dividers are programmed as given; nothing here
/// is derived or checked, so `cpu_hz` and `pclk*_hz` must agree with them.
pub struct ClockConfig {
    pub source: ClockSource,
    pub divm: u8,
    pub vcosel: device::rcc::pllcfgr::PLL1VCOSEL_A,
    pub pllrange: device::rcc::pllcfgr::PLL1RGE_A,
    pub divn: u16,
    pub divp: device::rcc::pll1divr::DIVP1_A,
    pub divq: u8,
    pub divr: u8,
    pub cpu_div: device::rcc::d1cfgr::D1CPRE_A,
    pub ahb_div: device::rcc::d1cfgr::HPRE_A,
    pub apb1_div: device::rcc::d2cfgr::D2PPRE1_A,
    pub apb2_div: device::rcc::d2cfgr::D2PPRE2_A,
    pub apb3_div: device::rcc::d1cfgr::D1PPRE_A,
    pub apb4_div: device::rcc::d3cfgr::D3PPRE_A,
    pub flash_latency: u8,
    pub flash_write_delay: u8,
    /// Resulting CPU (and SysTick) frequency.
    pub cpu_hz: u32,
    /// Resulting APB1 clock, which feeds USART2/3, UART4/5/7/8.
    pub pclk1_hz: u32,
    /// Resulting APB2 clock, which feeds USART1/6.
    pub pclk2_hz: u32,
}

pub enum ClockSource {
    ExternalCrystal,
    Hsi64,
}

/// Core and device peripherals, handed back once the clocks are running.
pub struct Peripherals {
    pub core: cortex_m::Peripherals,
    pub device: device::Peripherals,
}

/// Takes the peripherals and runs [`system_init_custom`].
///
/// # Panics
///
/// If either peripheral set has already been taken.
pub fn system_init(config: &ClockConfig) -> Peripherals {
    let cp = cortex_m::Peripherals::take().unwrap();
    let p = device::Peripherals::take().unwrap();

    system_init_custom(cp, p, config)
}

pub fn system_init_custom(
    mut cp: cortex_m::Peripherals,
    p: device::Peripherals,
    config: &ClockConfig,
) -> Peripherals {
    // We are running at 64MHz on the HSI oscillator at voltage scale VOS3.
    //
    // Turn on CPU I/D caches first; everything after this runs out of flash
    // and benefits immediately.
    cp.SCB.enable_icache();
    cp.SCB.enable_dcache(&mut cp.CPUID);

    lock_supply(&p);
    raise_voltage(&p);
    start_pll1(&p, config);
    set_bus_dividers(&p, config);
    set_flash_latency(&p, config);

    // Nothing is overclocked at this point. Switch.
    p.RCC.cfgr.write(|w| w.sw().pll1());
    while !p.RCC.cfgr.read().sws().is_pll1() {
        // spin
    }
    ringbuf_entry!(Trace::SysclkSwitched);

    start_hsi48(&p);

    Peripherals {
        core: cp,
        device: p,
    }
}

/// PWR.CR3 is write-once after reset. The reset value (LDO supply) is what
/// we want, so write it back to itself to lock it.
fn lock_supply(p: &device::Peripherals) {
    p.PWR.cr3.modify(|_, w| w);
    while !p.PWR.csr1.read().actvosrdy().bit() {
        // spin
    }
    ringbuf_entry!(Trace::SupplyLocked);
}

/// Hops directly from VOS3 to VOS1, the level required for 400MHz.
fn raise_voltage(p: &device::Peripherals) {
    p.PWR.d3cr.write(|w| unsafe { w.vos().bits(0b11) });
    while !p.PWR.d3cr.read().vosrdy().bit() {
        // spin
    }
    ringbuf_entry!(Trace::VoltageReady);
}

fn start_pll1(p: &device::Peripherals, config: &ClockConfig) {
    match config.source {
        ClockSource::ExternalCrystal => {
            p.RCC.cr.modify(|_, w| w.hseon().set_bit());
            while !p.RCC.cr.read().hserdy().bit() {
                // spin
            }
            ringbuf_entry!(Trace::HseReady);

            // DIVM brings the crystal down into the 2-16MHz VCO input range.
            p.RCC
                .pllckselr
                .modify(|_, w| w.divm1().bits(config.divm).pllsrc().hse());
        }
        ClockSource::Hsi64 => {
            p.RCC
                .pllckselr
                .write(|w| w.pllsrc().hsi().divm1().bits(config.divm));
        }
    }

    // P feeds the system clock, Q the peripheral kernel clocks, and R the
    // trace unit.
    p.RCC.pllcfgr.write(|w| {
        w.pll1vcosel()
            .variant(config.vcosel)
            .pll1rge()
            .variant(config.pllrange)
            .divp1en()
            .enabled()
            .divq1en()
            .enabled()
            .divr1en()
            .enabled()
    });
    p.RCC.pll1divr.write(|w| unsafe {
        w.divn1()
            .bits(config.divn)
            .divp1()
            .variant(config.divp)
            .divq1()
            .bits(config.divq)
            .divr1()
            .bits(config.divr)
    });

    p.RCC.cr.modify(|_, w| w.pll1on().on());
    while !p.RCC.cr.read().pll1rdy().bit() {
        // spin
    }
    ringbuf_entry!(Trace::PllLocked);
}

/// Programs the bus dividers before the switch, so no bus is ever clocked
/// above its limit.
fn set_bus_dividers(p: &device::Peripherals, config: &ClockConfig) {
    p.RCC.d1cfgr.write(|w| {
        w.d1cpre()
            .variant(config.cpu_div)
            .hpre()
            .variant(config.ahb_div)
            .d1ppre()
            .variant(config.apb3_div)
    });
    p.RCC.d2cfgr.write(|w| {
        w.d2ppre1()
            .variant(config.apb1_div)
            .d2ppre2()
            .variant(config.apb2_div)
    });
    p.RCC.d3cfgr.write(|w| w.d3ppre().variant(config.apb4_div));
}

fn set_flash_latency(p: &device::Peripherals, config: &ClockConfig) {
    p.FLASH.acr.write(|w| unsafe {
        w.latency()
            .bits(config.flash_latency)
            .wrhighfreq()
            .bits(config.flash_write_delay)
    });
    loop {
        let r = p.FLASH.acr.read();
        if r.latency().bits() == config.flash_latency
            && r.wrhighfreq().bits() == config.flash_write_delay
        {
            break;
        }
    }
    // The new wait states must be in effect before the clock goes up.
    cortex_m::asm::dmb();
    ringbuf_entry!(Trace::FlashLatency(config.flash_latency));
}

/// USB needs an exact 48MHz kernel clock, which PLL1Q can't give us from a
/// 400MHz VCO. HSI48 can.
fn start_hsi48(p: &device::Peripherals) {
    p.RCC.cr.modify(|_, w| w.hsi48on().set_bit());
    while !p.RCC.cr.read().hsi48rdy().bit() {
        // spin
    }
    p.RCC.d2ccip2r.modify(|_, w| w.usbsel().hsi48());
    ringbuf_entry!(Trace::Hsi48Ready);
}
