// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The register blocks bring-up touches.
//!
//! Bring-up reaches every block through [`Registers`], so the same sequence
//! runs on the part ([`OnChip`]) and, in tests, against scratch memory.

use cortex_m::peripheral::{nvic, scb, syst, NVIC, SCB, SYST};
use drv_stm32xx_gpio_common::bank::{get_gpio_regs, AnyGpioPeriph};
use drv_stm32xx_gpio_common::Port;
use lib_usart::DeviceId;

use crate::device;

pub trait Registers {
    fn rcc(&self) -> &'static device::rcc::RegisterBlock;
    fn pwr(&self) -> &'static device::pwr::RegisterBlock;
    fn dbgmcu(&self) -> &'static device::dbgmcu::RegisterBlock;
    fn gpio(&self, port: Port) -> &'static dyn AnyGpioPeriph;
    /// OTG2, the FS-only block, which the USB stack calls root hub port 0.
    fn otg_fs(&self) -> &'static device::otg1_hs_global::RegisterBlock;
    /// OTG1, the HS-capable block, which the USB stack calls root hub port 1.
    fn otg_hs(&self) -> &'static device::otg1_hs_global::RegisterBlock;
    fn usart(&self, id: DeviceId) -> &'static device::usart1::RegisterBlock;
    fn syst(&self) -> &'static syst::RegisterBlock;
    fn scb(&self) -> &'static scb::RegisterBlock;
    fn nvic(&self) -> &'static nvic::RegisterBlock;
    /// The three words of the device's unique ID.
    fn uid(&self) -> [u32; 3];
}

impl<R: Registers> Registers for &R {
    fn rcc(&self) -> &'static device::rcc::RegisterBlock {
        (**self).rcc()
    }
    fn pwr(&self) -> &'static device::pwr::RegisterBlock {
        (**self).pwr()
    }
    fn dbgmcu(&self) -> &'static device::dbgmcu::RegisterBlock {
        (**self).dbgmcu()
    }
    fn gpio(&self, port: Port) -> &'static dyn AnyGpioPeriph {
        (**self).gpio(port)
    }
    fn otg_fs(&self) -> &'static device::otg1_hs_global::RegisterBlock {
        (**self).otg_fs()
    }
    fn otg_hs(&self) -> &'static device::otg1_hs_global::RegisterBlock {
        (**self).otg_hs()
    }
    fn usart(&self, id: DeviceId) -> &'static device::usart1::RegisterBlock {
        (**self).usart(id)
    }
    fn syst(&self) -> &'static syst::RegisterBlock {
        (**self).syst()
    }
    fn scb(&self) -> &'static scb::RegisterBlock {
        (**self).scb()
    }
    fn nvic(&self) -> &'static nvic::RegisterBlock {
        (**self).nvic()
    }
    fn uid(&self) -> [u32; 3] {
        (**self).uid()
    }
}

/// The running part's own registers.
pub struct OnChip {
    _private: (),
}

impl OnChip {
    /// # Safety
    ///
    /// Only for use on the STM32H7 model selected by this crate's features,
    /// by code that may treat every block in [`Registers`] as its own (in
    /// practice, single-threaded boot code).
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

// Safety, for every block below: the pointers come from the PAC for the part
// we're running on, the blocks are always mapped, and we only ever reach
// them through `&` references, so aliasing isn't a concern.
impl Registers for OnChip {
    fn rcc(&self) -> &'static device::rcc::RegisterBlock {
        unsafe { &*device::RCC::ptr() }
    }
    fn pwr(&self) -> &'static device::pwr::RegisterBlock {
        unsafe { &*device::PWR::ptr() }
    }
    fn dbgmcu(&self) -> &'static device::dbgmcu::RegisterBlock {
        unsafe { &*device::DBGMCU::ptr() }
    }
    fn gpio(&self, port: Port) -> &'static dyn AnyGpioPeriph {
        unsafe { get_gpio_regs(port) }
    }
    fn otg_fs(&self) -> &'static device::otg1_hs_global::RegisterBlock {
        unsafe { &*device::OTG2_HS_GLOBAL::ptr() }
    }
    fn otg_hs(&self) -> &'static device::otg1_hs_global::RegisterBlock {
        unsafe { &*device::OTG1_HS_GLOBAL::ptr() }
    }
    fn usart(&self, id: DeviceId) -> &'static device::usart1::RegisterBlock {
        unsafe { &*id.ptr() }
    }
    fn syst(&self) -> &'static syst::RegisterBlock {
        unsafe { &*SYST::PTR }
    }
    fn scb(&self) -> &'static scb::RegisterBlock {
        unsafe { &*SCB::PTR }
    }
    fn nvic(&self) -> &'static nvic::RegisterBlock {
        unsafe { &*NVIC::PTR }
    }
    fn uid(&self) -> [u32; 3] {
        drv_stm32xx_uid::read_uid()
    }
}
