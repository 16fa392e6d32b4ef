// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scratch-memory [`Registers`] for host tests.

use core::cell::{Cell, RefCell};

use cortex_m::peripheral::{nvic, scb, syst};
use drv_stm32xx_gpio_common::bank::AnyGpioPeriph;
use drv_stm32xx_gpio_common::Port;
use lib_usart::DeviceId;
use mmio::scratch_block;

use crate::device;
use crate::regs::Registers;

/// Which block a [`Registers`] accessor handed out.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Block {
    Rcc,
    Pwr,
    Dbgmcu,
    Gpio(Port),
    OtgFs,
    OtgHs,
    Usart(DeviceId),
    Syst,
    Scb,
    Nvic,
    Uid,
}

/// A GPIO port that records what's done to it.
#[derive(Default)]
pub struct FakePort {
    /// `(pins, atts)` for every `configure`, in order.
    pub configured: RefCell<Vec<(u16, u16)>>,
    /// The last value written to BSRR.
    pub bsrr: Cell<u32>,
    /// What `read` returns.
    pub idr: Cell<u16>,
}

impl AnyGpioPeriph for FakePort {
    fn configure(&self, pins: u16, atts: u16) {
        self.configured.borrow_mut().push((pins, atts));
    }

    fn set_reset(&self, set: u16, reset: u16) {
        self.bsrr.set((u32::from(reset) << 16) | u32::from(set));
    }

    fn read(&self) -> u16 {
        self.idr.get()
    }
}

pub struct FakeRegisters {
    pub rcc: &'static device::rcc::RegisterBlock,
    pub pwr: &'static device::pwr::RegisterBlock,
    pub dbgmcu: &'static device::dbgmcu::RegisterBlock,
    pub otg_fs: &'static device::otg1_hs_global::RegisterBlock,
    pub otg_hs: &'static device::otg1_hs_global::RegisterBlock,
    /// Shared by every USART id.
    pub usart: &'static device::usart1::RegisterBlock,
    pub syst: &'static syst::RegisterBlock,
    pub scb: &'static scb::RegisterBlock,
    pub nvic: &'static nvic::RegisterBlock,
    pub uid: [u32; 3],
    ports: [&'static FakePort; 11],
    log: RefCell<Vec<Block>>,
}

impl FakeRegisters {
    pub fn new() -> Self {
        Self {
            rcc: scratch_block(),
            pwr: scratch_block(),
            dbgmcu: scratch_block(),
            otg_fs: scratch_block(),
            otg_hs: scratch_block(),
            usart: scratch_block(),
            syst: scratch_block(),
            scb: scratch_block(),
            nvic: scratch_block(),
            uid: [0; 3],
            ports: core::array::from_fn(|_| {
                &*Box::leak(Box::<FakePort>::default())
            }),
            log: RefCell::new(Vec::new()),
        }
    }

    pub fn port(&self, port: Port) -> &'static FakePort {
        self.ports[port as usize]
    }

    /// Every block handed out so far, in order.
    pub fn accesses(&self) -> Vec<Block> {
        self.log.borrow().clone()
    }

    /// Position of the first access to `block`.
    pub fn first(&self, block: Block) -> usize {
        self.log
            .borrow()
            .iter()
            .position(|&b| b == block)
            .unwrap_or_else(|| panic!("{block:?} never accessed"))
    }

    pub fn touched(&self, block: Block) -> bool {
        self.log.borrow().contains(&block)
    }

    fn note(&self, block: Block) {
        self.log.borrow_mut().push(block);
    }
}

impl Registers for FakeRegisters {
    fn rcc(&self) -> &'static device::rcc::RegisterBlock {
        self.note(Block::Rcc);
        self.rcc
    }
    fn pwr(&self) -> &'static device::pwr::RegisterBlock {
        self.note(Block::Pwr);
        self.pwr
    }
    fn dbgmcu(&self) -> &'static device::dbgmcu::RegisterBlock {
        self.note(Block::Dbgmcu);
        self.dbgmcu
    }
    fn gpio(&self, port: Port) -> &'static dyn AnyGpioPeriph {
        self.note(Block::Gpio(port));
        self.port(port)
    }
    fn otg_fs(&self) -> &'static device::otg1_hs_global::RegisterBlock {
        self.note(Block::OtgFs);
        self.otg_fs
    }
    fn otg_hs(&self) -> &'static device::otg1_hs_global::RegisterBlock {
        self.note(Block::OtgHs);
        self.otg_hs
    }
    fn usart(&self, id: DeviceId) -> &'static device::usart1::RegisterBlock {
        self.note(Block::Usart(id));
        self.usart
    }
    fn syst(&self) -> &'static syst::RegisterBlock {
        self.note(Block::Syst);
        self.syst
    }
    fn scb(&self) -> &'static scb::RegisterBlock {
        self.note(Block::Scb);
        self.scb
    }
    fn nvic(&self) -> &'static nvic::RegisterBlock {
        self.note(Block::Nvic);
        self.nvic
    }
    fn uid(&self) -> [u32; 3] {
        self.note(Block::Uid);
        self.uid
    }
}
