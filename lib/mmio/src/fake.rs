// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use core::cell::{RefCell, UnsafeCell};
use core::mem::{align_of, size_of};

use crate::RegisterBus;

const MAX_REGS: usize = 64;
const MAX_WRITES: usize = 512;

/// A register bus backed by a small table of values, which records every
/// write in order.
///
/// Registers that were never preset or written read as zero.
#[derive(Default)]
pub struct FakeBus {
    regs: RefCell<heapless::Vec<(u32, u32), MAX_REGS>>,
    writes: RefCell<heapless::Vec<(u32, u32), MAX_WRITES>>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presets the register at `addr` to `value` without logging a write.
    pub fn with(self, addr: u32, value: u32) -> Self {
        self.store(addr, value);
        self
    }

    /// Current value of the register at `addr`.
    pub fn value(&self, addr: u32) -> u32 {
        self.regs
            .borrow()
            .iter()
            .find(|(a, _)| *a == addr)
            .map(|&(_, v)| v)
            .unwrap_or(0)
    }

    /// Every write so far, oldest first, as `(addr, value)`.
    pub fn writes(&self) -> heapless::Vec<(u32, u32), MAX_WRITES> {
        self.writes.borrow().clone()
    }

    /// Number of writes so far that targeted `addr`.
    pub fn writes_to(&self, addr: u32) -> usize {
        self.writes.borrow().iter().filter(|(a, _)| *a == addr).count()
    }

    fn store(&self, addr: u32, value: u32) {
        let mut regs = self.regs.borrow_mut();
        if let Some(slot) = regs.iter_mut().find(|(a, _)| *a == addr) {
            slot.1 = value;
        } else if regs.push((addr, value)).is_err() {
            panic!("fake bus out of register slots");
        }
    }
}

impl RegisterBus for FakeBus {
    fn read(&self, addr: u32) -> u32 {
        self.value(addr)
    }

    fn write(&self, addr: u32, value: u32) {
        self.store(addr, value);
        if self.writes.borrow_mut().push((addr, value)).is_err() {
            panic!("fake bus write log full");
        }
    }
}

/// Returns a zeroed, leaked block of host memory viewed as a `T`, for
/// exercising code written against a PAC (or `cortex_m`) register block.
///
/// Only register blocks are meaningful here: every field of `T` must accept
/// all-zeroes, and access must go through interior mutability, as it does
/// for `vcell`/`volatile-register` cells.
pub fn scratch_block<T>() -> &'static T {
    assert!(align_of::<T>() <= align_of::<u32>());
    let words = size_of::<T>().div_ceil(size_of::<u32>()).max(1);
    let mem: &'static [UnsafeCell<u32>] = Vec::from_iter(
        (0..words).map(|_| UnsafeCell::new(0u32)),
    )
    .leak();
    // Safety: the memory is zeroed, big enough, aligned for `T`, never
    // freed, and only reachable through `T`'s cells from here on.
    unsafe { &*mem.as_ptr().cast::<T>() }
}

/// Reads the 32-bit register `reg` directly, whatever the PAC allows.
pub fn peek<R>(reg: &R) -> u32 {
    assert!(size_of::<R>() == size_of::<u32>());
    // Safety: `reg` is a 32-bit register cell, checked just above.
    unsafe { core::ptr::read_volatile((reg as *const R).cast::<u32>()) }
}

/// Sets the 32-bit register `reg` directly, including registers the PAC
/// only lets you read, to stand in for hardware state.
#[allow(invalid_reference_casting)]
pub fn poke<R>(reg: &R, value: u32) {
    assert!(size_of::<R>() == size_of::<u32>());
    // Safety: as in `peek`; register cells are interior-mutable.
    unsafe {
        core::ptr::write_volatile((reg as *const R).cast_mut().cast::<u32>(), value)
    }
}
