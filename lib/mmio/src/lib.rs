// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Word-wide access to memory-mapped registers by absolute address.
//!
//! This is for the ARMv8-M security registers (SAU, NVIC_ITNS, and the
//! Secure views of SCB and FPU), which we program by address the same way
//! on every part rather than through a per-part PAC. Everything goes through
//! [`RegisterBus`] so the sequence can run against the real bus ([`Mmio`]) or,
//! on the host, against a recording fake (`FakeBus`, behind the `fake`
//! feature).
//!
//! The `fake` feature also provides [`scratch_block`], which stands zeroed
//! host memory in for a PAC register block, for testing code that goes
//! through the PACs.

#![cfg_attr(not(any(test, feature = "fake")), no_std)]

#[cfg(any(test, feature = "fake"))]
mod fake;

#[cfg(any(test, feature = "fake"))]
pub use fake::{peek, poke, scratch_block, FakeBus};

/// Something that can read and write 32-bit registers by address.
pub trait RegisterBus {
    fn read(&self, addr: u32) -> u32;
    fn write(&self, addr: u32, value: u32);

    /// Read-modify-write of the register at `addr`.
    fn modify(&self, addr: u32, f: impl FnOnce(u32) -> u32)
    where
        Self: Sized,
    {
        let v = self.read(addr);
        self.write(addr, f(v));
    }

    /// Sets the bits in `mask`, preserving all others.
    fn set_bits(&self, addr: u32, mask: u32)
    where
        Self: Sized,
    {
        self.modify(addr, |v| v | mask);
    }

    /// Clears the bits in `mask`, preserving all others.
    fn clear_bits(&self, addr: u32, mask: u32)
    where
        Self: Sized,
    {
        self.modify(addr, |v| v & !mask);
    }

    /// Replaces the bits under `mask` with the corresponding bits of `value`.
    fn update_field(&self, addr: u32, mask: u32, value: u32)
    where
        Self: Sized,
    {
        self.modify(addr, |v| (v & !mask) | (value & mask));
    }
}

/// The real memory bus.
#[derive(Clone, Copy)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// Produces a handle to the memory bus.
    ///
    /// # Safety
    ///
    /// Every address later passed to `read` or `write` must be a valid,
    /// word-aligned register address on the running part, and the caller must
    /// not race other code that owns the same registers (in practice: only
    /// use this from single-threaded boot code).
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterBus for Mmio {
    #[inline(always)]
    fn read(&self, addr: u32) -> u32 {
        // Safety: address validity is the contract of `Mmio::new`.
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    #[inline(always)]
    fn write(&self, addr: u32, value: u32) {
        // Safety: address validity is the contract of `Mmio::new`.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}

impl<B: RegisterBus> RegisterBus for &B {
    fn read(&self, addr: u32) -> u32 {
        (**self).read(addr)
    }

    fn write(&self, addr: u32, value: u32) {
        (**self).write(addr, value)
    }
}
