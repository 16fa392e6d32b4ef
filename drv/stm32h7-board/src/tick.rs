// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The millisecond tick, or its hand-off to an RTOS.

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m::peripheral::{nvic, scb, syst};

use crate::device::{Interrupt, NVIC_PRIO_BITS};

/// Milliseconds since the tick started. Written only by [`on_systick`].
static MILLIS: AtomicU32 = AtomicU32::new(0);

/// SysTick's slot in SHPR1..3; exceptions 4..15 map to bytes 0..11.
const SYSTICK_SHPR: usize = 11;

const CSR_ENABLE: u32 = 1 << 0;
const CSR_TICKINT: u32 = 1 << 1;
const CSR_CLKSOURCE: u32 = 1 << 2;

/// Counts one tick. Call from the SysTick handler.
pub fn on_systick() {
    MILLIS.fetch_add(1, Ordering::Relaxed);
}

pub fn millis() -> u32 {
    MILLIS.load(Ordering::Relaxed)
}

/// Starts SysTick from the core clock, interrupting every millisecond at the
/// lowest priority.
pub fn start_systick(
    syst: &syst::RegisterBlock,
    scb: &scb::RegisterBlock,
    core_hz: u32,
) {
    // Safety: SysTick and its priority byte are ours until the tick runs,
    // and these values are valid for the fields they land in.
    unsafe {
        syst.rvr.write(core_hz / 1000 - 1);
        scb.shpr[SYSTICK_SHPR].write(encode_priority(lowest_priority()));
        syst.cvr.write(0);
        syst.csr.write(CSR_CLKSOURCE | CSR_TICKINT | CSR_ENABLE);
    }
}

/// Leaves SysTick to the RTOS: keeps it stopped so its handler can't run
/// before the scheduler does, and drops the USB interrupts to the highest
/// priority that may still make RTOS calls.
pub fn hand_to_rtos(
    syst: &syst::RegisterBlock,
    nvic: &nvic::RegisterBlock,
    max_syscall_priority: u8,
) {
    // Safety: clearing ENABLE only stops the counter.
    unsafe {
        syst.csr.modify(|v| v & !CSR_ENABLE);
    }
    set_irq_priority(nvic, Interrupt::OTG_FS, max_syscall_priority);
    set_irq_priority(nvic, Interrupt::OTG_HS, max_syscall_priority);
}

const fn lowest_priority() -> u8 {
    (1 << NVIC_PRIO_BITS) - 1
}

/// Sets an external interrupt's priority. `priority` is in NVIC levels
/// (0..15), not the raw register byte.
pub fn set_irq_priority(
    nvic: &nvic::RegisterBlock,
    irq: Interrupt,
    priority: u8,
) {
    // Safety: any byte is a valid priority; the unimplemented low bits read
    // as zero.
    unsafe {
        nvic.ipr[irq as usize].write(encode_priority(priority));
    }
}

fn encode_priority(priority: u8) -> u8 {
    priority << (8 - NVIC_PRIO_BITS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmio::scratch_block;

    #[test]
    fn systick_at_one_khz() {
        let syst: &syst::RegisterBlock = scratch_block();
        let scb: &scb::RegisterBlock = scratch_block();
        unsafe { scb.shpr[10].write(0x12) };

        start_systick(syst, scb, 400_000_000);

        assert_eq!(syst.rvr.read(), 399_999);
        assert_eq!(scb.shpr[SYSTICK_SHPR].read(), 0xF0);
        // PendSV's byte is left alone.
        assert_eq!(scb.shpr[10].read(), 0x12);
        assert_eq!(syst.cvr.read(), 0);
        assert_eq!(syst.csr.read(), 0b111);
    }

    #[test]
    fn rtos_mode_stops_systick_and_sets_usb_priorities() {
        let syst: &syst::RegisterBlock = scratch_block();
        let nvic: &nvic::RegisterBlock = scratch_block();
        unsafe { syst.csr.write(0b111) };

        hand_to_rtos(syst, nvic, 5);

        assert_eq!(syst.csr.read(), 0b110);
        assert_eq!(nvic.ipr[77].read(), 0x50);
        assert_eq!(nvic.ipr[101].read(), 0x50);
        // Neighbours untouched.
        assert_eq!(nvic.ipr[76].read(), 0);
        assert_eq!(nvic.ipr[102].read(), 0);
    }

    #[test]
    fn counter_advances() {
        let before = millis();
        on_systick();
        on_systick();
        assert!(millis().wrapping_sub(before) >= 2);
    }
}
