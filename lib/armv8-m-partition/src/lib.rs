// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Secure / Non-Secure partition setup for ARMv8-M parts with TrustZone.
//!
//! This programs, once, at boot, from the Secure side:
//!
//! - the Security Attribution Unit (SAU) address regions and control register,
//! - the sleep and exception-targeting bits in SCB->SCR and SCB->AIRCR,
//! - Non-Secure access to the floating point unit (SCB->NSACR, FPU->FPCCR),
//! - the NVIC Interrupt Target Non-Secure (ITNS) words.
//!
//! Everything is driven by a `const` [`PartitionConfig`]; each part gets a
//! module with its default (see [`stm32n657`]). Steps whose configuration is
//! `None` are skipped, leaving the reset value of the registers in place.
//! Every step is a plain register write, so running the setup twice yields
//! the same state.

#![cfg_attr(not(test), no_std)]

pub mod stm32n657;

use bitflags::bitflags;
use mmio::RegisterBus;
use ringbuf::{ringbuf, ringbuf_entry};

/// Number of SAU regions the setup knows how to program.
pub const SAU_REGIONS_MAX: usize = 8;

/// Register addresses in the System Control Space.
pub mod regs {
    pub const SCB_AIRCR: u32 = 0xE000_ED0C;
    pub const SCB_SCR: u32 = 0xE000_ED10;
    pub const SCB_NSACR: u32 = 0xE000_ED8C;

    pub const SAU_CTRL: u32 = 0xE000_EDD0;
    pub const SAU_RNR: u32 = 0xE000_EDD8;
    pub const SAU_RBAR: u32 = 0xE000_EDDC;
    pub const SAU_RLAR: u32 = 0xE000_EDE0;

    pub const FPU_FPCCR: u32 = 0xE000_EF34;

    /// NVIC_ITNS0; word `n` lives at `NVIC_ITNS + 4 * n`.
    pub const NVIC_ITNS: u32 = 0xE000_E380;

    pub const fn nvic_itns(word: usize) -> u32 {
        NVIC_ITNS + 4 * word as u32
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct SauCtrlBits: u32 {
        const ENABLE = 1 << 0;
        const ALLNS = 1 << 1;
    }

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct RlarBits: u32 {
        const ENABLE = 1 << 0;
        const NSC = 1 << 1;
    }

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct ScrBits: u32 {
        const SLEEPDEEPS = 1 << 3;
    }

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct AircrBits: u32 {
        const SYSRESETREQS = 1 << 3;
        const BFHFNMINS = 1 << 13;
        const PRIS = 1 << 14;
    }

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct NsacrBits: u32 {
        const CP10 = 1 << 10;
        const CP11 = 1 << 11;
    }

    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct FpccrBits: u32 {
        const TS = 1 << 26;
        const CLRONRETS = 1 << 27;
        const CLRONRET = 1 << 28;
    }
}

const SAU_RNR_REGION_MASK: u32 = 0xFF;
const SAU_ADDR_MASK: u32 = 0xFFFF_FFE0;
const AIRCR_VECTKEY_MASK: u32 = 0xFFFF_0000;
const AIRCR_VECTKEY: u32 = 0x05FA << 16;

/// What an SAU region marks its memory as. Memory not covered by any enabled
/// region is Secure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegionAttribute {
    NonSecure,
    /// Secure, and callable from the Non-Secure state through SG veneers.
    NonSecureCallable,
}

/// One SAU address region. Both bounds are inclusive; the SAU works at a
/// 32-byte granularity, so `start` must be 32-byte aligned and `end` must be
/// the last byte of a 32-byte block.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SauRegion {
    pub start: u32,
    pub end: u32,
    pub attribute: RegionAttribute,
}

impl SauRegion {
    /// Describes a region, checking its bounds. Used in a `const` this turns
    /// a bad region into a build failure.
    pub const fn new(start: u32, end: u32, attribute: RegionAttribute) -> Self {
        assert!(start & !SAU_ADDR_MASK == 0, "SAU region start not aligned");
        assert!(
            end & !SAU_ADDR_MASK == !SAU_ADDR_MASK,
            "SAU region end must be inclusive limit of a 32-byte block"
        );
        assert!(end >= start, "SAU region ends before it starts");
        Self {
            start,
            end,
            attribute,
        }
    }

    pub const fn non_secure(start: u32, end: u32) -> Self {
        Self::new(start, end, RegionAttribute::NonSecure)
    }

    pub const fn non_secure_callable(start: u32, end: u32) -> Self {
        Self::new(start, end, RegionAttribute::NonSecureCallable)
    }

    /// Value for SAU_RBAR.
    pub const fn rbar(&self) -> u32 {
        self.start & SAU_ADDR_MASK
    }

    /// Value for SAU_RLAR, with the region enabled.
    pub const fn rlar(&self) -> u32 {
        let nsc = match self.attribute {
            RegionAttribute::NonSecure => 0,
            RegionAttribute::NonSecureCallable => RlarBits::NSC.bits(),
        };
        (self.end & SAU_ADDR_MASK) | nsc | RlarBits::ENABLE.bits()
    }
}

/// Initial value for SAU->CTRL.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SauCtrl {
    pub enable: bool,
    /// When the SAU is disabled: `false` treats all memory as Secure, `true`
    /// as Non-Secure (the IDAU can still override the memory map).
    pub all_non_secure: bool,
}

impl SauCtrl {
    pub const fn bits(&self) -> u32 {
        let mut v = 0;
        if self.enable {
            v |= SauCtrlBits::ENABLE.bits();
        }
        if self.all_non_secure {
            v |= SauCtrlBits::ALLNS.bits();
        }
        v
    }
}

/// Sleep and exception handling behavior.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScbInit {
    /// SCR.SLEEPDEEPS: only the Secure state may control deep sleep.
    pub deep_sleep_secure_only: bool,
    /// AIRCR.SYSRESETREQS: only the Secure state may request a system reset.
    pub sys_reset_secure_only: bool,
    /// AIRCR.PRIS: Non-Secure exception priorities are lowered to 0x80-0xFF.
    pub lower_non_secure_priority: bool,
    /// AIRCR.BFHFNMINS: BusFault, HardFault and NMI target the Non-Secure
    /// state.
    pub faults_target_non_secure: bool,
}

impl ScbInit {
    /// Computes the new SCR from its current value.
    pub const fn scr(&self, current: u32) -> u32 {
        let v = current & !ScrBits::SLEEPDEEPS.bits();
        if self.deep_sleep_secure_only {
            v | ScrBits::SLEEPDEEPS.bits()
        } else {
            v
        }
    }

    /// Computes the new AIRCR from its current value, including the write
    /// key. Bits we don't manage are carried over.
    pub const fn aircr(&self, current: u32) -> u32 {
        let managed = AIRCR_VECTKEY_MASK
            | AircrBits::SYSRESETREQS.bits()
            | AircrBits::BFHFNMINS.bits()
            | AircrBits::PRIS.bits();
        let mut v = (current & !managed) | AIRCR_VECTKEY;
        if self.sys_reset_secure_only {
            v |= AircrBits::SYSRESETREQS.bits();
        }
        if self.lower_non_secure_priority {
            v |= AircrBits::PRIS.bits();
        }
        if self.faults_target_non_secure {
            v |= AircrBits::BFHFNMINS.bits();
        }
        v
    }
}

/// Access to coprocessors CP10/CP11 (the FPU) from the Non-Secure state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum FpuAccess {
    SecureOnly = 0b00,
    SecureAndNonSecure = 0b11,
}

/// Floating point unit behavior across security states.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FpuInit {
    pub access: FpuAccess,
    /// FPCCR.TS: treat floating point registers as Secure.
    pub treat_as_secure: bool,
    /// FPCCR.CLRONRETS: CLRONRET is writable from the Secure state only.
    pub clear_on_return_secure_only: bool,
    /// FPCCR.CLRONRET: clear caller-saved FP registers on exception return.
    pub clear_on_return: bool,
}

impl FpuInit {
    pub const fn nsacr(&self, current: u32) -> u32 {
        let mask = NsacrBits::CP10.bits() | NsacrBits::CP11.bits();
        (current & !mask) | (((self.access as u32) << 10) & mask)
    }

    pub const fn fpccr(&self, current: u32) -> u32 {
        let mask = FpccrBits::TS.bits()
            | FpccrBits::CLRONRETS.bits()
            | FpccrBits::CLRONRET.bits();
        let mut v = current & !mask;
        if self.treat_as_secure {
            v |= FpccrBits::TS.bits();
        }
        if self.clear_on_return_secure_only {
            v |= FpccrBits::CLRONRETS.bits();
        }
        if self.clear_on_return {
            v |= FpccrBits::CLRONRET.bits();
        }
        v
    }
}

/// Interrupt target bitmap builder: bit set means the interrupt targets the
/// Non-Secure state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InterruptTargets<const WORDS: usize> {
    words: [u32; WORDS],
}

impl<const WORDS: usize> InterruptTargets<WORDS> {
    /// Every interrupt targets the Secure state.
    pub const fn all_secure() -> Self {
        Self { words: [0; WORDS] }
    }

    /// Routes interrupt `irq` to the Non-Secure state.
    pub const fn non_secure(mut self, irq: u16) -> Self {
        let word = irq as usize / 32;
        assert!(word < WORDS, "interrupt number out of range");
        self.words[word] |= 1 << (irq % 32);
        self
    }

    pub const fn word(&self, n: usize) -> u32 {
        self.words[n]
    }

    /// Every word, each marked for initialization.
    pub const fn to_init(&self) -> [Option<u32>; WORDS] {
        let mut out = [None; WORDS];
        let mut i = 0;
        while i < WORDS {
            out[i] = Some(self.words[i]);
            i += 1;
        }
        out
    }
}

/// Properties of the core that decide which steps exist at all.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CoreFeatures {
    /// The SAU implements address regions.
    pub sau_regions: bool,
    /// An FPU is present and in use.
    pub fpu: bool,
}

/// Complete partition setup for a part with `ITNS_WORDS` ITNS registers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PartitionConfig<const ITNS_WORDS: usize> {
    pub core: CoreFeatures,
    pub sau_ctrl: Option<SauCtrl>,
    pub regions: [Option<SauRegion>; SAU_REGIONS_MAX],
    pub scb: Option<ScbInit>,
    pub fpu: Option<FpuInit>,
    pub itns: [Option<u32>; ITNS_WORDS],
}

impl<const ITNS_WORDS: usize> PartitionConfig<ITNS_WORDS> {
    /// Number of interrupt lines covered by the ITNS words.
    pub const INTERRUPT_LINES: usize = ITNS_WORDS * 32;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    Region { n: u8, rbar: u32, rlar: u32 },
    SauCtrl(u32),
    Scr(u32),
    Aircr(u32),
    Nsacr(u32),
    Fpccr(u32),
    Itns { word: u8, value: u32 },
}

ringbuf!(Trace, 32, Trace::None);

/// Programs the SAU, SCB, FPU and NVIC security registers from `config`,
/// through `bus`.
///
/// The order is fixed: SAU regions, SAU control, SCB, FPU, ITNS.
pub fn tz_sau_setup<B: RegisterBus, const N: usize>(
    bus: &B,
    config: &PartitionConfig<N>,
) {
    if config.core.sau_regions {
        for (n, region) in config.regions.iter().enumerate() {
            if let Some(region) = region {
                let (rbar, rlar) = (region.rbar(), region.rlar());
                bus.write(regs::SAU_RNR, n as u32 & SAU_RNR_REGION_MASK);
                bus.write(regs::SAU_RBAR, rbar);
                bus.write(regs::SAU_RLAR, rlar);
                ringbuf_entry!(Trace::Region {
                    n: n as u8,
                    rbar,
                    rlar
                });
            }
        }
    }

    if let Some(ctrl) = config.sau_ctrl {
        bus.write(regs::SAU_CTRL, ctrl.bits());
        ringbuf_entry!(Trace::SauCtrl(ctrl.bits()));
    }

    if let Some(scb) = config.scb {
        let scr = scb.scr(bus.read(regs::SCB_SCR));
        bus.write(regs::SCB_SCR, scr);
        ringbuf_entry!(Trace::Scr(scr));

        let aircr = scb.aircr(bus.read(regs::SCB_AIRCR));
        bus.write(regs::SCB_AIRCR, aircr);
        ringbuf_entry!(Trace::Aircr(aircr));
    }

    if let (true, Some(fpu)) = (config.core.fpu, config.fpu) {
        let nsacr = fpu.nsacr(bus.read(regs::SCB_NSACR));
        bus.write(regs::SCB_NSACR, nsacr);
        ringbuf_entry!(Trace::Nsacr(nsacr));

        let fpccr = fpu.fpccr(bus.read(regs::FPU_FPCCR));
        bus.write(regs::FPU_FPCCR, fpccr);
        ringbuf_entry!(Trace::Fpccr(fpccr));
    }

    for (word, value) in config.itns.iter().enumerate() {
        if let Some(value) = *value {
            bus.write(regs::nvic_itns(word), value);
            ringbuf_entry!(Trace::Itns {
                word: word as u8,
                value
            });
        }
    }
}

/// Applies `config` to the running core.
///
/// # Safety
///
/// Must be called from the Secure state, once, before the Non-Secure image
/// or any interrupt it owns is started.
#[cfg(target_arch = "arm")]
pub unsafe fn apply<const N: usize>(config: &PartitionConfig<N>) {
    // Safety: the addresses in `regs` are architectural System Control Space
    // registers, present on every ARMv8-M Mainline core with the Security
    // Extension.
    let bus = unsafe { mmio::Mmio::new() };

    cortex_m::asm::dsb();
    tz_sau_setup(&bus, config);
    // New attribution must be visible to subsequent accesses and instruction
    // fetches.
    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}
