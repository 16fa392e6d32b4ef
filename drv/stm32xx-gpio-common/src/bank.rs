// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Register-level access to the GPIO ports.

use crate::{Level, PinConfig, PinSet, Port};

// Every PAC carries its own copy of the register access types, so which one
// we name depends on the part.
cfg_if::cfg_if! {
    if #[cfg(feature = "family-stm32h7")] {
        use stm32h7 as pac;
        cfg_if::cfg_if! {
            if #[cfg(feature = "model-stm32h743")] {
                use pac::stm32h743 as device;
            } else if #[cfg(feature = "model-stm32h753")] {
                use pac::stm32h753 as device;
            } else {
                compile_error!("unsupported or missing SoC model feature");
            }
        }
    } else {
        compile_error!("unsupported or missing SoC family feature");
    }
}

/// Returns the register block of `port`, behind `&dyn AnyGpioPeriph` because
/// the PAC gives some ports types of their own.
///
/// # Safety
///
/// The caller must be running on the part the PAC describes, and must not
/// share the port with code that assumes it has exclusive ownership (such as
/// an Embedded HAL pin).
pub unsafe fn get_gpio_regs(port: Port) -> &'static dyn AnyGpioPeriph {
    match port {
        Port::A => &*device::GPIOA::ptr(),
        Port::B => &*device::GPIOB::ptr(),
        Port::C => &*device::GPIOC::ptr(),
        Port::D => &*device::GPIOD::ptr(),
        Port::E => &*device::GPIOE::ptr(),
        Port::F => &*device::GPIOF::ptr(),
        Port::G => &*device::GPIOG::ptr(),
        Port::H => &*device::GPIOH::ptr(),
        Port::I => &*device::GPIOI::ptr(),
        Port::J => &*device::GPIOJ::ptr(),
        Port::K => &*device::GPIOK::ptr(),
    }
}

/// A GPIO port that can be driven without knowing its PAC type.
pub trait AnyGpioPeriph {
    /// Applies `atts` (see [`PinConfig::encode`]) to every pin in `pins`,
    /// leaving the others untouched.
    fn configure(&self, pins: u16, atts: u16);
    /// Atomically drives `set` pins high and `reset` pins low.
    fn set_reset(&self, set: u16, reset: u16);
    /// Current input levels of the whole port.
    fn read(&self) -> u16;

    /// Applies `config` to `pins`.
    fn apply(&self, pins: u16, config: &PinConfig) {
        self.configure(pins, config.encode());
    }

    /// Drives every pin in `pins` to `level`.
    fn write(&self, pins: u16, level: Level) {
        match level {
            Level::High => self.set_reset(pins, 0),
            Level::Low => self.set_reset(0, pins),
        }
    }
}

impl<T: GpioPeriph> AnyGpioPeriph for T {
    fn configure(&self, pins: u16, atts: u16) {
        // The config registers come in 1, 2, and 4-bit per pin variants. The
        // pin mask is already right for the 1-bit fields; spread it out into
        // 2- and 4-bit masks by shuffling in zeroes.

        // 1 in each targeted 1bit field.
        let lsbs_1 = u32::from(pins);
        // 0b01 in each targeted 2bit field.
        let lsbs_2 = outer_perfect_shuffle(lsbs_1);
        // 0b0001 in each targeted 4bit field, low and high halves.
        let lsbs_4l = outer_perfect_shuffle(lsbs_2 & 0xFFFF);
        let lsbs_4h = outer_perfect_shuffle(lsbs_2 >> 16);

        // Multiplying by a field-wide constant is a cheap shift-and-or on
        // ARMv7-M; it can't actually overflow, but wrapping ops keep the
        // overflow checks out of the binary.
        let mask_2 = lsbs_2.wrapping_mul(0b11);
        let mask_4l = lsbs_4l.wrapping_mul(0b1111);
        let mask_4h = lsbs_4h.wrapping_mul(0b1111);

        let moder_val = u32::from(atts & 0b11);
        self.moder().modify(|r, w| unsafe {
            w.bits((r.bits() & !mask_2) | moder_val.wrapping_mul(lsbs_2))
        });

        let otyper_val = u32::from((atts >> 2) & 1);
        self.otyper().modify(|r, w| unsafe {
            w.bits((r.bits() & !lsbs_1) | otyper_val.wrapping_mul(lsbs_1))
        });

        let ospeedr_val = u32::from((atts >> 3) & 0b11);
        self.ospeedr().modify(|r, w| unsafe {
            w.bits((r.bits() & !mask_2) | ospeedr_val.wrapping_mul(lsbs_2))
        });

        let pupdr_val = u32::from((atts >> 5) & 0b11);
        self.pupdr().modify(|r, w| unsafe {
            w.bits((r.bits() & !mask_2) | pupdr_val.wrapping_mul(lsbs_2))
        });

        let af_val = u32::from((atts >> 7) & 0b1111);
        self.afrl().modify(|r, w| unsafe {
            w.bits((r.bits() & !mask_4l) | af_val.wrapping_mul(lsbs_4l))
        });
        self.afrh().modify(|r, w| unsafe {
            w.bits((r.bits() & !mask_4h) | af_val.wrapping_mul(lsbs_4h))
        });
    }

    fn set_reset(&self, set: u16, reset: u16) {
        self.bsrr().write(|w| unsafe {
            w.bits((u32::from(reset) << 16) | u32::from(set))
        });
    }

    fn read(&self) -> u16 {
        self.idr().read().bits() as u16
    }
}

/// A GPIO port of one specific PAC type. Implemented for each of those types;
/// use [`AnyGpioPeriph`] to pick a port at runtime.
pub trait GpioPeriph {
    type ModeSpec: pac::RegisterSpec<Ux = u32> + pac::Readable + pac::Writable;
    type OtypeSpec: pac::RegisterSpec<Ux = u32> + pac::Readable + pac::Writable;
    type OspeedSpec: pac::RegisterSpec<Ux = u32> + pac::Readable + pac::Writable;
    type PupdSpec: pac::RegisterSpec<Ux = u32> + pac::Readable + pac::Writable;
    type AflSpec: pac::RegisterSpec<Ux = u32> + pac::Readable + pac::Writable;
    type AfhSpec: pac::RegisterSpec<Ux = u32> + pac::Readable + pac::Writable;
    type BsrSpec: pac::RegisterSpec<Ux = u32> + pac::Writable + pac::Resettable;
    type IdSpec: pac::RegisterSpec<Ux = u32> + pac::Readable;

    fn moder(&self) -> &pac::Reg<Self::ModeSpec>;
    fn otyper(&self) -> &pac::Reg<Self::OtypeSpec>;
    fn ospeedr(&self) -> &pac::Reg<Self::OspeedSpec>;
    fn pupdr(&self) -> &pac::Reg<Self::PupdSpec>;
    fn afrl(&self) -> &pac::Reg<Self::AflSpec>;
    fn afrh(&self) -> &pac::Reg<Self::AfhSpec>;
    fn bsrr(&self) -> &pac::Reg<Self::BsrSpec>;
    fn idr(&self) -> &pac::Reg<Self::IdSpec>;
}

macro_rules! impl_gpio_periph {
    ($module:ident) => {
        impl GpioPeriph for device::$module::RegisterBlock {
            type ModeSpec = device::$module::moder::MODER_SPEC;
            type OtypeSpec = device::$module::otyper::OTYPER_SPEC;
            type OspeedSpec = device::$module::ospeedr::OSPEEDR_SPEC;
            type PupdSpec = device::$module::pupdr::PUPDR_SPEC;
            type AflSpec = device::$module::afrl::AFRL_SPEC;
            type AfhSpec = device::$module::afrh::AFRH_SPEC;
            type BsrSpec = device::$module::bsrr::BSRR_SPEC;
            type IdSpec = device::$module::idr::IDR_SPEC;

            fn moder(&self) -> &pac::Reg<Self::ModeSpec> {
                &self.moder
            }
            fn otyper(&self) -> &pac::Reg<Self::OtypeSpec> {
                &self.otyper
            }
            fn ospeedr(&self) -> &pac::Reg<Self::OspeedSpec> {
                &self.ospeedr
            }
            fn pupdr(&self) -> &pac::Reg<Self::PupdSpec> {
                &self.pupdr
            }
            fn afrl(&self) -> &pac::Reg<Self::AflSpec> {
                &self.afrl
            }
            fn afrh(&self) -> &pac::Reg<Self::AfhSpec> {
                &self.afrh
            }
            fn bsrr(&self) -> &pac::Reg<Self::BsrSpec> {
                &self.bsrr
            }
            fn idr(&self) -> &pac::Reg<Self::IdSpec> {
                &self.idr
            }
        }
    };
}

// The H7 PAC gives GPIOA and GPIOB types of their own; the other ports share
// one of them.
#[cfg(feature = "has-gpioa-type")]
impl_gpio_periph!(gpioa);

#[cfg(feature = "has-gpiob-type")]
impl_gpio_periph!(gpiob);

/// Applies `config` to every pin in `pins`.
pub fn configure_pins(
    gpio: &dyn AnyGpioPeriph,
    pins: PinSet,
    config: &PinConfig,
) {
    gpio.apply(pins.pin_mask, config);
}

/// Interleaves bits in `input`:
///
/// - Output bit 0 = input bit 0
/// - Output bit 1 = input bit 16
/// - Output bit 2 = input bit 1
/// - Output bit 3 = input bit 17
/// ...and so forth. Method from Hacker's Delight.
const fn outer_perfect_shuffle(mut input: u32) -> u32 {
    let mut tmp = (input ^ (input >> 8)) & 0x0000ff00;
    input ^= tmp ^ (tmp << 8);
    tmp = (input ^ (input >> 4)) & 0x00f000f0;
    input ^= tmp ^ (tmp << 4);
    tmp = (input ^ (input >> 2)) & 0x0c0c0c0c;
    input ^= tmp ^ (tmp << 2);
    tmp = (input ^ (input >> 1)) & 0x22222222;
    input ^= tmp ^ (tmp << 1);
    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Alternate, OutputType, Pull, Speed};
    use mmio::{peek, poke, scratch_block};

    type Block = device::gpioa::RegisterBlock;

    #[test]
    fn shuffle_spreads_low_half() {
        assert_eq!(outer_perfect_shuffle(0b1), 0b1);
        assert_eq!(outer_perfect_shuffle(0b10), 0b100);
        assert_eq!(outer_perfect_shuffle(1 << 15), 1 << 30);
    }

    #[test]
    fn configure_usb_data_pins() {
        // PA11/PA12: AF10, push-pull, high speed, no pull. Other pins keep
        // whatever they had.
        let gpioa = scratch_block::<Block>();
        gpioa.moder.write(|w| unsafe { w.bits(0xABFF_FFFF) });
        gpioa.afrh.write(|w| unsafe { w.bits(0x0000_0007) });
        gpioa.afrl.write(|w| unsafe { w.bits(0x1234_5678) });

        let cfg = PinConfig::alternate(
            Alternate::AF10,
            OutputType::PushPull,
            Speed::High,
            Pull::None,
        );
        configure_pins(gpioa, Port::A.pins([11, 12]), &cfg);

        assert_eq!(gpioa.moder.read().bits(), 0xAABF_FFFF);
        assert_eq!(gpioa.ospeedr.read().bits(), (0b10 << 22) | (0b10 << 24));
        assert_eq!(gpioa.pupdr.read().bits(), 0);
        assert_eq!(gpioa.otyper.read().bits(), 0);
        assert_eq!(gpioa.afrh.read().bits(), 0x000A_A007);
        // No pins in the low half.
        assert_eq!(gpioa.afrl.read().bits(), 0x1234_5678);
    }

    #[test]
    fn configure_open_drain_pullup() {
        let gpioa = scratch_block::<Block>();
        let cfg = PinConfig::alternate(
            Alternate::AF10,
            OutputType::OpenDrain,
            Speed::High,
            Pull::Up,
        );
        gpioa.apply(1 << 10, &cfg);

        assert_eq!(gpioa.moder.read().bits(), 0b10 << 20);
        assert_eq!(gpioa.otyper.read().bits(), 1 << 10);
        assert_eq!(gpioa.pupdr.read().bits(), 0b01 << 20);
        assert_eq!(gpioa.afrh.read().bits(), 0xA << 8);
    }

    #[test]
    fn write_uses_set_reset() {
        let gpio = scratch_block::<Block>();

        gpio.write(1 << 3, Level::High);
        assert_eq!(peek(&gpio.bsrr), 1 << 3);
        gpio.write(1 << 3, Level::Low);
        assert_eq!(peek(&gpio.bsrr), 1 << (3 + 16));
        gpio.set_reset(0b0010, 0b0001);
        assert_eq!(peek(&gpio.bsrr), (0b0001 << 16) | 0b0010);
    }

    #[test]
    fn read_truncates_to_port_width() {
        let gpioc = scratch_block::<Block>();
        poke(&gpioc.idr, 0xFFFF_2000);
        assert_eq!(AnyGpioPeriph::read(gpioc), 0x2000);
    }
}
