// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STM32H7-specific USART details: instance register blocks and clock gates.

cfg_if::cfg_if! {
    if #[cfg(feature = "stm32h743")] {
        pub use stm32h7::stm32h743 as device;
    } else if #[cfg(feature = "stm32h753")] {
        pub use stm32h7::stm32h753 as device;
    } else {
        compile_error!("enable one of the stm32h743 or stm32h753 features");
    }
}

/// Which USART device
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DeviceId {
    Usart1,
    Usart2,
    Usart3,
    Uart4,
    Uart5,
    Usart6,
    Uart7,
    Uart8,
}

impl DeviceId {
    /// Pointer to this instance's register block. Every USART and UART on
    /// the part shares USART1's layout.
    pub fn ptr(self) -> *const device::usart1::RegisterBlock {
        match self {
            Self::Usart1 => device::USART1::ptr(),
            Self::Usart2 => device::USART2::ptr(),
            Self::Usart3 => device::USART3::ptr(),
            Self::Uart4 => device::UART4::ptr(),
            Self::Uart5 => device::UART5::ptr(),
            Self::Usart6 => device::USART6::ptr(),
            Self::Uart7 => device::UART7::ptr(),
            Self::Uart8 => device::UART8::ptr(),
        }
    }

    /// Whether this instance is clocked from APB2 rather than APB1.
    pub const fn on_apb2(self) -> bool {
        matches!(self, Self::Usart1 | Self::Usart6)
    }

    pub(crate) fn enable_clock(self, rcc: &device::rcc::RegisterBlock) {
        match self {
            Self::Usart1 => rcc.apb2enr.modify(|_, w| w.usart1en().set_bit()),
            Self::Usart6 => rcc.apb2enr.modify(|_, w| w.usart6en().set_bit()),
            Self::Usart2 => rcc.apb1lenr.modify(|_, w| w.usart2en().set_bit()),
            Self::Usart3 => rcc.apb1lenr.modify(|_, w| w.usart3en().set_bit()),
            Self::Uart4 => rcc.apb1lenr.modify(|_, w| w.uart4en().set_bit()),
            Self::Uart5 => rcc.apb1lenr.modify(|_, w| w.uart5en().set_bit()),
            Self::Uart7 => rcc.apb1lenr.modify(|_, w| w.uart7en().set_bit()),
            Self::Uart8 => rcc.apb1lenr.modify(|_, w| w.uart8en().set_bit()),
        }
        // Read back so the enable has landed before the first register
        // access to the peripheral.
        if self.on_apb2() {
            let _ = rcc.apb2enr.read();
        } else {
            let _ = rcc.apb1lenr.read();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmio::scratch_block;

    #[test]
    fn clock_gates() {
        let rcc = scratch_block::<device::rcc::RegisterBlock>();
        DeviceId::Usart3.enable_clock(rcc);
        DeviceId::Usart1.enable_clock(rcc);
        DeviceId::Uart8.enable_clock(rcc);
        assert_eq!(rcc.apb1lenr.read().bits(), (1 << 18) | (1 << 31));
        assert_eq!(rcc.apb2enr.read().bits(), 1 << 4);
    }

    #[test]
    fn apb_assignment() {
        assert!(DeviceId::Usart6.on_apb2());
        assert!(!DeviceId::Uart7.on_apb2());
    }
}
