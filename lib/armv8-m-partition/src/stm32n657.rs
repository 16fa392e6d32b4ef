// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Default partition for the STM32N657 (Cortex-M55).
//!
//! The SAU is left alone (all memory Secure unless the IDAU says otherwise),
//! SCR/AIRCR keep their reset values, the FPU is shared with the Non-Secure
//! state, and every interrupt targets the Secure state.

use crate::{
    CoreFeatures, FpuAccess, FpuInit, InterruptTargets, PartitionConfig,
    SAU_REGIONS_MAX,
};

/// ITNS0..ITNS6 cover interrupts 0..223.
pub const ITNS_WORDS: usize = 7;

/// A few interrupt numbers, for building Non-Secure interrupt maps.
pub mod irq {
    pub const PVD: u16 = 0;
    pub const RCC: u16 = 3;
    pub const GPDMA1_CHANNEL0: u16 = 84;
    pub const TIM2: u16 = 116;
    pub const USART1: u16 = 159;
    pub const USART2: u16 = 160;
    pub const USART3: u16 = 161;
    pub const LPUART1: u16 = 169;
    pub const SDMMC1: u16 = 174;
    pub const USB1_OTG_HS: u16 = 177;
    pub const USB2_OTG_HS: u16 = 178;
    pub const ETH1: u16 = 179;
}

pub const CORE: CoreFeatures = CoreFeatures {
    sau_regions: true,
    fpu: true,
};

pub const FPU: FpuInit = FpuInit {
    access: FpuAccess::SecureAndNonSecure,
    treat_as_secure: false,
    clear_on_return_secure_only: false,
    clear_on_return: true,
};

pub const PARTITION: PartitionConfig<ITNS_WORDS> = PartitionConfig {
    core: CORE,
    sau_ctrl: None,
    regions: [None; SAU_REGIONS_MAX],
    scb: None,
    fpu: Some(FPU),
    itns: InterruptTargets::<ITNS_WORDS>::all_secure().to_init(),
};
