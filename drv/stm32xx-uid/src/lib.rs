// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reads the STM32's 96-bit unique device ID. The `family-stm32h7` feature
//! selects where it lives.

#![cfg_attr(not(test), no_std)]

// The UID lives in System (flash) Memory rather than in a peripheral, so it's
// not documented in the SVD or the PAC.
cfg_if::cfg_if! {
    if #[cfg(feature = "family-stm32h7")] {
        const UID_ADDR: u32 = 0x1FF1_E800;
    } else {
        compile_error!("unsupported SoC family");
        const UID_ADDR: u32 = 0; // Prevents a second error below
    }
}

/// Length of the UID in bytes.
pub const UID_LEN: usize = 12;

/// Reads the 96-bit UID from the running part.
pub fn read_uid() -> [u32; 3] {
    // Safety: the UID words are always mapped and readable from privileged
    // code, and nothing ever writes them.
    let uid =
        unsafe { core::slice::from_raw_parts(UID_ADDR as usize as *const u32, 3) };
    [uid[0], uid[1], uid[2]]
}

/// The UID as bytes, each word little-endian, lowest word first (the same
/// layout as the words in memory).
pub fn uid_bytes(uid: [u32; 3]) -> [u8; UID_LEN] {
    let mut out = [0; UID_LEN];
    for (chunk, word) in out.chunks_exact_mut(4).zip(uid) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    out
}

/// Copies as much of the UID as fits into `buf`, returning the number of
/// bytes written.
pub fn copy_uid(uid: [u32; 3], buf: &mut [u8]) -> usize {
    let bytes = uid_bytes(uid);
    let n = buf.len().min(UID_LEN);
    buf[..n].copy_from_slice(&bytes[..n]);
    n
}
