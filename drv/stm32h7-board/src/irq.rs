// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Forwarding of the OTG interrupts to the USB stack.
//!
//! The stack numbers its root hub ports independently of ST's naming: the FS
//! block (OTG2, vector `OTG_FS`) is port 0 and the HS block (OTG1, vector
//! `OTG_HS`) is port 1. The application's vector handlers call
//! [`on_otg_fs`]/[`on_otg_hs`], which pass `(rhport, in_isr = true)` to the
//! handler registered with [`set_usb_handler`].

use core::cell::Cell;

use critical_section::Mutex;

/// The USB stack's interrupt entry point: `(rhport, in_isr)`.
pub type UsbHandler = fn(u8, bool);

static USB_HANDLER: Mutex<Cell<Option<UsbHandler>>> =
    Mutex::new(Cell::new(None));

pub const FS_RHPORT: u8 = 0;
pub const HS_RHPORT: u8 = 1;

/// Installs the USB stack's interrupt handler, replacing any previous one.
pub fn set_usb_handler(handler: UsbHandler) {
    critical_section::with(|cs| USB_HANDLER.borrow(cs).set(Some(handler)));
}

fn dispatch(rhport: u8) {
    let handler = critical_section::with(|cs| USB_HANDLER.borrow(cs).get());
    if let Some(h) = handler {
        h(rhport, true);
    }
}

/// Body of the `OTG_FS` vector.
pub fn on_otg_fs() {
    dispatch(FS_RHPORT);
}

/// Body of the `OTG_HS` vector.
pub fn on_otg_hs() {
    dispatch(HS_RHPORT);
}
