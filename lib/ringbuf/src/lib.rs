// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static ring buffers for tracing boot-time code.
//!
//! Bring-up code runs before there is any console to print to, so instead of
//! logging text we record small `Copy` events into a fixed-size ring buffer
//! in RAM, which can then be read back with a debugger:
//!
//! ```text
//! (gdb) print drv_stm32h7_board::usb::__RINGBUF
//! ```
//!
//! ## Declaring a ring buffer
//!
//! The usual pattern is a module-local `Trace` enum with a `None` variant
//! used as the initializer:
//!
//! ```ignore
//! #[derive(Copy, Clone, Debug, Eq, PartialEq)]
//! enum Trace {
//!     None,
//!     PllLocked,
//!     SysclkSwitched,
//! }
//!
//! ringbuf!(Trace, 16, Trace::None);
//!
//! // ...
//!
//! ringbuf_entry!(Trace::PllLocked);
//! ```
//!
//! If you need more than one ring buffer in a module, name them:
//!
//! ```ignore
//! ringbuf!(USB_RINGBUF, Trace, 8, Trace::None);
//! ringbuf_entry!(USB_RINGBUF, Trace::VbusSense(true));
//! ```
//!
//! ## Deduplication
//!
//! Recording the same payload from the same source line twice in a row does
//! not consume a new slot; instead the `count` of the most recent entry is
//! bumped. This keeps polling loops from flushing everything else out of the
//! buffer.
//!
//! Entries are recorded inside a critical section, so it is fine to record
//! from both thread and interrupt context. Binaries must link a
//! `critical-section` implementation (on Cortex-M, the `cortex-m` crate's
//! `critical-section-single-core` feature).

#![cfg_attr(not(test), no_std)]

use core::cell::RefCell;

pub use critical_section;

/// One slot in a ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RingbufEntry<T: Copy> {
    /// Source line that recorded this entry.
    pub line: u16,
    /// Number of times the ring buffer had wrapped when this was recorded.
    pub generation: u16,
    /// Number of consecutive identical recordings folded into this entry.
    pub count: u16,
    pub payload: T,
}

/// A ring buffer of `N` entries.
#[derive(Debug)]
pub struct Ringbuf<T: Copy, const N: usize> {
    /// Index of the most recently written slot, or `None` if nothing has been
    /// recorded yet.
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, N> {
    /// Creates an empty ring buffer with every slot holding `init`.
    pub const fn new(init: T) -> Self {
        Self {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: init,
            }; N],
        }
    }

    /// Records `payload` as coming from `line`.
    pub fn entry(&mut self, line: u16, payload: T) {
        if N == 0 {
            return;
        }

        if let Some(last) = self.last {
            let ent = &mut self.buffer[last];
            if ent.line == line && ent.payload == payload {
                ent.count = ent.count.saturating_add(1);
                return;
            }
        }

        let (ndx, generation) = match self.last {
            None => (0, 0),
            Some(last) => {
                let prev_gen = self.buffer[last].generation;
                if last + 1 >= N {
                    (0, prev_gen.wrapping_add(1))
                } else {
                    (last + 1, prev_gen)
                }
            }
        };

        self.buffer[ndx] = RingbufEntry {
            line,
            generation,
            count: 1,
            payload,
        };
        self.last = Some(ndx);
    }

    /// The most recently recorded entry, if any.
    pub fn last_entry(&self) -> Option<&RingbufEntry<T>> {
        self.last.map(|i| &self.buffer[i])
    }

    /// Iterates over recorded entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &RingbufEntry<T>> + '_ {
        let (start, len) = match self.last {
            None => (0, 0),
            Some(last) => {
                let wrapped = self.buffer[last].generation != 0
                    || self.buffer[(last + 1) % N].count != 0;
                if wrapped {
                    ((last + 1) % N, N)
                } else {
                    (0, last + 1)
                }
            }
        };
        (0..len).map(move |i| &self.buffer[(start + i) % N])
    }
}

/// A [`Ringbuf`] that can live in a `static` and be recorded into from any
/// context.
pub struct StaticRingbuf<T: Copy, const N: usize> {
    inner: critical_section::Mutex<RefCell<Ringbuf<T, N>>>,
}

impl<T: Copy + PartialEq, const N: usize> StaticRingbuf<T, N> {
    pub const fn new(init: T) -> Self {
        Self {
            inner: critical_section::Mutex::new(RefCell::new(Ringbuf::new(
                init,
            ))),
        }
    }

    /// Records `payload` as coming from `line`.
    pub fn record(&self, line: u16, payload: T) {
        critical_section::with(|cs| {
            self.inner.borrow_ref_mut(cs).entry(line, payload);
        });
    }

    /// Runs `f` with shared access to the buffer contents.
    pub fn inspect<R>(&self, f: impl FnOnce(&Ringbuf<T, N>) -> R) -> R {
        critical_section::with(|cs| f(&self.inner.borrow_ref(cs)))
    }
}

/// Declares a ring buffer in the current module.
///
/// `ringbuf!(NAME, Type, N, expr)` makes a static ring buffer named `NAME`
/// holding `N` entries of `Type`, all initialized to `expr`. If the name is
/// omitted it defaults to `__RINGBUF`, which allows one unnamed ring buffer
/// per module.
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[used]
        static $name: $crate::StaticRingbuf<$t, $n> =
            $crate::StaticRingbuf::new($init);
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

/// Records an entry in a ring buffer declared with [`ringbuf!`].
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate the payload before entering the critical section.
        let p = $payload;
        $buf.record(line!() as u16, p);
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload)
    };
}
