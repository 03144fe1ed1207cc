//! Opaque engine handles and the slots that own them.
//!
//! The proxy engine and the network stack hand out raw, manually released
//! handles. The relay keeps each one in a [`HandleSlot`], so releasing is a
//! single call that is a no-op when nothing is held.

use std::fmt;
use std::num::NonZeroUsize;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(PartialEq, Eq, Hash)]
        pub struct $name(NonZeroUsize);

        impl $name {
            /// Wrap a raw handle value; `None` for null
            pub fn from_raw(raw: usize) -> Option<Self> {
                NonZeroUsize::new(raw).map(Self)
            }

            /// Raw handle value
            pub fn as_raw(&self) -> usize {
                self.0.get()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0.get())
            }
        }
    };
}

opaque_handle!(
    /// A running proxy-engine instance
    SessionHandle
);

opaque_handle!(
    /// A network-stack registration
    StackHandle
);

/// Tagged maybe-owned handle
#[derive(Debug)]
pub enum HandleSlot<H> {
    /// Nothing held
    Empty,
    /// Handle owned by this slot
    Held(H),
}

impl<H> HandleSlot<H> {
    /// Check if a handle is held
    pub fn is_held(&self) -> bool {
        matches!(self, HandleSlot::Held(_))
    }

    /// Borrow the held handle
    pub fn get(&self) -> Option<&H> {
        match self {
            HandleSlot::Held(handle) => Some(handle),
            HandleSlot::Empty => None,
        }
    }

    /// Take the handle out, leaving the slot empty
    pub fn take(&mut self) -> Option<H> {
        match std::mem::replace(self, HandleSlot::Empty) {
            HandleSlot::Held(handle) => Some(handle),
            HandleSlot::Empty => None,
        }
    }

    /// Run `release` on the held handle, if any, and empty the slot.
    ///
    /// Returns `None` without calling `release` when the slot is empty.
    pub fn release<R>(&mut self, release: impl FnOnce(H) -> R) -> Option<R> {
        self.take().map(release)
    }
}

impl<H> Default for HandleSlot<H> {
    fn default() -> Self {
        HandleSlot::Empty
    }
}
