//! Handle newtypes.

use crate::raw::Handle;

/// A trait for kernel objects the current thread can block on.
pub trait Waitable: _priv::Sealed {
    /// Returns the raw handle of the waitable object.
    fn raw_handle(&self) -> Handle;
}

/// Generates a [`Handle`] newtype with the common conversion helpers.
///
/// [`Handle`]: crate::raw::Handle
macro_rules! define_handle_type {
    {
        $(#[$meta:meta])* $vis:vis struct $name:ident
    } => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        $vis struct $name($crate::raw::Handle);

        impl $name {
            /// Wraps a raw handle.
            ///
            /// # Safety
            ///
            /// Caller must guarantee that the raw handle refers to a kernel
            /// object of the right type.
            #[inline]
            pub const unsafe fn from_raw(raw: $crate::raw::Handle) -> Self {
                Self(raw)
            }

            /// Returns `true` if the handle is not [`INVALID_HANDLE`](crate::raw::INVALID_HANDLE).
            #[inline]
            pub const fn is_valid(&self) -> bool {
                self.0 != $crate::raw::INVALID_HANDLE
            }

            /// Returns the raw handle value.
            #[inline]
            pub const fn to_raw(&self) -> $crate::raw::Handle {
                self.0
            }
        }
    };
}

/// Like [`define_handle_type!`], and additionally implements [`Waitable`].
macro_rules! define_waitable_handle_type {
    {
        $(#[$meta:meta])* $vis:vis struct $name:ident
    } => {
        define_handle_type! {
            $(#[$meta])* $vis struct $name
        }

        impl $crate::handle::Waitable for $name {
            #[inline]
            fn raw_handle(&self) -> $crate::raw::Handle {
                self.0
            }
        }

        impl $crate::handle::_priv::Sealed for $name {}
    };
}

pub(crate) mod _priv {
    pub trait Sealed {}
}
