//! # nx-libapplet
//!
//! Launch sequence shared by every library applet.
//!
//! Each library applet expects a [`CommonArguments`] storage first, followed
//! by its own argument storage. [`launch`] runs the whole round trip: create
//! the applet, push both storages, start it, wait for it to exit, check its
//! result and pop the reply.
//!
//! The argument layout in [`args`] is plain data and builds on any target;
//! the IPC half is only available on Horizon.

#![cfg_attr(not(test), no_std)]

#[cfg(target_os = "horizon")]
extern crate nx_panic_handler as _; // Provides #[panic_handler]

pub mod args;

#[cfg(target_os = "horizon")]
mod launch;

pub use self::args::{COMMON_ARGUMENTS_VERSION, CommonArguments, LibAppletArgs};
#[cfg(target_os = "horizon")]
pub use self::launch::{LaunchError, StorageError, launch, pop_storage, push_storage};
