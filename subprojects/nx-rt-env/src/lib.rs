//! # nx-rt-env
//!
//! Process-wide runtime environment shared by the service bindings.
//!
//! Currently this is the host OS version: the runtime stores it once at
//! startup with [`hos_version::set`], and every binding whose command IDs
//! depend on the firmware reads it back with [`hos_version::get`] when it
//! opens a session.

#![cfg_attr(not(test), no_std)]

#[cfg(target_os = "horizon")]
extern crate nx_panic_handler as _; // Provides #[panic_handler]

pub mod hos_version;

pub use self::hos_version::HosVersion;
