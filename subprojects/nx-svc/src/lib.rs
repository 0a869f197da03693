//! # nx-svc
//!
//! Typed access to the Horizon OS _Supervisor Calls_ (SVCs) used by the IPC
//! service bindings.
//!
//! The crate has two layers:
//! - [`raw`]: naked `svc` stubs returning the raw result code.
//! - Typed wrappers ([`ipc`], [`sync`], [`thread`], [`tick`]) that wrap
//!   handles in newtypes and map result codes to per-call `thiserror` enums.
//!
//! Every error type implements [`error::ToRawResultCode`], so the original
//! kernel result code can always be recovered unchanged.
//!
//! ## References:
//! - [Switchbrew Wiki: SVC](https://switchbrew.org/wiki/SVC)
//! - [switchbrew/libnx: `svc.h`](https://github.com/switchbrew/libnx/blob/master/nx/include/switch/kernel/svc.h)

//!
//! The result-code tables ([`code`], [`error`], [`result`]) are plain data and
//! build on any target; everything that issues an `svc` is Horizon-only.

#![cfg_attr(not(test), no_std)]

#[cfg(target_os = "horizon")]
extern crate nx_panic_handler as _; // Provides #[panic_handler]

#[cfg(target_os = "horizon")]
#[macro_use]
mod handle;

pub mod code;
pub mod error;
#[cfg(target_os = "horizon")]
pub mod ipc;
#[cfg(target_os = "horizon")]
pub mod process;
#[cfg(target_os = "horizon")]
pub mod raw;
pub mod result;
#[cfg(target_os = "horizon")]
pub mod sync;
#[cfg(target_os = "horizon")]
pub mod thread;
#[cfg(target_os = "horizon")]
pub mod tick;

#[cfg(target_os = "horizon")]
pub use self::handle::Waitable;
