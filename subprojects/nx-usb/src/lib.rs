//! # nx-usb
//!
//! USB data types shared by the USB host bindings.
//!
//! - [`descriptor`]: standard USB descriptors and constants, packed exactly as
//!   they travel on the bus.
//! - [`hs`]: the `usb:hs` data model (interface filters, interface records,
//!   transfer reports) and the control-transfer buffer rules.
//! - [`cmd`]: `usb:hs` command IDs, which moved between system versions.
//!
//! Everything here is plain data with no IPC, so it builds and is tested on
//! the host as well.

#![cfg_attr(not(test), no_std)]

#[cfg(target_os = "horizon")]
extern crate nx_panic_handler as _; // Provides #[panic_handler]

pub mod cmd;
pub mod descriptor;
pub mod hs;
