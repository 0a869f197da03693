//! # nx-cpu
//!
//! Access to the Nintendo Switch's ARM Cortex-A57 (aarch64) CPU state that
//! the IPC bindings need: the thread-local region pointer and data-cache
//! maintenance for buffers shared with devices.

#![no_std]

#[cfg(not(target_arch = "aarch64"))]
compile_error!("nx-cpu only supports aarch64 CPUs");

extern crate nx_panic_handler as _; // provides #[panic_handler]

pub mod cache;
pub mod tls;
