//! # nx-sf
//!
//! Client side of the Horizon OS _Service Framework_: the message formats
//! every system service is reached through.
//!
//! ```text
//! ┌─────────────────────────────┐
//! │  Service bindings           │  applet, usb:hs, sm, ...
//! ├─────────────────────────────┤
//! │  CMIF                       │  "SFCI"/"SFCO" headers, domains
//! ├─────────────────────────────┤
//! │  HIPC                       │  framing, buffer descriptors, handles
//! ├─────────────────────────────┤
//! │  svcSendSyncRequest         │  kernel transport
//! └─────────────────────────────┘
//! ```
//!
//! - [`hipc`]: request layout and reply parsing on the TLS IPC buffer.
//! - [`cmif`]: command headers, domain headers, control and close requests.
//! - [`service`]: the [`Service`](service::Service) session type and the
//!   [`Dispatch`](service::Dispatch) request builder used by the bindings.

#![no_std]

extern crate nx_panic_handler as _; // Provides #[panic_handler]

pub mod cmif;
pub mod hipc;
pub mod service;
mod service_name;

pub use service_name::ServiceName;
