//! `usb:hs` service name and request payloads.
//!
//! Command IDs are version dependent and live in [`nx_usb::cmd`].

use nx_sf::ServiceName;
use nx_usb::hs::UsbHsInterfaceFilter;
use static_assertions::const_assert_eq;
use zerocopy::{
    Immutable, IntoBytes, KnownLayout,
    little_endian::{I32, U16, U32, U64},
};

/// Service name of the USB host client root session.
pub const SERVICE_NAME: ServiceName = ServiceName::from_static("usb:hs");

/// Input of `CreateInterfaceAvailableEvent`.
#[derive(Debug, Clone, Copy, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct CreateInterfaceAvailableEventIn {
    pub index: u8,
    pub pad: u8,
    pub filter: UsbHsInterfaceFilter,
}

const_assert_eq!(size_of::<CreateInterfaceAvailableEventIn>(), 0x12);

/// Input of `AcquireUsbIf`.
#[derive(Debug, Clone, Copy, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct AcquireUsbIfIn {
    pub id: I32,
}

/// Input of the 1.x `SubmitControlInRequest`/`SubmitControlOutRequest`.
#[derive(Debug, Clone, Copy, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct SubmitControlRequestIn {
    pub b_request: u8,
    pub bm_request_type: u8,
    pub w_value: U16,
    pub w_index: U16,
    pub w_length: U16,
    pub timeout_ms: U32,
}

const_assert_eq!(size_of::<SubmitControlRequestIn>(), 0x0C);

/// Input of the 2.0.0+ `CtrlXferAsync`.
///
/// Note the request type/request order is swapped relative to
/// [`SubmitControlRequestIn`].
#[derive(Debug, Clone, Copy, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct CtrlXferAsyncIn {
    pub bm_request_type: u8,
    pub b_request: u8,
    pub w_value: U16,
    pub w_index: U16,
    pub w_length: U16,
    pub buffer: U64,
}

const_assert_eq!(size_of::<CtrlXferAsyncIn>(), 0x10);
