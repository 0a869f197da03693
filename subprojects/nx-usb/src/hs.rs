//! `usb:hs` data model.
//!
//! These records are exchanged verbatim with the USB host service through IPC
//! buffers, so their layouts are fixed and asserted below.

use bitflags::bitflags;
use static_assertions::const_assert_eq;
use zerocopy::{
    FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout,
    little_endian::{I32, U16, U32, U64},
};

use crate::descriptor::{
    USB_ENDPOINT_IN, UsbConfigDescriptor, UsbDeviceDescriptor, UsbEndpointDescriptor,
    UsbInterfaceDescriptor, UsbSsEndpointCompanionDescriptor,
};

/// Number of endpoint slots per direction in [`UsbHsInterfaceInfo`].
pub const USBHS_MAX_ENDPOINTS: usize = 15;

/// Number of interface-available event slots the service supports.
pub const USBHS_MAX_AVAILABLE_EVENTS: u8 = 3;

/// Alignment and size granularity of control transfer buffers.
pub const CTRL_XFER_BUFFER_ALIGN: usize = 0x1000;

bitflags! {
    /// Selects which fields of a [`UsbHsInterfaceFilter`] take part in matching.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct UsbHsInterfaceFilterFlags: u16 {
        const ID_VENDOR = 1 << 0;
        const ID_PRODUCT = 1 << 1;
        const BCD_DEVICE_MIN = 1 << 2;
        const BCD_DEVICE_MAX = 1 << 3;
        const DEVICE_CLASS = 1 << 4;
        const DEVICE_SUB_CLASS = 1 << 5;
        const DEVICE_PROTOCOL = 1 << 6;
        const INTERFACE_CLASS = 1 << 7;
        const INTERFACE_SUB_CLASS = 1 << 8;
        const INTERFACE_PROTOCOL = 1 << 9;
    }
}

/// Interface filter used by the query and available-event commands.
///
/// The builder methods set a field together with its flag, so a filter never
/// carries a value the service would ignore.
///
/// ```ignore
/// let filter = UsbHsInterfaceFilter::new()
///     .vendor_id(0x057E)
///     .interface_class(USB_CLASS_HID);
/// ```
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct UsbHsInterfaceFilter {
    pub flags: U16,
    pub id_vendor: U16,
    pub id_product: U16,
    pub bcd_device_min: U16,
    pub bcd_device_max: U16,
    pub b_device_class: u8,
    pub b_device_sub_class: u8,
    pub b_device_protocol: u8,
    pub b_interface_class: u8,
    pub b_interface_sub_class: u8,
    pub b_interface_protocol: u8,
}

const_assert_eq!(size_of::<UsbHsInterfaceFilter>(), 0x10);

impl UsbHsInterfaceFilter {
    /// Returns a filter that matches every interface.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn flags(&self) -> UsbHsInterfaceFilterFlags {
        UsbHsInterfaceFilterFlags::from_bits_retain(self.flags.get())
    }

    #[inline]
    fn with_flag(mut self, flag: UsbHsInterfaceFilterFlags) -> Self {
        self.flags = U16::new((self.flags() | flag).bits());
        self
    }

    pub fn vendor_id(mut self, id: u16) -> Self {
        self.id_vendor = U16::new(id);
        self.with_flag(UsbHsInterfaceFilterFlags::ID_VENDOR)
    }

    pub fn product_id(mut self, id: u16) -> Self {
        self.id_product = U16::new(id);
        self.with_flag(UsbHsInterfaceFilterFlags::ID_PRODUCT)
    }

    pub fn bcd_device_min(mut self, bcd: u16) -> Self {
        self.bcd_device_min = U16::new(bcd);
        self.with_flag(UsbHsInterfaceFilterFlags::BCD_DEVICE_MIN)
    }

    pub fn bcd_device_max(mut self, bcd: u16) -> Self {
        self.bcd_device_max = U16::new(bcd);
        self.with_flag(UsbHsInterfaceFilterFlags::BCD_DEVICE_MAX)
    }

    pub fn device_class(mut self, class: u8) -> Self {
        self.b_device_class = class;
        self.with_flag(UsbHsInterfaceFilterFlags::DEVICE_CLASS)
    }

    pub fn device_sub_class(mut self, sub_class: u8) -> Self {
        self.b_device_sub_class = sub_class;
        self.with_flag(UsbHsInterfaceFilterFlags::DEVICE_SUB_CLASS)
    }

    pub fn device_protocol(mut self, protocol: u8) -> Self {
        self.b_device_protocol = protocol;
        self.with_flag(UsbHsInterfaceFilterFlags::DEVICE_PROTOCOL)
    }

    pub fn interface_class(mut self, class: u8) -> Self {
        self.b_interface_class = class;
        self.with_flag(UsbHsInterfaceFilterFlags::INTERFACE_CLASS)
    }

    pub fn interface_sub_class(mut self, sub_class: u8) -> Self {
        self.b_interface_sub_class = sub_class;
        self.with_flag(UsbHsInterfaceFilterFlags::INTERFACE_SUB_CLASS)
    }

    pub fn interface_protocol(mut self, protocol: u8) -> Self {
        self.b_interface_protocol = protocol;
        self.with_flag(UsbHsInterfaceFilterFlags::INTERFACE_PROTOCOL)
    }
}

/// Descriptors of one interface (alternate setting) of an attached device.
///
/// Endpoint slots that are not in use are all-zero.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct UsbHsInterfaceInfo {
    pub id: I32,
    pub device_id_2: U32,
    pub unk_x8: U32,
    pub interface_desc: UsbInterfaceDescriptor,
    pub pad_x15: [u8; 0x7],
    pub output_endpoint_descs: [UsbEndpointDescriptor; USBHS_MAX_ENDPOINTS],
    pub pad_x85: [u8; 0x7],
    pub input_endpoint_descs: [UsbEndpointDescriptor; USBHS_MAX_ENDPOINTS],
    pub pad_xf5: [u8; 0x6],
    pub output_ss_endpoint_companion_descs:
        [UsbSsEndpointCompanionDescriptor; USBHS_MAX_ENDPOINTS],
    pub pad_x155: [u8; 0x6],
    pub input_ss_endpoint_companion_descs: [UsbSsEndpointCompanionDescriptor; USBHS_MAX_ENDPOINTS],
    pub pad_x1b5: [u8; 0x3],
}

const_assert_eq!(size_of::<UsbHsInterfaceInfo>(), 0x1B8);

impl UsbHsInterfaceInfo {
    /// Returns an all-zero record.
    #[inline]
    pub fn zeroed() -> Self {
        Self::new_zeroed()
    }

    /// Interface ID assigned by the service.
    #[inline]
    pub fn id(&self) -> i32 {
        self.id.get()
    }

    /// Iterates over the populated IN endpoint descriptors.
    pub fn input_endpoints(&self) -> impl Iterator<Item = &UsbEndpointDescriptor> {
        self.input_endpoint_descs.iter().filter(|ep| !ep.is_empty())
    }

    /// Iterates over the populated OUT endpoint descriptors.
    pub fn output_endpoints(&self) -> impl Iterator<Item = &UsbEndpointDescriptor> {
        self.output_endpoint_descs.iter().filter(|ep| !ep.is_empty())
    }
}

/// An interface record as returned by the `usb:hs` query commands.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct UsbHsInterface {
    pub inf: UsbHsInterfaceInfo,
    pub pathstr: [u8; 0x40],
    pub bus_id: U32,
    pub device_id: U32,
    pub device_desc: UsbDeviceDescriptor,
    pub config_desc: UsbConfigDescriptor,
    pub pad_x21b: [u8; 0x5],
    pub timestamp: U64,
}

const_assert_eq!(size_of::<UsbHsInterface>(), 0x228);

impl UsbHsInterface {
    /// Returns an all-zero record.
    #[inline]
    pub fn zeroed() -> Self {
        Self::new_zeroed()
    }

    #[inline]
    pub fn id(&self) -> i32 {
        self.inf.id()
    }

    /// Device path, without the trailing NULs.
    pub fn path(&self) -> &[u8] {
        let len = self
            .pathstr
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.pathstr.len());
        &self.pathstr[..len]
    }
}

/// Completion record of an asynchronous transfer.
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct UsbHsXferReport {
    pub xfer_id: U32,
    pub res: U32,
    pub requested_size: U32,
    pub transferred_size: U32,
    pub id: U64,
}

const_assert_eq!(size_of::<UsbHsXferReport>(), 0x18);

impl UsbHsXferReport {
    /// Result code of the transfer, 0 on success.
    #[inline]
    pub fn result_code(&self) -> u32 {
        self.res.get()
    }

    #[inline]
    pub fn transferred_size(&self) -> u32 {
        self.transferred_size.get()
    }
}

/// Returns `true` if `bm_request_type` describes a device-to-host request.
#[inline]
pub const fn is_ctrl_xfer_in(bm_request_type: u8) -> bool {
    bm_request_type & USB_ENDPOINT_IN != 0
}

/// Size of the buffer a control transfer of `w_length` bytes maps.
#[inline]
pub const fn ctrl_xfer_buffer_size(w_length: u16) -> usize {
    (w_length as usize + CTRL_XFER_BUFFER_ALIGN - 1) & !(CTRL_XFER_BUFFER_ALIGN - 1)
}

/// Checks that `buffer` can back a control transfer of `w_length` bytes.
///
/// The buffer must start on a 0x1000 boundary and span at least `w_length`
/// rounded up to 0x1000.
pub fn check_ctrl_xfer_buffer(buffer: &[u8], w_length: u16) -> Result<(), CtrlXferBufferError> {
    let addr = buffer.as_ptr() as usize;
    if addr % CTRL_XFER_BUFFER_ALIGN != 0 {
        return Err(CtrlXferBufferError::Misaligned { addr });
    }

    let required = ctrl_xfer_buffer_size(w_length);
    if buffer.len() < required {
        return Err(CtrlXferBufferError::TooSmall {
            required,
            len: buffer.len(),
        });
    }

    Ok(())
}

/// Error returned by [`check_ctrl_xfer_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CtrlXferBufferError {
    #[error("control transfer buffer at {addr:#x} is not 0x1000-aligned")]
    Misaligned { addr: usize },
    #[error("control transfer buffer is {len} bytes, {required} required")]
    TooSmall { required: usize, len: usize },
}

/// Checks that `index` names one of the interface-available event slots.
#[inline]
pub const fn check_available_event_index(index: u8) -> Result<(), InvalidEventIndex> {
    if index < USBHS_MAX_AVAILABLE_EVENTS {
        Ok(())
    } else {
        Err(InvalidEventIndex(index))
    }
}

/// Error returned by [`check_available_event_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid interface available event index {0}")]
pub struct InvalidEventIndex(pub u8);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{USB_CLASS_HID, USB_DT_ENDPOINT};

    #[repr(C, align(4096))]
    struct PageBuf([u8; 0x2000]);

    #[test]
    fn filter_builder_sets_field_and_flag() {
        let filter = UsbHsInterfaceFilter::new()
            .vendor_id(0x057E)
            .interface_class(USB_CLASS_HID);

        assert_eq!(
            filter.flags(),
            UsbHsInterfaceFilterFlags::ID_VENDOR | UsbHsInterfaceFilterFlags::INTERFACE_CLASS
        );
        assert_eq!(filter.id_vendor.get(), 0x057E);
        assert_eq!(filter.b_interface_class, USB_CLASS_HID);

        let bytes = filter.as_bytes();
        assert_eq!(&bytes[0..2], &0x0081u16.to_le_bytes());
        assert_eq!(&bytes[2..4], &0x057Eu16.to_le_bytes());
        assert_eq!(bytes[13], USB_CLASS_HID);
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = UsbHsInterfaceFilter::new();
        assert!(filter.flags().is_empty());
        assert!(filter.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn interface_info_field_offsets() {
        let mut info = UsbHsInterfaceInfo::zeroed();
        info.id = I32::new(-2);
        info.interface_desc.b_length = 9;
        info.output_endpoint_descs[0].b_length = 7;
        info.input_endpoint_descs[0].b_length = 7;
        info.input_ss_endpoint_companion_descs[14].b_length = 6;

        let bytes = info.as_bytes();
        assert_eq!(&bytes[0..4], &(-2i32).to_le_bytes());
        assert_eq!(bytes[0x0C], 9);
        assert_eq!(bytes[0x1C], 7);
        assert_eq!(bytes[0x8C], 7);
        assert_eq!(bytes[0x1B5 - 6], 6);
    }

    #[test]
    fn interface_trailer_offsets() {
        let mut iface = UsbHsInterface::zeroed();
        iface.pathstr[..3].copy_from_slice(b"1-2");
        iface.bus_id = U32::new(1);
        iface.timestamp = U64::new(0x1122_3344_5566_7788);

        let bytes = iface.as_bytes();
        assert_eq!(bytes[0x1B8], b'1');
        assert_eq!(&bytes[0x1F8..0x1FC], &1u32.to_le_bytes());
        assert_eq!(&bytes[0x220..0x228], &0x1122_3344_5566_7788u64.to_le_bytes());
        assert_eq!(iface.path(), b"1-2");
    }

    #[test]
    fn populated_endpoints_skip_empty_slots() {
        let mut info = UsbHsInterfaceInfo::zeroed();
        info.input_endpoint_descs[3] = UsbEndpointDescriptor {
            b_length: 7,
            b_descriptor_type: USB_DT_ENDPOINT,
            b_endpoint_address: 0x83,
            bm_attributes: 0x03,
            w_max_packet_size: U16::new(64),
            b_interval: 4,
        };

        let eps: Vec<_> = info.input_endpoints().collect();
        assert_eq!(eps.len(), 1);
        assert_eq!(eps[0].number(), 3);
        assert_eq!(info.output_endpoints().count(), 0);
    }

    #[test]
    fn xfer_report_reads_wire_bytes() {
        let mut bytes = [0u8; 0x18];
        bytes[4..8].copy_from_slice(&0x1234u32.to_le_bytes());
        bytes[12..16].copy_from_slice(&18u32.to_le_bytes());

        let report = UsbHsXferReport::read_from_bytes(&bytes[..]).unwrap();
        assert_eq!(report.result_code(), 0x1234);
        assert_eq!(report.transferred_size(), 18);
    }

    #[test]
    fn ctrl_xfer_buffer_size_rounds_up_to_page() {
        assert_eq!(ctrl_xfer_buffer_size(0), 0);
        assert_eq!(ctrl_xfer_buffer_size(1), 0x1000);
        assert_eq!(ctrl_xfer_buffer_size(0x1000), 0x1000);
        assert_eq!(ctrl_xfer_buffer_size(0x1001), 0x2000);
        assert_eq!(ctrl_xfer_buffer_size(u16::MAX), 0x10000);
    }

    #[test]
    fn ctrl_xfer_buffer_checks() {
        let buf = PageBuf([0; 0x2000]);

        assert_eq!(check_ctrl_xfer_buffer(&buf.0, 18), Ok(()));
        assert_eq!(check_ctrl_xfer_buffer(&buf.0[..0x1000], 0x1000), Ok(()));
        assert_eq!(
            check_ctrl_xfer_buffer(&buf.0[..0x1000], 0x1001),
            Err(CtrlXferBufferError::TooSmall {
                required: 0x2000,
                len: 0x1000
            })
        );
        assert!(matches!(
            check_ctrl_xfer_buffer(&buf.0[1..], 18),
            Err(CtrlXferBufferError::Misaligned { .. })
        ));
    }

    #[test]
    fn available_event_slots() {
        assert_eq!(check_available_event_index(0), Ok(()));
        assert_eq!(check_available_event_index(2), Ok(()));
        assert_eq!(check_available_event_index(3), Err(InvalidEventIndex(3)));
        assert_eq!(check_available_event_index(255), Err(InvalidEventIndex(255)));
    }

    #[test]
    fn request_direction() {
        assert!(is_ctrl_xfer_in(0x80));
        assert!(is_ctrl_xfer_in(0xA1));
        assert!(!is_ctrl_xfer_in(0x21));
    }
}
