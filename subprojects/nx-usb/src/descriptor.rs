//! Standard USB descriptors (USB 2.0 chapter 9, USB 3.x companion).
//!
//! Multi-byte fields use zerocopy's little-endian wrappers, which have
//! alignment 1, so each `#[repr(C)]` struct has exactly the packed wire
//! layout.

use static_assertions::const_assert_eq;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, little_endian::U16};

/// Direction bit of `bEndpointAddress` and `bmRequestType`: device to host.
pub const USB_ENDPOINT_IN: u8 = 0x80;
/// Host to device.
pub const USB_ENDPOINT_OUT: u8 = 0x00;
/// Mask of the endpoint number in `bEndpointAddress`.
pub const USB_ENDPOINT_ADDRESS_MASK: u8 = 0x0F;
/// Mask of the transfer type in `bmAttributes`.
pub const USB_TRANSFER_TYPE_MASK: u8 = 0x03;

pub const USB_DT_DEVICE: u8 = 0x01;
pub const USB_DT_CONFIG: u8 = 0x02;
pub const USB_DT_STRING: u8 = 0x03;
pub const USB_DT_INTERFACE: u8 = 0x04;
pub const USB_DT_ENDPOINT: u8 = 0x05;
pub const USB_DT_SS_ENDPOINT_COMPANION: u8 = 0x30;

pub const USB_DT_DEVICE_SIZE: u8 = 18;
pub const USB_DT_CONFIG_SIZE: u8 = 9;
pub const USB_DT_INTERFACE_SIZE: u8 = 9;
pub const USB_DT_ENDPOINT_SIZE: u8 = 7;
pub const USB_DT_SS_ENDPOINT_COMPANION_SIZE: u8 = 6;

pub const USB_CLASS_PER_INTERFACE: u8 = 0x00;
pub const USB_CLASS_AUDIO: u8 = 0x01;
pub const USB_CLASS_COMM: u8 = 0x02;
pub const USB_CLASS_HID: u8 = 0x03;
pub const USB_CLASS_PRINTER: u8 = 0x07;
pub const USB_CLASS_MASS_STORAGE: u8 = 0x08;
pub const USB_CLASS_HUB: u8 = 0x09;
pub const USB_CLASS_DATA: u8 = 0x0A;
pub const USB_CLASS_VENDOR_SPEC: u8 = 0xFF;

/// Standard `bRequest` codes.
pub const USB_REQUEST_GET_STATUS: u8 = 0x00;
pub const USB_REQUEST_CLEAR_FEATURE: u8 = 0x01;
pub const USB_REQUEST_SET_FEATURE: u8 = 0x03;
pub const USB_REQUEST_SET_ADDRESS: u8 = 0x05;
pub const USB_REQUEST_GET_DESCRIPTOR: u8 = 0x06;
pub const USB_REQUEST_SET_DESCRIPTOR: u8 = 0x07;
pub const USB_REQUEST_GET_CONFIGURATION: u8 = 0x08;
pub const USB_REQUEST_SET_CONFIGURATION: u8 = 0x09;
pub const USB_REQUEST_GET_INTERFACE: u8 = 0x0A;
pub const USB_REQUEST_SET_INTERFACE: u8 = 0x0B;

/// `bmRequestType` type bits.
pub const USB_REQUEST_TYPE_STANDARD: u8 = 0x00 << 5;
pub const USB_REQUEST_TYPE_CLASS: u8 = 0x01 << 5;
pub const USB_REQUEST_TYPE_VENDOR: u8 = 0x02 << 5;

/// `bmRequestType` recipient bits.
pub const USB_RECIPIENT_DEVICE: u8 = 0x00;
pub const USB_RECIPIENT_INTERFACE: u8 = 0x01;
pub const USB_RECIPIENT_ENDPOINT: u8 = 0x02;
pub const USB_RECIPIENT_OTHER: u8 = 0x03;

/// Endpoint transfer type, from `bmAttributes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferType {
    Control = 0,
    Isochronous = 1,
    Bulk = 2,
    Interrupt = 3,
}

/// Endpoint descriptor (7 bytes).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct UsbEndpointDescriptor {
    pub b_length: u8,
    pub b_descriptor_type: u8,
    pub b_endpoint_address: u8,
    pub bm_attributes: u8,
    pub w_max_packet_size: U16,
    pub b_interval: u8,
}

const_assert_eq!(size_of::<UsbEndpointDescriptor>(), 7);

impl UsbEndpointDescriptor {
    /// Returns `true` for a slot that holds no descriptor.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.b_length == 0
    }

    /// Endpoint number without the direction bit.
    #[inline]
    pub fn number(&self) -> u8 {
        self.b_endpoint_address & USB_ENDPOINT_ADDRESS_MASK
    }

    #[inline]
    pub fn is_in(&self) -> bool {
        self.b_endpoint_address & USB_ENDPOINT_IN != 0
    }

    #[inline]
    pub fn transfer_type(&self) -> TransferType {
        match self.bm_attributes & USB_TRANSFER_TYPE_MASK {
            0 => TransferType::Control,
            1 => TransferType::Isochronous,
            2 => TransferType::Bulk,
            _ => TransferType::Interrupt,
        }
    }
}

/// SuperSpeed endpoint companion descriptor (6 bytes).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct UsbSsEndpointCompanionDescriptor {
    pub b_length: u8,
    pub b_descriptor_type: u8,
    pub b_max_burst: u8,
    pub bm_attributes: u8,
    pub w_bytes_per_interval: U16,
}

const_assert_eq!(size_of::<UsbSsEndpointCompanionDescriptor>(), 6);

/// Interface descriptor (9 bytes).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct UsbInterfaceDescriptor {
    pub b_length: u8,
    pub b_descriptor_type: u8,
    pub b_interface_number: u8,
    pub b_alternate_setting: u8,
    pub b_num_endpoints: u8,
    pub b_interface_class: u8,
    pub b_interface_sub_class: u8,
    pub b_interface_protocol: u8,
    pub i_interface: u8,
}

const_assert_eq!(size_of::<UsbInterfaceDescriptor>(), 9);

/// Device descriptor (18 bytes).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct UsbDeviceDescriptor {
    pub b_length: u8,
    pub b_descriptor_type: u8,
    pub bcd_usb: U16,
    pub b_device_class: u8,
    pub b_device_sub_class: u8,
    pub b_device_protocol: u8,
    pub b_max_packet_size0: u8,
    pub id_vendor: U16,
    pub id_product: U16,
    pub bcd_device: U16,
    pub i_manufacturer: u8,
    pub i_product: u8,
    pub i_serial_number: u8,
    pub b_num_configurations: u8,
}

const_assert_eq!(size_of::<UsbDeviceDescriptor>(), 0x12);

/// Configuration descriptor (9 bytes).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct UsbConfigDescriptor {
    pub b_length: u8,
    pub b_descriptor_type: u8,
    pub w_total_length: U16,
    pub b_num_interfaces: u8,
    pub b_configuration_value: u8,
    pub i_configuration: u8,
    pub bm_attributes: u8,
    pub max_power: u8,
}

const_assert_eq!(size_of::<UsbConfigDescriptor>(), 9);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_descriptor_parses_from_wire_bytes() {
        // Bulk IN endpoint 1, 512-byte packets.
        let bytes = [7, USB_DT_ENDPOINT, 0x81, 0x02, 0x00, 0x02, 0];
        let ep = UsbEndpointDescriptor::read_from_bytes(&bytes[..]).unwrap();

        assert!(!ep.is_empty());
        assert!(ep.is_in());
        assert_eq!(ep.number(), 1);
        assert_eq!(ep.transfer_type(), TransferType::Bulk);
        assert_eq!(ep.w_max_packet_size.get(), 512);
    }

    #[test]
    fn device_descriptor_ids_are_little_endian() {
        let mut bytes = [0u8; 18];
        bytes[0] = USB_DT_DEVICE_SIZE;
        bytes[1] = USB_DT_DEVICE;
        bytes[8..10].copy_from_slice(&0x057Eu16.to_le_bytes());
        bytes[10..12].copy_from_slice(&0x2009u16.to_le_bytes());

        let dev = UsbDeviceDescriptor::read_from_bytes(&bytes[..]).unwrap();
        assert_eq!(dev.id_vendor.get(), 0x057E);
        assert_eq!(dev.id_product.get(), 0x2009);
        assert_eq!(dev.as_bytes(), &bytes[..]);
    }

    #[test]
    fn zeroed_slot_is_empty() {
        assert!(UsbEndpointDescriptor::default().is_empty());
    }
}
