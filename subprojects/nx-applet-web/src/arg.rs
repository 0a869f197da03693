//! Web applet argument storage.
//!
//! The argument storage is a 0x2000-byte block: a [`WebArgHeader`] followed
//! by `total_entries` TLV entries, each a [`WebArgTlv`] and its payload.
//! Every [`WebArgType`] has a fixed payload size, and an entry is always
//! written at that size.

use static_assertions::const_assert_eq;
use zerocopy::{
    FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout,
    little_endian::{U16, U32},
};

use crate::error::WebConfigError;

/// Size of [`WebCommonTlvStorage`].
pub const WEB_ARG_STORAGE_SIZE: usize = 0x2000;

/// Which flavour of the web applet the storage configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum WebShimKind {
    Login = 2,
    Share = 4,
    Web = 5,
    Wifi = 6,
    Lobby = 7,
}

/// Payload shape of a [`WebArgType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebArgKind {
    /// NUL-terminated string in a buffer of the given size.
    String(u16),
    Bool,
    U8,
    U32,
    S32,
    /// Opaque bytes; shorter input is zero-filled.
    Bytes(u16),
}

impl WebArgKind {
    #[inline]
    pub const fn size(self) -> u16 {
        match self {
            Self::String(size) | Self::Bytes(size) => size,
            Self::Bool | Self::U8 => 1,
            Self::U32 | Self::S32 => 4,
        }
    }
}

/// TLV entry types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum WebArgType {
    /// Initial URL.
    Url = 0x1,
    CallbackUrl = 0x3,
    CallbackableUrl = 0x4,
    ShareStartPage = 0x9,
    /// One regex per line, each matching a URL the applet may open.
    Whitelist = 0xA,
    NewsFlag = 0xB,
    UnknownD = 0xD,
    /// Selects the user whose savedata the applet mounts.
    UserId = 0xE,
    AlbumEntry = 0xF,
    EcClientCertEnabled = 0x11,
    Unknown12 = 0x12,
    PlayReportEnabled = 0x13,
    Unknown14 = 0x14,
    Unknown15 = 0x15,
    BootDisplayKind = 0x17,
    BackgroundKind = 0x18,
    FooterEnabled = 0x19,
    PointerEnabled = 0x1A,
    LeftStickMode = 0x1B,
    KeyRepeatFrame0 = 0x1C,
    KeyRepeatFrame1 = 0x1D,
    BootAsMediaPlayerInverted = 0x1E,
    DisplayUrlKind = 0x1F,
    BootAsMediaPlayer = 0x21,
    ShopJumpEnabled = 0x22,
    MediaPlayerUserGestureRestrictionEnabled = 0x23,
    LobbyParameter = 0x24,
    ApplicationAlbumEntry = 0x26,
    JsExtensionEnabled = 0x27,
    AdditionalCommentText = 0x28,
    TouchEnabledOnContents = 0x29,
    UserAgentAdditionalString = 0x2A,
    AdditionalMediaData = 0x2B,
    MediaPlayerAutoCloseEnabled = 0x2C,
    PageCacheEnabled = 0x2D,
    WebAudioEnabled = 0x2E,
    Unknown2F = 0x2F,
    YouTubeVideoFlag = 0x31,
    FooterFixedKind = 0x32,
    PageFadeEnabled = 0x33,
    MediaCreatorApplicationRatingAge = 0x34,
    BootLoadingIconEnabled = 0x35,
    PageScrollIndicatorEnabled = 0x36,
}

impl WebArgType {
    #[inline]
    pub const fn to_raw(self) -> u16 {
        self as u16
    }

    pub const fn kind(self) -> WebArgKind {
        use WebArgKind::*;

        match self {
            Self::Url => String(0xC00),
            Self::CallbackUrl | Self::CallbackableUrl => String(0x400),
            Self::Whitelist => String(0x1000),
            Self::LobbyParameter | Self::AdditionalCommentText => String(0x100),
            Self::UserAgentAdditionalString => String(0x80),

            Self::ShareStartPage
            | Self::BootDisplayKind
            | Self::BackgroundKind
            | Self::LeftStickMode
            | Self::FooterFixedKind => U32,

            Self::KeyRepeatFrame0 | Self::KeyRepeatFrame1 => S32,

            Self::UnknownD | Self::Unknown12 | Self::Unknown14 | Self::Unknown15 | Self::Unknown2F => {
                U8
            }

            Self::UserId | Self::AdditionalMediaData => Bytes(0x10),
            Self::AlbumEntry => Bytes(0x18),
            Self::ApplicationAlbumEntry | Self::MediaCreatorApplicationRatingAge => Bytes(0x20),

            Self::NewsFlag
            | Self::EcClientCertEnabled
            | Self::PlayReportEnabled
            | Self::FooterEnabled
            | Self::PointerEnabled
            | Self::BootAsMediaPlayerInverted
            | Self::DisplayUrlKind
            | Self::BootAsMediaPlayer
            | Self::ShopJumpEnabled
            | Self::MediaPlayerUserGestureRestrictionEnabled
            | Self::JsExtensionEnabled
            | Self::TouchEnabledOnContents
            | Self::MediaPlayerAutoCloseEnabled
            | Self::PageCacheEnabled
            | Self::WebAudioEnabled
            | Self::YouTubeVideoFlag
            | Self::PageFadeEnabled
            | Self::BootLoadingIconEnabled
            | Self::PageScrollIndicatorEnabled => Bool,
        }
    }

    /// Payload size of every entry of this type.
    #[inline]
    pub const fn fixed_size(self) -> u16 {
        self.kind().size()
    }
}

/// Header at offset 0 of the argument storage.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct WebArgHeader {
    pub total_entries: U16,
    pub pad: U16,
    pub shim_kind: U32,
}

const_assert_eq!(size_of::<WebArgHeader>(), 8);

/// Header of one TLV entry.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct WebArgTlv {
    pub ty: U16,
    pub size: U16,
    pub pad: [u8; 4],
}

const_assert_eq!(size_of::<WebArgTlv>(), 8);

const HEADER_SIZE: usize = size_of::<WebArgHeader>();
const TLV_SIZE: usize = size_of::<WebArgTlv>();

/// The TLV argument storage pushed to the web applet.
#[derive(Clone, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct WebCommonTlvStorage {
    data: [u8; WEB_ARG_STORAGE_SIZE],
}

const_assert_eq!(size_of::<WebCommonTlvStorage>(), WEB_ARG_STORAGE_SIZE);

impl WebCommonTlvStorage {
    /// Returns an empty storage for `shim_kind`.
    pub fn new(shim_kind: WebShimKind) -> Self {
        let mut storage = Self::new_zeroed();
        let header = WebArgHeader {
            total_entries: U16::new(0),
            pad: U16::new(0),
            shim_kind: U32::new(shim_kind as u32),
        };
        storage.data[..HEADER_SIZE].copy_from_slice(header.as_bytes());
        storage
    }

    pub fn header(&self) -> WebArgHeader {
        let mut header = WebArgHeader::new_zeroed();
        header.as_mut_bytes().copy_from_slice(&self.data[..HEADER_SIZE]);
        header
    }

    #[inline]
    pub fn total_entries(&self) -> u16 {
        self.header().total_entries.get()
    }

    /// Raw storage bytes, as pushed to the applet.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    fn read_tlv(&self, offset: usize) -> Option<WebArgTlv> {
        let bytes = self.data.get(offset..offset + TLV_SIZE)?;
        WebArgTlv::read_from_bytes(bytes).ok()
    }

    /// Walks the entries; returns `(tlv_offset, tlv)` of the entry of type
    /// `ty` if present, and the offset just past the last entry.
    fn scan(&self, ty: WebArgType) -> Result<(Option<(usize, WebArgTlv)>, usize), WebConfigError> {
        let mut offset = HEADER_SIZE;
        for _ in 0..self.total_entries() {
            let tlv = self.read_tlv(offset).ok_or(WebConfigError::Corrupt)?;
            if tlv.ty.get() == ty.to_raw() {
                return Ok((Some((offset, tlv)), offset));
            }
            offset += TLV_SIZE + usize::from(tlv.size.get());
            if offset > WEB_ARG_STORAGE_SIZE {
                return Err(WebConfigError::Corrupt);
            }
        }
        Ok((None, offset))
    }

    /// Returns the payload of the entry of type `ty`.
    pub fn find(&self, ty: WebArgType) -> Option<&[u8]> {
        let (Some((offset, tlv)), _) = self.scan(ty).ok()? else {
            return None;
        };
        let start = offset + TLV_SIZE;
        self.data.get(start..start + usize::from(tlv.size.get()))
    }

    /// Writes `payload` as the entry of type `ty`, zero-filling it to the
    /// type's fixed size.
    ///
    /// An existing entry is overwritten in place; otherwise a new one is
    /// appended. On error the storage is left unchanged.
    pub fn set(&mut self, ty: WebArgType, payload: &[u8]) -> Result<(), WebConfigError> {
        let size = ty.fixed_size();
        let size_usize = usize::from(size);
        if payload.len() > size_usize {
            return Err(WebConfigError::PayloadTooLarge {
                ty,
                len: payload.len(),
                max: size_usize,
            });
        }

        let payload_offset = match self.scan(ty)? {
            (Some((offset, tlv)), _) => {
                if tlv.size.get() != size {
                    return Err(WebConfigError::SizeMismatch {
                        ty,
                        stored: tlv.size.get(),
                    });
                }
                if offset + TLV_SIZE + size_usize > WEB_ARG_STORAGE_SIZE {
                    return Err(WebConfigError::Corrupt);
                }
                offset + TLV_SIZE
            }
            (None, end) => {
                if end + TLV_SIZE + size_usize > WEB_ARG_STORAGE_SIZE {
                    return Err(WebConfigError::OutOfSpace { ty });
                }
                let total = self.total_entries();
                let total = total.checked_add(1).ok_or(WebConfigError::OutOfSpace { ty })?;

                let tlv = WebArgTlv {
                    ty: U16::new(ty.to_raw()),
                    size: U16::new(size),
                    pad: [0; 4],
                };
                self.data[end..end + TLV_SIZE].copy_from_slice(tlv.as_bytes());
                self.data[..2].copy_from_slice(&total.to_le_bytes());
                end + TLV_SIZE
            }
        };

        let dst = &mut self.data[payload_offset..payload_offset + size_usize];
        dst[..payload.len()].copy_from_slice(payload);
        dst[payload.len()..].fill(0);

        log::trace!("web arg {ty:?}: {} of {size} bytes", payload.len());
        Ok(())
    }
}

impl core::fmt::Debug for WebCommonTlvStorage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let header = self.header();
        f.debug_struct("WebCommonTlvStorage")
            .field("total_entries", &header.total_entries.get())
            .field("shim_kind", &header.shim_kind.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_sizes() {
        assert_eq!(WebArgType::Url.fixed_size(), 0xC00);
        assert_eq!(WebArgType::CallbackUrl.fixed_size(), 0x400);
        assert_eq!(WebArgType::Whitelist.fixed_size(), 0x1000);
        assert_eq!(WebArgType::UserAgentAdditionalString.fixed_size(), 0x80);
        assert_eq!(WebArgType::DisplayUrlKind.fixed_size(), 1);
        assert_eq!(WebArgType::BootDisplayKind.fixed_size(), 4);
        assert_eq!(WebArgType::KeyRepeatFrame1.kind(), WebArgKind::S32);
        assert_eq!(WebArgType::UserId.fixed_size(), 0x10);
    }

    #[test]
    fn new_storage_has_header_only() {
        let storage = WebCommonTlvStorage::new(WebShimKind::Web);
        assert_eq!(storage.total_entries(), 0);
        assert_eq!(&storage.as_slice()[4..8], &5u32.to_le_bytes());
        assert!(storage.find(WebArgType::Url).is_none());
    }

    #[test]
    fn append_then_overwrite_in_place() {
        let mut storage = WebCommonTlvStorage::new(WebShimKind::Web);
        storage.set(WebArgType::FooterEnabled, &[1]).unwrap();
        storage.set(WebArgType::BootDisplayKind, &3u32.to_le_bytes()).unwrap();
        assert_eq!(storage.total_entries(), 2);

        // First entry right after the header, second after it.
        let data = storage.as_slice();
        assert_eq!(&data[8..10], &0x19u16.to_le_bytes());
        assert_eq!(&data[10..12], &1u16.to_le_bytes());
        assert_eq!(data[16], 1);
        assert_eq!(&data[17..19], &0x17u16.to_le_bytes());

        storage.set(WebArgType::FooterEnabled, &[0]).unwrap();
        assert_eq!(storage.total_entries(), 2);
        assert_eq!(storage.find(WebArgType::FooterEnabled), Some(&[0u8][..]));
        assert_eq!(
            storage.find(WebArgType::BootDisplayKind),
            Some(&3u32.to_le_bytes()[..])
        );
    }

    #[test]
    fn short_payload_is_zero_filled() {
        let mut storage = WebCommonTlvStorage::new(WebShimKind::Share);
        storage.set(WebArgType::AdditionalMediaData, &[0xAA; 0x10]).unwrap();
        storage.set(WebArgType::AdditionalMediaData, &[0xBB; 4]).unwrap();

        let payload = storage.find(WebArgType::AdditionalMediaData).unwrap();
        assert_eq!(payload.len(), 0x10);
        assert_eq!(&payload[..4], &[0xBB; 4]);
        assert!(payload[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn full_storage_is_left_unchanged() {
        let mut storage = WebCommonTlvStorage::new(WebShimKind::Web);
        storage.set(WebArgType::Whitelist, b"a").unwrap(); // ends at 0x1010
        storage.set(WebArgType::Url, b"b").unwrap(); // ends at 0x1C18

        // 0x1C18 + 8 + 0x400 > 0x2000
        let snapshot = storage.as_slice().to_vec();
        assert!(matches!(
            storage.set(WebArgType::CallbackUrl, b"c"),
            Err(WebConfigError::OutOfSpace { .. })
        ));
        assert_eq!(storage.as_slice(), &snapshot[..]);
        assert_eq!(storage.total_entries(), 2);

        // Existing entries can still be overwritten, and small ones still fit.
        storage.set(WebArgType::Url, b"d").unwrap();
        storage.set(WebArgType::LobbyParameter, b"e").unwrap();
        assert_eq!(storage.total_entries(), 3);
        assert_eq!(storage.find(WebArgType::Url).unwrap()[0], b'd');
    }

    #[test]
    fn entry_running_past_the_end_is_corrupt() {
        let mut storage = WebCommonTlvStorage::new(WebShimKind::Web);
        let entries = [
            (WebArgType::FooterEnabled, 0x1FE0u16, HEADER_SIZE),
            (WebArgType::Url, 0xC00, 0x1FF0),
        ];
        for (ty, size, offset) in entries {
            let tlv = WebArgTlv {
                ty: U16::new(ty.to_raw()),
                size: U16::new(size),
                pad: [0; 4],
            };
            storage.data[offset..offset + TLV_SIZE].copy_from_slice(tlv.as_bytes());
        }
        storage.data[..2].copy_from_slice(&2u16.to_le_bytes());

        let snapshot = storage.as_slice().to_vec();
        assert_eq!(storage.set(WebArgType::Url, b"x"), Err(WebConfigError::Corrupt));
        assert_eq!(storage.as_slice(), &snapshot[..]);
        assert!(storage.find(WebArgType::Url).is_none());
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let mut storage = WebCommonTlvStorage::new(WebShimKind::Web);
        assert!(matches!(
            storage.set(WebArgType::UserId, &[0; 0x11]),
            Err(WebConfigError::PayloadTooLarge { max: 0x10, .. })
        ));
        assert_eq!(storage.total_entries(), 0);
    }
}
