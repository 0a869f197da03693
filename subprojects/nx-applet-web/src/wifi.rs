//! WifiWebAuth applet configuration (captive portal login).

use static_assertions::const_assert_eq;
use zerocopy::{
    FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout,
    little_endian::{U32, U128},
};

use crate::error::WebConfigError;

/// Argument storage of the WifiWebAuth applet.
#[derive(Clone, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct WebWifiPageArg {
    pub unk_x0: U32,
    /// Connection-test URL, NUL-terminated.
    pub conntest_url: [u8; 0x100],
    /// Initial URL, NUL-terminated.
    pub initial_url: [u8; 0x400],
    pub user_id: U128,
    pub unk_x514: U32,
}

const_assert_eq!(size_of::<WebWifiPageArg>(), 0x518);

/// Reply popped from the WifiWebAuth applet.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct WebWifiReturnValue {
    pub unk_x0: U32,
    pub result: U32,
}

const_assert_eq!(size_of::<WebWifiReturnValue>(), 8);

impl WebWifiReturnValue {
    #[inline]
    pub fn zeroed() -> Self {
        Self::new_zeroed()
    }

    #[inline]
    pub fn result(&self) -> u32 {
        self.result.get()
    }
}

/// A WifiWebAuth launch configuration.
#[derive(Clone)]
pub struct WebWifiConfig {
    pub(crate) arg: WebWifiPageArg,
}

impl WebWifiConfig {
    /// Creates a config opening `initial_url`. Without `conntest_url`, the
    /// initial URL doubles as the connection-test URL.
    pub fn new(
        conntest_url: Option<&str>,
        initial_url: &str,
        user_id: u128,
        unk_x514: u32,
    ) -> Result<Self, WebConfigError> {
        let mut arg = WebWifiPageArg::new_zeroed();
        copy_cstr(&mut arg.conntest_url, conntest_url.unwrap_or(initial_url))?;
        copy_cstr(&mut arg.initial_url, initial_url)?;
        arg.user_id = U128::new(user_id);
        arg.unk_x514 = U32::new(unk_x514);

        Ok(Self { arg })
    }

    #[inline]
    pub fn arg(&self) -> &WebWifiPageArg {
        &self.arg
    }
}

impl core::fmt::Debug for WebWifiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WebWifiConfig")
            .field("user_id", &self.arg.user_id.get())
            .field("unk_x514", &self.arg.unk_x514.get())
            .finish_non_exhaustive()
    }
}

fn copy_cstr(dst: &mut [u8], src: &str) -> Result<(), WebConfigError> {
    if src.len() >= dst.len() {
        return Err(WebConfigError::StringTooLong {
            ty: None,
            len: src.len(),
            max: dst.len(),
        });
    }
    dst[..src.len()].copy_from_slice(src.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_layout() {
        let config = WebWifiConfig::new(
            Some("http://conntest.example/"),
            "http://portal.example/",
            0x0011_2233_4455_6677_8899_AABB_CCDD_EEFF,
            7,
        )
        .unwrap();

        let bytes = config.arg().as_bytes();
        assert_eq!(&bytes[..4], &[0; 4]);
        assert!(bytes[4..].starts_with(b"http://conntest.example/\0"));
        assert!(bytes[0x104..].starts_with(b"http://portal.example/\0"));
        assert_eq!(bytes[0x504], 0xFF);
        assert_eq!(bytes[0x513], 0x00);
        assert_eq!(bytes[0x512], 0x11);
        assert_eq!(&bytes[0x514..], &7u32.to_le_bytes());
    }

    #[test]
    fn missing_conntest_url_uses_initial_url() {
        let config = WebWifiConfig::new(None, "http://portal.example/", 0, 0).unwrap();
        assert!(config.arg().conntest_url.starts_with(b"http://portal.example/\0"));
    }

    #[test]
    fn oversized_url_is_rejected() {
        let url = [b'a'; 0x100];
        let url = core::str::from_utf8(&url).unwrap();
        assert!(matches!(
            WebWifiConfig::new(Some(url), "http://portal.example/", 0, 0),
            Err(WebConfigError::StringTooLong { max: 0x100, .. })
        ));
    }
}
