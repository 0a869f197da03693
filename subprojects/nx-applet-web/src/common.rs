//! Web page configuration and its reply.

use nx_rt_env::hos_version::{self, HosVersion};
use static_assertions::const_assert_eq;
use zerocopy::{
    FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout,
    little_endian::{U32, U64},
};

use crate::{
    arg::{WebArgKind, WebArgType, WebCommonTlvStorage, WebShimKind},
    error::WebConfigError,
};

/// Library applets driven by a [`WebCommonConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum WebAppletId {
    Web = 0x13,
    Shop = 0x14,
    OfflineWeb = 0x17,
    LoginShare = 0x18,
    WifiWebAuth = 0x19,
}

/// Argument layout version the web applet expects on `version`.
pub const fn web_la_version(version: HosVersion) -> u32 {
    if version.at_least(5, 0, 0) {
        0x50000
    } else if version.at_least(4, 0, 0) {
        0x40000
    } else if version.at_least(3, 0, 0) {
        0x30000
    } else {
        0x20000
    }
}

/// A web applet launch configuration.
///
/// Holds the TLV argument storage pushed to the applet along with the
/// applet to launch and its argument layout version.
#[derive(Debug, Clone)]
pub struct WebCommonConfig {
    pub(crate) arg: WebCommonTlvStorage,
    pub(crate) applet_id: WebAppletId,
    pub(crate) la_version: u32,
    hos_version: HosVersion,
}

impl WebCommonConfig {
    /// Creates a config that opens `url` in the web applet.
    pub fn new_page(url: &str) -> Result<Self, WebConfigError> {
        Self::new_page_for(url, hos_version::get())
    }

    /// Like [`new_page`](Self::new_page), for an explicit system version.
    pub fn new_page_for(url: &str, version: HosVersion) -> Result<Self, WebConfigError> {
        let mut config = Self {
            arg: WebCommonTlvStorage::new(WebShimKind::Web),
            applet_id: WebAppletId::Web,
            la_version: web_la_version(version),
            hos_version: version,
        };
        config.set_string(WebArgType::Url, url)?;
        Ok(config)
    }

    #[inline]
    pub fn applet_id(&self) -> WebAppletId {
        self.applet_id
    }

    #[inline]
    pub fn la_version(&self) -> u32 {
        self.la_version
    }

    #[inline]
    pub fn storage(&self) -> &WebCommonTlvStorage {
        &self.arg
    }

    /// Returns the stored payload of `ty`, if set.
    #[inline]
    pub fn find(&self, ty: WebArgType) -> Option<&[u8]> {
        self.arg.find(ty)
    }

    pub fn set_callback_url(&mut self, url: &str) -> Result<(), WebConfigError> {
        self.set_string(WebArgType::CallbackUrl, url)
    }

    pub fn set_callbackable_url(&mut self, url: &str) -> Result<(), WebConfigError> {
        self.set_string(WebArgType::CallbackableUrl, url)
    }

    /// Sets the whitelist: one regex per line, each matching a URL the
    /// applet may navigate to.
    pub fn set_whitelist(&mut self, whitelist: &str) -> Result<(), WebConfigError> {
        self.set_string(WebArgType::Whitelist, whitelist)
    }

    /// Shows the current URL in the applet's footer.
    pub fn set_display_url_kind(&mut self, flag: bool) -> Result<(), WebConfigError> {
        self.set_bool(WebArgType::DisplayUrlKind, flag)
    }

    /// Appends `value` to the applet's user agent. Requires 4.0.0+.
    pub fn set_user_agent_additional_string(&mut self, value: &str) -> Result<(), WebConfigError> {
        const REQUIRED: HosVersion = HosVersion::new(4, 0, 0);

        if !self.hos_version.at_least(4, 0, 0) {
            return Err(WebConfigError::IncompatibleVersion {
                required: REQUIRED,
                current: self.hos_version,
            });
        }
        self.set_string(WebArgType::UserAgentAdditionalString, value)
    }

    pub fn set_bool(&mut self, ty: WebArgType, value: bool) -> Result<(), WebConfigError> {
        self.expect_kind(ty, |kind| kind == WebArgKind::Bool)?;
        self.arg.set(ty, &[u8::from(value)])
    }

    /// Sets a one-byte argument; boolean arguments are accepted as well.
    pub fn set_u8(&mut self, ty: WebArgType, value: u8) -> Result<(), WebConfigError> {
        self.expect_kind(ty, |kind| matches!(kind, WebArgKind::U8 | WebArgKind::Bool))?;
        self.arg.set(ty, &[value])
    }

    pub fn set_u32(&mut self, ty: WebArgType, value: u32) -> Result<(), WebConfigError> {
        self.expect_kind(ty, |kind| kind == WebArgKind::U32)?;
        self.arg.set(ty, &value.to_le_bytes())
    }

    pub fn set_s32(&mut self, ty: WebArgType, value: i32) -> Result<(), WebConfigError> {
        self.expect_kind(ty, |kind| kind == WebArgKind::S32)?;
        self.arg.set(ty, &value.to_le_bytes())
    }

    /// Stores `value` NUL-terminated; the rest of the field is zeroed.
    pub fn set_string(&mut self, ty: WebArgType, value: &str) -> Result<(), WebConfigError> {
        self.expect_kind(ty, |kind| matches!(kind, WebArgKind::String(_)))?;

        let max = usize::from(ty.fixed_size());
        if value.len() >= max {
            return Err(WebConfigError::StringTooLong {
                ty: Some(ty),
                len: value.len(),
                max,
            });
        }
        self.arg.set(ty, value.as_bytes())
    }

    /// Stores raw bytes, zero-filled to the type's size.
    pub fn set_bytes(&mut self, ty: WebArgType, value: &[u8]) -> Result<(), WebConfigError> {
        self.expect_kind(ty, |kind| matches!(kind, WebArgKind::Bytes(_)))?;
        self.arg.set(ty, value)
    }

    fn expect_kind(
        &self,
        ty: WebArgType,
        accept: impl FnOnce(WebArgKind) -> bool,
    ) -> Result<(), WebConfigError> {
        let kind = ty.kind();
        if accept(kind) {
            Ok(())
        } else {
            Err(WebConfigError::WrongKind { ty, kind })
        }
    }
}

/// Size of the URL buffer in [`WebCommonReturnValue`].
pub const WEB_LAST_URL_SIZE: usize = 0x1000;

/// Reply popped from the web applet.
#[derive(Clone, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct WebCommonReturnValue {
    pub exit_reason: U32,
    pub pad: U32,
    pub last_url: [u8; WEB_LAST_URL_SIZE],
    pub last_url_size: U64,
}

const_assert_eq!(size_of::<WebCommonReturnValue>(), 0x1010);

impl WebCommonReturnValue {
    #[inline]
    pub fn zeroed() -> Self {
        Self::new_zeroed()
    }

    #[inline]
    pub fn exit_reason(&self) -> u32 {
        self.exit_reason.get()
    }

    /// The last URL the applet visited, `last_url_size` bytes long.
    pub fn last_url(&self) -> &[u8] {
        let len = usize::try_from(self.last_url_size.get())
            .unwrap_or(WEB_LAST_URL_SIZE)
            .min(WEB_LAST_URL_SIZE);
        &self.last_url[..len]
    }
}

impl core::fmt::Debug for WebCommonReturnValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WebCommonReturnValue")
            .field("exit_reason", &self.exit_reason())
            .field("last_url", &core::str::from_utf8(self.last_url()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V5: HosVersion = HosVersion::new(5, 1, 0);

    #[test]
    fn la_version_follows_system_version() {
        assert_eq!(web_la_version(HosVersion::new(1, 0, 0)), 0x20000);
        assert_eq!(web_la_version(HosVersion::new(2, 3, 0)), 0x20000);
        assert_eq!(web_la_version(HosVersion::new(3, 0, 0)), 0x30000);
        assert_eq!(web_la_version(HosVersion::new(4, 1, 0)), 0x40000);
        assert_eq!(web_la_version(HosVersion::new(9, 0, 0)), 0x50000);
    }

    #[test]
    fn new_page_stores_url() {
        let config = WebCommonConfig::new_page_for("https://example.com/", V5).unwrap();

        assert_eq!(config.applet_id(), WebAppletId::Web);
        assert_eq!(config.la_version(), 0x50000);
        assert_eq!(config.storage().total_entries(), 1);

        let url = config.find(WebArgType::Url).unwrap();
        assert_eq!(url.len(), 0xC00);
        assert_eq!(&url[..20], b"https://example.com/");
        assert!(url[20..].iter().all(|&b| b == 0));
    }

    #[test]
    fn string_must_leave_room_for_nul() {
        let long = [b'a'; 0x80];
        let long = core::str::from_utf8(&long).unwrap();
        let mut config = WebCommonConfig::new_page_for("https://example.com/", V5).unwrap();

        assert!(matches!(
            config.set_user_agent_additional_string(long),
            Err(WebConfigError::StringTooLong { max: 0x80, .. })
        ));
        config
            .set_user_agent_additional_string(&long[..0x7F])
            .unwrap();
        assert_eq!(config.storage().total_entries(), 2);
    }

    #[test]
    fn user_agent_requires_4_0_0() {
        let mut config =
            WebCommonConfig::new_page_for("https://example.com/", HosVersion::new(3, 0, 2)).unwrap();
        assert!(matches!(
            config.set_user_agent_additional_string("x"),
            Err(WebConfigError::IncompatibleVersion { .. })
        ));
        assert!(config.find(WebArgType::UserAgentAdditionalString).is_none());
    }

    #[test]
    fn setters_check_kind() {
        let mut config = WebCommonConfig::new_page_for("https://example.com/", V5).unwrap();

        assert!(matches!(
            config.set_u32(WebArgType::FooterEnabled, 1),
            Err(WebConfigError::WrongKind { .. })
        ));
        assert!(matches!(
            config.set_string(WebArgType::BootDisplayKind, "1"),
            Err(WebConfigError::WrongKind { .. })
        ));

        config.set_u8(WebArgType::FooterEnabled, 1).unwrap();
        config.set_s32(WebArgType::KeyRepeatFrame0, -3).unwrap();
        config.set_display_url_kind(true).unwrap();
        assert_eq!(config.find(WebArgType::KeyRepeatFrame0), Some(&(-3i32).to_le_bytes()[..]));
        assert_eq!(config.find(WebArgType::DisplayUrlKind), Some(&[1u8][..]));
    }

    #[test]
    fn overwriting_a_setting_keeps_one_entry() {
        let mut config = WebCommonConfig::new_page_for("https://example.com/", V5).unwrap();
        config.set_whitelist("^http*").unwrap();
        config.set_whitelist("^https://example\\.com/.*").unwrap();
        config.set_callback_url("http://localhost/").unwrap();

        assert_eq!(config.storage().total_entries(), 3);
        let whitelist = config.find(WebArgType::Whitelist).unwrap();
        assert!(whitelist.starts_with(b"^https://example\\.com/.*\0"));
    }

    #[test]
    fn last_url_is_clamped() {
        let mut ret = WebCommonReturnValue::zeroed();
        ret.last_url[..5].copy_from_slice(b"http:");
        ret.last_url_size = U64::new(5);
        assert_eq!(ret.last_url(), b"http:");

        ret.last_url_size = U64::new(u64::MAX);
        assert_eq!(ret.last_url().len(), WEB_LAST_URL_SIZE);
    }
}
