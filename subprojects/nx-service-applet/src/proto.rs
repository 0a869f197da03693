//! Protocol constants and types for the applet service.
//!
//! This module defines the service names, command IDs, and data types used
//! for communicating with the Horizon OS Applet Manager (AM) service.

use nx_sf::ServiceName;
use static_assertions::const_assert_eq;

/// Service name for application applets (`appletOE`).
///
/// Used by `AppletType::Application`.
pub const SERVICE_NAME_OE: ServiceName = ServiceName::from_static("appletOE");

/// Service name for other applet types (`appletAE`).
pub const SERVICE_NAME_AE: ServiceName = ServiceName::from_static("appletAE");

/// Command ID for OpenApplicationProxy (AppletType::Application)
pub const CMD_OPEN_APPLICATION_PROXY: u32 = 0;

/// Command ID for OpenSystemAppletProxy (AppletType::SystemApplet)
pub const CMD_OPEN_SYSTEM_APPLET_PROXY: u32 = 100;

/// Command ID for OpenLibraryAppletProxy (AppletType::LibraryApplet)
pub const CMD_OPEN_LIBRARY_APPLET_PROXY: u32 = 200;

/// Command ID for OpenOverlayAppletProxy (AppletType::OverlayApplet)
pub const CMD_OPEN_OVERLAY_APPLET_PROXY: u32 = 300;

/// Command ID for OpenSystemApplicationProxy (AppletType::SystemApplication)
pub const CMD_OPEN_SYSTEM_APPLICATION_PROXY: u32 = 350;

/// Command ID for GetLibraryAppletCreator (all proxies)
pub const CMD_GET_LIBRARY_APPLET_CREATOR: u32 = 11;

/// ILibraryAppletCreator commands.
pub const CMD_LAC_CREATE_LIBRARY_APPLET: u32 = 0;
pub const CMD_LAC_CREATE_STORAGE: u32 = 10;

/// ILibraryAppletAccessor commands.
pub const CMD_LAA_GET_APPLET_STATE_CHANGED_EVENT: u32 = 0;
pub const CMD_LAA_IS_COMPLETED: u32 = 1;
pub const CMD_LAA_START: u32 = 10;
pub const CMD_LAA_REQUEST_EXIT: u32 = 20;
pub const CMD_LAA_GET_RESULT: u32 = 30;
pub const CMD_LAA_PUSH_IN_DATA: u32 = 100;
pub const CMD_LAA_POP_OUT_DATA: u32 = 101;

/// IStorage commands.
pub const CMD_STORAGE_OPEN: u32 = 0;

/// IStorageAccessor commands.
pub const CMD_SA_GET_SIZE: u32 = 0;
pub const CMD_SA_WRITE: u32 = 10;
pub const CMD_SA_READ: u32 = 11;

/// Applet type determining which service and proxy to use.
///
/// This value controls whether the applet connects to `appletOE` or `appletAE`,
/// and which proxy command is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum AppletType {
    /// No applet service.
    None = -2,
    /// Default type (treated as Application).
    #[default]
    Default = -1,
    /// Main application applet. Uses `appletOE` service.
    Application = 0,
    /// System applet (e.g., qlaunch). Uses `appletAE` service.
    SystemApplet = 1,
    /// Library applet. Uses `appletAE` service.
    LibraryApplet = 2,
    /// Overlay applet. Uses `appletAE` service.
    OverlayApplet = 3,
    /// System application. Uses `appletAE` service.
    SystemApplication = 4,
}

impl AppletType {
    /// Resolves [`Default`](Self::Default) to [`Application`](Self::Application).
    #[inline]
    pub const fn resolve(self) -> Self {
        match self {
            Self::Default => Self::Application,
            other => other,
        }
    }

    /// Returns true if this applet type uses `appletOE` service.
    #[inline]
    pub const fn uses_applet_oe(self) -> bool {
        matches!(self.resolve(), Self::Application)
    }

    /// Proxy command for this type, or `None` for [`AppletType::None`].
    #[inline]
    pub const fn open_proxy_cmd(self) -> Option<u32> {
        match self.resolve() {
            Self::Application => Some(CMD_OPEN_APPLICATION_PROXY),
            Self::SystemApplet => Some(CMD_OPEN_SYSTEM_APPLET_PROXY),
            Self::LibraryApplet => Some(CMD_OPEN_LIBRARY_APPLET_PROXY),
            Self::OverlayApplet => Some(CMD_OPEN_OVERLAY_APPLET_PROXY),
            Self::SystemApplication => Some(CMD_OPEN_SYSTEM_APPLICATION_PROXY),
            Self::None | Self::Default => None,
        }
    }
}

/// Library applet program IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AppletId {
    OverlayDisp = 0x02,
    Qlaunch = 0x03,
    Starter = 0x04,
    Auth = 0x0A,
    Cabinet = 0x0B,
    Controller = 0x0C,
    DataErase = 0x0D,
    Error = 0x0E,
    NetConnect = 0x0F,
    PlayerSelect = 0x10,
    Swkbd = 0x11,
    MiiEdit = 0x12,
    Web = 0x13,
    Shop = 0x14,
    PhotoViewer = 0x15,
    Set = 0x16,
    OfflineWeb = 0x17,
    LoginShare = 0x18,
    WifiWebAuth = 0x19,
    MyPage = 0x1A,
}

/// How a library applet is presented relative to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum LibAppletMode {
    /// Foreground, taking over the whole screen.
    #[default]
    AllForeground = 0,
    Background = 1,
    NoUi = 2,
    BackgroundIndirect = 3,
    /// Foreground, but not shown until the applet requests it.
    AllForegroundInitiallyHidden = 4,
}

/// Input of CreateLibraryApplet.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct CreateLibraryAppletIn {
    pub applet_id: u32,
    pub mode: u32,
}

const_assert_eq!(size_of::<CreateLibraryAppletIn>(), 8);

