//! Launching the web applets.

use nx_libapplet::{LaunchError, LibAppletArgs, launch};
use nx_service_applet::{AppletId, LibraryAppletCreator};
use zerocopy::IntoBytes;

use crate::{
    common::{WebAppletId, WebCommonConfig, WebCommonReturnValue},
    wifi::{WebWifiConfig, WebWifiReturnValue},
};

impl From<WebAppletId> for AppletId {
    fn from(id: WebAppletId) -> Self {
        match id {
            WebAppletId::Web => Self::Web,
            WebAppletId::Shop => Self::Shop,
            WebAppletId::OfflineWeb => Self::OfflineWeb,
            WebAppletId::LoginShare => Self::LoginShare,
            WebAppletId::WifiWebAuth => Self::WifiWebAuth,
        }
    }
}

impl WebCommonConfig {
    /// Runs the applet and blocks until it exits.
    ///
    /// The whole argument storage is pushed. When `out` is given, the
    /// applet's reply is popped into it.
    pub fn show(
        &self,
        creator: &LibraryAppletCreator,
        out: Option<&mut WebCommonReturnValue>,
    ) -> Result<(), LaunchError> {
        let args = LibAppletArgs::new(self.la_version);
        let len = launch(
            creator,
            self.applet_id.into(),
            &args,
            self.arg.as_slice(),
            out.map(|ret| ret.as_mut_bytes()),
        )?;
        log::trace!("web applet reply: {len} bytes");
        Ok(())
    }
}

impl WebWifiConfig {
    /// Runs the WifiWebAuth applet and blocks until it exits.
    pub fn show(
        &self,
        creator: &LibraryAppletCreator,
        out: Option<&mut WebWifiReturnValue>,
    ) -> Result<(), LaunchError> {
        let args = LibAppletArgs::new(0);
        launch(
            creator,
            AppletId::WifiWebAuth,
            &args,
            self.arg.as_bytes(),
            out.map(|ret| ret.as_mut_bytes()),
        )?;
        Ok(())
    }
}
