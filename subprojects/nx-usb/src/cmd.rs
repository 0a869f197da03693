//! `usb:hs` command IDs.
//!
//! 2.0.0 inserted `BindClientProcess` at the front of `IClientRootSession` and
//! shuffled `IClientIfSession`, so most IDs depend on the running version.

use nx_rt_env::HosVersion;

/// Returns `true` if `version` uses the 2.0.0+ command layout.
#[inline]
const fn is_v2(version: HosVersion) -> bool {
    version.at_least(2, 0, 0)
}

/// Command IDs of `IClientRootSession` (`usb:hs`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootCommandIds {
    v2: bool,
}

impl RootCommandIds {
    #[inline]
    pub const fn new(version: HosVersion) -> Self {
        Self {
            v2: is_v2(version),
        }
    }

    /// `BindClientProcess`, only present since 2.0.0.
    #[inline]
    pub const fn bind_client_process(self) -> Option<u32> {
        if self.v2 { Some(0) } else { None }
    }

    #[inline]
    pub const fn query_all_interfaces(self) -> u32 {
        self.shifted(0)
    }

    #[inline]
    pub const fn query_available_interfaces(self) -> u32 {
        self.shifted(1)
    }

    #[inline]
    pub const fn query_acquired_interfaces(self) -> u32 {
        self.shifted(2)
    }

    #[inline]
    pub const fn create_interface_available_event(self) -> u32 {
        self.shifted(3)
    }

    #[inline]
    pub const fn destroy_interface_available_event(self) -> u32 {
        self.shifted(4)
    }

    #[inline]
    pub const fn get_interface_state_change_event(self) -> u32 {
        self.shifted(5)
    }

    #[inline]
    pub const fn acquire_usb_if(self) -> u32 {
        self.shifted(6)
    }

    #[inline]
    const fn shifted(self, v1: u32) -> u32 {
        if self.v2 { v1 + 1 } else { v1 }
    }
}

/// Control transfer command selection for an interface session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlXferCommand {
    /// 1.x: a single synchronous command, which differs per direction.
    Sync { cmd: u32 },
    /// 2.0.0+: submit, wait on the completion event, then fetch the report.
    Async { submit: u32, report: u32 },
}

/// Command IDs of `IClientIfSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfCommandIds {
    v2: bool,
}

impl IfCommandIds {
    pub const GET_STATE_CHANGE_EVENT: u32 = 0;
    pub const SET_INTERFACE: u32 = 1;
    pub const GET_INTERFACE: u32 = 2;
    pub const GET_ALTERNATE_INTERFACE: u32 = 3;
    pub const RESET_DEVICE: u32 = 8;

    #[inline]
    pub const fn new(version: HosVersion) -> Self {
        Self {
            v2: is_v2(version),
        }
    }

    #[inline]
    pub const fn is_v2(self) -> bool {
        self.v2
    }

    #[inline]
    pub const fn get_current_frame(self) -> u32 {
        if self.v2 { 4 } else { 5 }
    }

    /// `GetCtrlXferCompletionEvent`, only present since 2.0.0.
    #[inline]
    pub const fn get_ctrl_xfer_completion_event(self) -> Option<u32> {
        if self.v2 { Some(6) } else { None }
    }

    /// Control transfer commands for a request in direction `is_in`.
    #[inline]
    pub const fn ctrl_xfer(self, is_in: bool) -> CtrlXferCommand {
        if self.v2 {
            CtrlXferCommand::Async {
                submit: 5,
                report: 7,
            }
        } else if is_in {
            CtrlXferCommand::Sync { cmd: 6 }
        } else {
            CtrlXferCommand::Sync { cmd: 7 }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1: HosVersion = HosVersion::new(1, 0, 0);
    const V2: HosVersion = HosVersion::new(2, 0, 0);

    #[test]
    fn root_ids_before_2_0_0() {
        let ids = RootCommandIds::new(V1);
        assert_eq!(ids.bind_client_process(), None);
        assert_eq!(ids.query_all_interfaces(), 0);
        assert_eq!(ids.query_available_interfaces(), 1);
        assert_eq!(ids.query_acquired_interfaces(), 2);
        assert_eq!(ids.create_interface_available_event(), 3);
        assert_eq!(ids.destroy_interface_available_event(), 4);
        assert_eq!(ids.get_interface_state_change_event(), 5);
        assert_eq!(ids.acquire_usb_if(), 6);
    }

    #[test]
    fn root_ids_since_2_0_0() {
        let ids = RootCommandIds::new(HosVersion::new(17, 0, 1).with_atmosphere());
        assert_eq!(ids.bind_client_process(), Some(0));
        assert_eq!(ids.query_all_interfaces(), 1);
        assert_eq!(ids.query_available_interfaces(), 2);
        assert_eq!(ids.query_acquired_interfaces(), 3);
        assert_eq!(ids.create_interface_available_event(), 4);
        assert_eq!(ids.destroy_interface_available_event(), 5);
        assert_eq!(ids.get_interface_state_change_event(), 6);
        assert_eq!(ids.acquire_usb_if(), 7);
    }

    #[test]
    fn if_ids_by_version() {
        let v1 = IfCommandIds::new(V1);
        assert_eq!(v1.get_current_frame(), 5);
        assert_eq!(v1.get_ctrl_xfer_completion_event(), None);
        assert_eq!(v1.ctrl_xfer(true), CtrlXferCommand::Sync { cmd: 6 });
        assert_eq!(v1.ctrl_xfer(false), CtrlXferCommand::Sync { cmd: 7 });

        let v2 = IfCommandIds::new(V2);
        assert_eq!(v2.get_current_frame(), 4);
        assert_eq!(v2.get_ctrl_xfer_completion_event(), Some(6));
        assert_eq!(
            v2.ctrl_xfer(false),
            CtrlXferCommand::Async {
                submit: 5,
                report: 7
            }
        );
    }

    #[test]
    fn unknown_version_uses_first_layout() {
        assert_eq!(RootCommandIds::new(HosVersion::default()), RootCommandIds::new(V1));
        assert!(!IfCommandIds::new(HosVersion::new(1, 9, 9)).is_v2());
    }
}
