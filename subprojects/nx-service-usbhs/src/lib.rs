//! USB host client (`usb:hs`).
//!
//! [`connect`] opens the root session. From there an application lists
//! attached interfaces with the query commands, waits for new ones with an
//! interface-available event, and acquires an interface to talk to it through
//! a [`ClientIfSession`].
//!
//! ```text
//! usb:hs (IClientRootSession, domain)
//!     │
//!     ├─> QueryAvailableInterfaces(filter)  → [UsbHsInterface]
//!     ├─> CreateInterfaceAvailableEvent     → Event
//!     └─> AcquireUsbIf(id)                  → IClientIfSession
//!             ├─> SetInterface / GetInterface / GetAlternateInterface
//!             ├─> GetCurrentFrame
//!             ├─> CtrlXfer
//!             └─> ResetDevice
//! ```
//!
//! Command IDs changed with 2.0.0. The running version is read from
//! [`nx_rt_env::hos_version`] when the session is opened and used for every
//! command sent through it. See [`nx_usb::cmd`] for the tables.
//!
//! All errors convert to the raw result code with
//! [`ToRawResultCode`](nx_svc::error::ToRawResultCode); service codes pass
//! through unchanged.

#![no_std]

extern crate nx_panic_handler as _; // Provides #[panic_handler]

use nx_rt_env::HosVersion;
use nx_service_sm::{GetServiceError, SmService};
use nx_sf::service::{ConvertToDomainError, DispatchError, Service};
use nx_svc::{
    error::ToRawResultCode,
    ipc::Handle as SessionHandle,
    result::ResultCode,
    sync::Event,
};
use nx_usb::{
    cmd::{IfCommandIds, RootCommandIds},
    hs::{UsbHsInterface, UsbHsInterfaceFilter},
};

mod cmif;
mod interface;
mod proto;

pub use self::{
    cmif::{
        AcquireInterfaceError, CreateInterfaceAvailableEventError,
        DestroyInterfaceAvailableEventError, GetEventError, QueryInterfacesError,
    },
    interface::{
        ClientIfSession, CtrlXferError, GetCurrentFrameError, InterfaceInfoError, ResetDeviceError,
    },
    proto::SERVICE_NAME,
};

/// An open `usb:hs` root session.
pub struct UsbHsService {
    service: Service,
    event: Event,
    version: HosVersion,
    ids: RootCommandIds,
}

impl UsbHsService {
    /// Returns the underlying session handle.
    #[inline]
    pub fn session(&self) -> SessionHandle {
        self.service.session
    }

    /// System version the command layout was chosen for.
    #[inline]
    pub fn version(&self) -> HosVersion {
        self.version
    }

    /// Event signalled whenever an interface is attached or detached.
    #[inline]
    pub fn interface_state_change_event(&self) -> &Event {
        &self.event
    }

    /// Lists every attached interface matching `filter`.
    ///
    /// Returns the total reported by the service. Only the first
    /// `min(total, interfaces.len())` entries are written.
    #[inline]
    pub fn query_all_interfaces(
        &self,
        filter: &UsbHsInterfaceFilter,
        interfaces: &mut [UsbHsInterface],
    ) -> Result<i32, QueryInterfacesError> {
        cmif::query_interfaces(&self.service, self.ids.query_all_interfaces(), filter, interfaces)
    }

    /// Lists the interfaces matching `filter` that no client has acquired.
    ///
    /// Same output convention as [`query_all_interfaces`](Self::query_all_interfaces).
    #[inline]
    pub fn query_available_interfaces(
        &self,
        filter: &UsbHsInterfaceFilter,
        interfaces: &mut [UsbHsInterface],
    ) -> Result<i32, QueryInterfacesError> {
        cmif::query_interfaces(
            &self.service,
            self.ids.query_available_interfaces(),
            filter,
            interfaces,
        )
    }

    /// Lists the interfaces this process has acquired.
    #[inline]
    pub fn query_acquired_interfaces(
        &self,
        interfaces: &mut [UsbHsInterface],
    ) -> Result<i32, QueryInterfacesError> {
        cmif::query_acquired_interfaces(
            &self.service,
            self.ids.query_acquired_interfaces(),
            interfaces,
        )
    }

    /// Creates an event signalled when an interface matching `filter`
    /// becomes available.
    ///
    /// `index` selects one of the three slots (0..=2); anything else fails
    /// with `BadInput` without contacting the service.
    #[inline]
    pub fn create_interface_available_event(
        &self,
        autoclear: bool,
        index: u8,
        filter: &UsbHsInterfaceFilter,
    ) -> Result<Event, CreateInterfaceAvailableEventError> {
        cmif::create_interface_available_event(
            &self.service,
            self.ids.create_interface_available_event(),
            autoclear,
            index,
            filter,
        )
    }

    /// Destroys the interface-available event in slot `index`.
    ///
    /// `event` is closed even when the request fails.
    #[inline]
    pub fn destroy_interface_available_event(
        &self,
        event: Event,
        index: u8,
    ) -> Result<(), DestroyInterfaceAvailableEventError> {
        cmif::destroy_interface_available_event(
            &self.service,
            self.ids.destroy_interface_available_event(),
            event,
            index,
        )
    }

    /// Acquires `interface`, as returned by one of the query commands.
    ///
    /// The service fills the session's copy of `interface.inf` with the
    /// current descriptors.
    pub fn acquire_interface(
        &self,
        interface: &UsbHsInterface,
    ) -> Result<ClientIfSession, AcquireInterfaceError> {
        let id = interface.id();
        let mut inf = *interface;
        let service = cmif::acquire_usb_if(&self.service, self.ids, id, &mut inf.inf)?;
        let session = ClientIfSession::open(service, IfCommandIds::new(self.version), id, inf)
            .map_err(AcquireInterfaceError::GetEvent)?;

        log::debug!("acquired usb interface {}", session.id());
        Ok(session)
    }

    /// Consumes the session, closing the state change event and the service.
    ///
    /// Interface sessions acquired through it must be closed first.
    pub fn close(self) {
        log::debug!("closing usb:hs");
        interface::close_event(self.event, "interface state change");
        self.service.close();
    }
}

/// Opens the `usb:hs` root session.
///
/// Each call creates an independent session. Sessions are closed with
/// [`UsbHsService::close`].
pub fn connect(sm: &SmService) -> Result<UsbHsService, ConnectError> {
    let version = nx_rt_env::hos_version::get();
    let ids = RootCommandIds::new(version);

    let mut service = sm.get_service(SERVICE_NAME).map_err(ConnectError::GetService)?;

    if let Err(err) = service.convert_to_domain() {
        service.close();
        return Err(ConnectError::ConvertToDomain(err));
    }

    if let Some(cmd_id) = ids.bind_client_process() {
        if let Err(err) = cmif::bind_client_process(&service, cmd_id) {
            service.close();
            return Err(ConnectError::BindClientProcess(err));
        }
    }

    let event = match cmif::get_event(&service, ids.get_interface_state_change_event(), false) {
        Ok(event) => event,
        Err(err) => {
            service.close();
            return Err(ConnectError::GetEvent(err));
        }
    };

    log::debug!("connected to usb:hs (HOS {version})");
    Ok(UsbHsService {
        service,
        event,
        version,
        ids,
    })
}

/// Error returned by [`connect`].
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The service manager could not open `usb:hs`.
    #[error("failed to get usb:hs service")]
    GetService(#[source] GetServiceError),
    /// Failed to convert the session to a domain.
    #[error("failed to convert to domain")]
    ConvertToDomain(#[source] ConvertToDomainError),
    /// `BindClientProcess` failed.
    #[error("failed to bind client process")]
    BindClientProcess(#[source] DispatchError),
    /// Failed to fetch the interface state change event.
    #[error("failed to get interface state change event")]
    GetEvent(#[source] GetEventError),
}

impl ToRawResultCode for ConnectError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::GetService(err) => err.to_rc(),
            Self::ConvertToDomain(err) => err.to_rc(),
            Self::BindClientProcess(err) => err.to_rc(),
            Self::GetEvent(err) => err.to_rc(),
        }
    }
}
