//! Service manager (`sm:`) client.
//!
//! Every binding in the workspace starts here: [`connect`] opens the `sm:`
//! port and [`SmService::get_service`] turns a [`ServiceName`] into a
//! [`Service`] ready for dispatch.

#![no_std]

extern crate nx_panic_handler as _; // Provides #[panic_handler]

pub use nx_sf::ServiceName;
use nx_sf::service::Service;
use nx_svc::{
    error::ToRawResultCode,
    ipc::{self, Handle as SessionHandle},
    result::ResultCode,
};

mod cmif;
mod proto;

pub use self::{
    cmif::{GetServiceError, RegisterClientError},
    proto::SM_PORT_NAME,
};

/// Delay between attempts while `sm:` is not yet registered.
const CONNECT_RETRY_SLEEP_NS: u64 = 50_000_000; // 50ms

/// An open `sm:` session.
#[repr(transparent)]
pub struct SmService(Service);

impl SmService {
    /// Returns the underlying session handle.
    #[inline]
    pub fn session(&self) -> SessionHandle {
        self.0.session
    }

    /// Opens a raw session handle to the service registered as `name`.
    #[inline]
    pub fn get_service_handle_cmif(
        &self,
        name: ServiceName,
    ) -> Result<SessionHandle, GetServiceError> {
        cmif::get_service_handle(self.0.session, name)
    }

    /// Opens the service registered as `name` and wraps it in a [`Service`].
    pub fn get_service(&self, name: ServiceName) -> Result<Service, GetServiceError> {
        let handle = self.get_service_handle_cmif(name)?;
        log::debug!("opened service {name}");
        Ok(Service::new(handle))
    }

    /// Consumes and closes the `sm:` session.
    #[inline]
    pub fn close(self) {
        self.0.close();
    }
}

/// Connects to the service manager.
///
/// Waits (polling every 50 ms) until the `sm:` port exists, then registers
/// the caller as a client.
pub fn connect() -> Result<SmService, ConnectError> {
    let handle = loop {
        match ipc::connect_to_named_port(SM_PORT_NAME) {
            Ok(handle) => break handle,
            Err(ipc::ConnectError::NotFound) => nx_svc::thread::sleep(CONNECT_RETRY_SLEEP_NS),
            Err(err) => return Err(ConnectError::Connect(err)),
        }
    };

    // `sm:` does not support pointer buffer queries before registration.
    let service = Service {
        session: handle,
        own_handle: true,
        object_id: None,
        pointer_buffer_size: 0,
    };

    if let Err(err) = cmif::register_client(service.session) {
        service.close();
        return Err(ConnectError::RegisterClient(err));
    }

    log::debug!("connected to sm:");
    Ok(SmService(service))
}

/// Error returned by [`connect`].
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Failed to connect to the "sm:" named port.
    #[error("failed to connect to sm:")]
    Connect(#[source] ipc::ConnectError),
    /// Failed to register client with SM.
    #[error("failed to register client")]
    RegisterClient(#[source] RegisterClientError),
}

impl ToRawResultCode for ConnectError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::Connect(err) => err.to_rc(),
            Self::RegisterClient(err) => err.to_rc(),
        }
    }
}
