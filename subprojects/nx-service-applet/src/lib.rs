//! Applet Manager (AM) service, library applet surface.
//!
//! The Applet Manager supervises every applet on the system. This crate
//! covers what an application needs to launch a *library applet* (web
//! browser, software keyboard, error dialog, ...) and exchange data with it.
//!
//! # The Two Services
//!
//! | Service | Interface | Used by |
//! |---------|-----------|---------|
//! | `appletOE` | `IApplicationProxyService` | [`AppletType::Application`] |
//! | `appletAE` | `IAllSystemAppletProxiesService` | every other [`AppletType`] |
//!
//! Both are converted to a domain right after connecting; every interface
//! below is a domain object of that one session.
//!
//! # Interface Hierarchy
//!
//! ```text
//! appletOE/appletAE
//!     │
//!     └─> OpenXxxProxy(process_handle)        → IXxxProxy
//!             │
//!             └─> GetLibraryAppletCreator()   → ILibraryAppletCreator (cmd 11)
//!                     ├─> CreateLibraryApplet(id, mode) → ILibraryAppletAccessor (cmd 0)
//!                     └─> CreateStorage(size)           → IStorage (cmd 10)
//! ```
//!
//! # Library Applet Data Flow
//!
//! Data flows between the caller and the applet through [`Storage`] objects:
//!
//! ```text
//! ┌─────────────┐                      ┌─────────────┐
//! │  Your App   │                      │  LibApplet  │
//! └──────┬──────┘                      └──────┬──────┘
//!        │  CreateStorage(size)               │
//!        │  Write data to storage             │
//!        │  PushInData(storage)               │
//!        │  ─────────────────────────────────>│
//!        │  Start()                           │
//!        │  ─────────────────────────────────>│
//!        │         [Applet runs]              │
//!        │  wait for state change event       │
//!        │  <─────────────────────────────────│
//!        │  GetResult()                       │
//!        │  PopOutData() → storage            │
//!        │  <─────────────────────────────────│
//! ```
//!
//! Every library applet first receives a CommonArguments storage; see the
//! `nx-libapplet` crate for the launch sequence built on these primitives.
//!
//! # References
//!
//! - [Switchbrew Wiki: Applet Manager services](https://switchbrew.org/wiki/Applet_Manager_services)

#![no_std]

extern crate nx_panic_handler as _; // Provides #[panic_handler]

use nx_service_sm::SmService;
use nx_sf::service::{DispatchError, Service};
use nx_svc::{
    error::ToRawResultCode, ipc::Handle as SessionHandle, process::Handle as ProcessHandle,
    result::ResultCode, sync::Event,
};

mod cmif;
mod proto;

pub use self::{
    cmif::{ConnectError, GetEventError, GetObjectError, OpenProxyError},
    proto::{AppletId, AppletType, LibAppletMode, SERVICE_NAME_AE, SERVICE_NAME_OE},
};

/// Applet main service session (appletOE or appletAE).
///
/// This is the root service session, converted to domain mode for efficient
/// sub-object management. Use [`open_proxy`](Self::open_proxy) to get a proxy
/// for your applet type.
#[repr(transparent)]
pub struct AppletService(Service);

impl AppletService {
    /// Returns the underlying session handle.
    #[inline]
    pub fn session(&self) -> SessionHandle {
        self.0.session
    }

    /// Consumes and closes the applet service.
    #[inline]
    pub fn close(self) {
        self.0.close();
    }

    /// Opens a proxy session for the specified applet type.
    ///
    /// # Arguments
    ///
    /// * `applet_type` - The type of applet (must not be `None`)
    /// * `process_handle` - The current process handle
    #[inline]
    pub fn open_proxy(
        &self,
        applet_type: AppletType,
        process_handle: ProcessHandle,
    ) -> Result<AppletProxyService, OpenProxyError> {
        cmif::open_proxy(&self.0, applet_type, process_handle).map(AppletProxyService)
    }
}

/// Applet proxy session.
#[repr(transparent)]
pub struct AppletProxyService(Service);

impl AppletProxyService {
    /// Consumes and closes the proxy service.
    #[inline]
    pub fn close(self) {
        self.0.close();
    }

    /// Gets the ILibraryAppletCreator sub-interface.
    #[inline]
    pub fn get_library_applet_creator(&self) -> Result<LibraryAppletCreator, GetObjectError> {
        cmif::get_library_applet_creator(&self.0).map(LibraryAppletCreator)
    }
}

/// ILibraryAppletCreator sub-interface.
#[repr(transparent)]
pub struct LibraryAppletCreator(Service);

impl LibraryAppletCreator {
    /// Consumes and closes the interface.
    #[inline]
    pub fn close(self) {
        self.0.close();
    }

    /// Creates a library applet. It does not run until
    /// [`LibraryAppletAccessor::start`] is called.
    pub fn create_library_applet(
        &self,
        applet_id: AppletId,
        mode: LibAppletMode,
    ) -> Result<LibraryAppletAccessor, CreateLibraryAppletError> {
        let service = cmif::create_library_applet(&self.0, applet_id, mode)
            .map_err(CreateLibraryAppletError::Create)?;

        let event = match cmif::get_applet_state_changed_event(&service) {
            Ok(event) => event,
            Err(err) => {
                service.close();
                return Err(CreateLibraryAppletError::GetEvent(err));
            }
        };

        log::debug!("created library applet {applet_id:?} ({mode:?})");
        Ok(LibraryAppletAccessor {
            service,
            state_changed_event: event,
        })
    }

    /// Creates a zero-filled storage of `size` bytes.
    #[inline]
    pub fn create_storage(&self, size: i64) -> Result<Storage, GetObjectError> {
        cmif::create_storage(&self.0, size).map(Storage)
    }
}

/// Error returned by [`LibraryAppletCreator::create_library_applet`].
#[derive(Debug, thiserror::Error)]
pub enum CreateLibraryAppletError {
    /// CreateLibraryApplet failed.
    #[error("failed to create library applet")]
    Create(#[source] GetObjectError),
    /// Failed to get the applet state changed event.
    #[error("failed to get applet state changed event")]
    GetEvent(#[source] GetEventError),
}

impl ToRawResultCode for CreateLibraryAppletError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::Create(err) => err.to_rc(),
            Self::GetEvent(err) => err.to_rc(),
        }
    }
}

/// ILibraryAppletAccessor: a created library applet.
pub struct LibraryAppletAccessor {
    service: Service,
    state_changed_event: Event,
}

impl LibraryAppletAccessor {
    /// Event signalled when the applet changes state (most notably on exit).
    #[inline]
    pub fn state_changed_event(&self) -> &Event {
        &self.state_changed_event
    }

    /// Returns `true` once the applet has finished.
    #[inline]
    pub fn is_completed(&self) -> Result<bool, DispatchError> {
        cmif::is_completed(&self.service)
    }

    /// Starts the applet.
    #[inline]
    pub fn start(&self) -> Result<(), DispatchError> {
        cmif::start(&self.service)
    }

    /// Asks a running applet to exit.
    #[inline]
    pub fn request_exit(&self) -> Result<(), DispatchError> {
        cmif::request_exit(&self.service)
    }

    /// Returns the applet's exit result.
    ///
    /// A failed applet shows up as a dispatch error carrying its raw
    /// result code.
    #[inline]
    pub fn get_result(&self) -> Result<(), DispatchError> {
        cmif::get_result(&self.service)
    }

    /// Pushes `storage` to the applet's input channel.
    ///
    /// The storage is handed over to the applet and closed locally, whether
    /// the push succeeded or not.
    pub fn push_in_data(&self, storage: Storage) -> Result<(), DispatchError> {
        let result = cmif::push_in_data(&self.service, &storage.0);
        storage.close();
        result
    }

    /// Pops one storage from the applet's output channel.
    #[inline]
    pub fn pop_out_data(&self) -> Result<Storage, GetObjectError> {
        cmif::pop_out_data(&self.service).map(Storage)
    }

    /// Consumes the accessor, closing the event and the applet object.
    pub fn close(self) {
        if let Err(err) = self.state_changed_event.close() {
            log::warn!("failed to close applet state changed event: {err}");
        }
        self.service.close();
    }
}

/// IStorage: a data block exchanged with a library applet.
#[repr(transparent)]
pub struct Storage(Service);

impl Storage {
    /// Opens the storage for reading and writing.
    #[inline]
    pub fn open(&self) -> Result<StorageAccessor, GetObjectError> {
        cmif::open_storage(&self.0).map(StorageAccessor)
    }

    /// Consumes and closes the storage.
    #[inline]
    pub fn close(self) {
        self.0.close();
    }
}

/// IStorageAccessor.
#[repr(transparent)]
pub struct StorageAccessor(Service);

impl StorageAccessor {
    /// Returns the storage size in bytes.
    #[inline]
    pub fn get_size(&self) -> Result<i64, DispatchError> {
        cmif::get_storage_size(&self.0)
    }

    /// Writes `data` at `offset`.
    #[inline]
    pub fn write(&self, offset: i64, data: &[u8]) -> Result<(), DispatchError> {
        cmif::write_storage(&self.0, offset, data)
    }

    /// Fills `buf` from `offset`.
    #[inline]
    pub fn read(&self, offset: i64, buf: &mut [u8]) -> Result<(), DispatchError> {
        cmif::read_storage(&self.0, offset, buf)
    }

    /// Consumes and closes the accessor.
    #[inline]
    pub fn close(self) {
        self.0.close();
    }
}

/// Connects to the applet service (appletOE or appletAE) based on applet type.
///
/// The service is converted to domain mode right away. Each call opens an
/// independent session.
pub fn connect(sm: &SmService, applet_type: AppletType) -> Result<AppletService, ConnectError> {
    if matches!(applet_type, AppletType::None) {
        return Err(ConnectError::NoService);
    }

    let service = cmif::connect(sm, applet_type)?;
    log::debug!("connected to applet service ({applet_type:?})");
    Ok(AppletService(service))
}
