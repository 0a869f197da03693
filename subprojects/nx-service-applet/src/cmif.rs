//! CMIF protocol operations for applet service.
//!
//! This module implements applet service commands using the CMIF protocol.

use core::{mem::size_of, ptr};

use nx_sf::service::{BufferAttr, ConvertToDomainError, DispatchError, OutHandleAttr, Service};
use nx_service_sm::GetServiceError;
use nx_svc::{
    error::{LibnxError, ToRawResultCode},
    process::Handle as ProcessHandle,
    result::ResultCode,
    sync::{Event, EventHandle},
};

use crate::proto::{
    AppletId, AppletType, CMD_GET_LIBRARY_APPLET_CREATOR, CMD_LAA_GET_APPLET_STATE_CHANGED_EVENT,
    CMD_LAA_GET_RESULT, CMD_LAA_IS_COMPLETED, CMD_LAA_POP_OUT_DATA, CMD_LAA_PUSH_IN_DATA,
    CMD_LAC_CREATE_LIBRARY_APPLET, CMD_LAC_CREATE_STORAGE, CMD_SA_GET_SIZE, CMD_SA_READ,
    CMD_SA_WRITE, CMD_STORAGE_OPEN, CreateLibraryAppletIn, LibAppletMode,
};

/// Storage accessor buffers: auto-selected between pointer and mapped alias.
const AUTO_IN: BufferAttr = BufferAttr::IN.or(BufferAttr::HIPC_AUTO_SELECT);
const AUTO_OUT: BufferAttr = BufferAttr::OUT.or(BufferAttr::HIPC_AUTO_SELECT);

/// Sends a command that only returns a domain object.
fn get_object(service: &Service, cmd_id: u32) -> Result<Service, GetObjectError> {
    let res = service
        .dispatch(cmd_id)
        .out_objects(1)
        .send()
        .map_err(GetObjectError::Dispatch)?;

    res.out_object(service, 0).ok_or(GetObjectError::MissingObject)
}

/// Sends a command with no payload either way.
fn send_plain(service: &Service, cmd_id: u32) -> Result<(), DispatchError> {
    service.dispatch(cmd_id).send()?;
    Ok(())
}

/// Error returned by commands that open a sub-interface.
#[derive(Debug, thiserror::Error)]
pub enum GetObjectError {
    /// Failed to dispatch the request.
    #[error("failed to dispatch request")]
    Dispatch(#[source] DispatchError),
    /// Response did not contain the expected domain object.
    #[error("missing domain object in response")]
    MissingObject,
}

impl ToRawResultCode for GetObjectError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::Dispatch(err) => err.to_rc(),
            Self::MissingObject => LibnxError::ShouldNotHappen.to_rc(),
        }
    }
}

/// Opens `appletOE` or `appletAE` and converts it to a domain.
pub fn connect(
    sm: &nx_service_sm::SmService,
    applet_type: AppletType,
) -> Result<Service, ConnectError> {
    let name = if applet_type.uses_applet_oe() {
        crate::SERVICE_NAME_OE
    } else {
        crate::SERVICE_NAME_AE
    };

    let mut service = sm.get_service(name).map_err(ConnectError::GetService)?;

    if let Err(err) = service.convert_to_domain() {
        service.close();
        return Err(ConnectError::ConvertToDomain(err));
    }

    Ok(service)
}

/// Error returned by [`connect`](crate::connect).
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// `AppletType::None` has no service.
    #[error("applet type has no service")]
    NoService,
    /// Failed to get the service handle from SM.
    #[error("failed to get service")]
    GetService(#[source] GetServiceError),
    /// Failed to convert the session to a domain.
    #[error("failed to convert to domain")]
    ConvertToDomain(#[source] ConvertToDomainError),
}

impl ToRawResultCode for ConnectError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::NoService => LibnxError::NotInitialized.to_rc(),
            Self::GetService(err) => err.to_rc(),
            Self::ConvertToDomain(err) => err.to_rc(),
        }
    }
}

/// Opens a proxy session for the specified applet type.
///
/// The proxy command varies by applet type:
/// - Application: cmd 0
/// - SystemApplet: cmd 100
/// - LibraryApplet: cmd 200
/// - OverlayApplet: cmd 300
/// - SystemApplication: cmd 350
pub fn open_proxy(
    service: &Service,
    applet_type: AppletType,
    process_handle: ProcessHandle,
) -> Result<Service, OpenProxyError> {
    let cmd_id = applet_type
        .open_proxy_cmd()
        .ok_or(OpenProxyError::InvalidAppletType)?;

    // Input data: u64 reserved = 0
    let reserved: u64 = 0;

    let dispatch = service
        .dispatch(cmd_id)
        .send_pid()
        .in_handle(process_handle.to_raw())
        .out_objects(1);

    // SAFETY: reserved is valid and lives until send() completes.
    let dispatch = unsafe { dispatch.in_raw((&raw const reserved).cast::<u8>(), size_of::<u64>()) };

    let result = dispatch.send().map_err(OpenProxyError::Dispatch)?;

    result.out_object(service, 0).ok_or(OpenProxyError::MissingObject)
}

/// Error returned by [`open_proxy`].
#[derive(Debug, thiserror::Error)]
pub enum OpenProxyError {
    /// Invalid applet type (None).
    #[error("invalid applet type")]
    InvalidAppletType,
    /// Failed to dispatch the proxy request.
    #[error("failed to dispatch proxy request")]
    Dispatch(#[source] DispatchError),
    /// Response did not contain the expected domain object.
    #[error("missing domain object in response")]
    MissingObject,
}

impl ToRawResultCode for OpenProxyError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::InvalidAppletType => LibnxError::BadInput.to_rc(),
            Self::Dispatch(err) => err.to_rc(),
            Self::MissingObject => LibnxError::ShouldNotHappen.to_rc(),
        }
    }
}

/// Gets the ILibraryAppletCreator sub-interface from the proxy.
pub fn get_library_applet_creator(proxy: &Service) -> Result<Service, GetObjectError> {
    get_object(proxy, CMD_GET_LIBRARY_APPLET_CREATOR)
}

/// Creates a library applet in `mode`.
pub fn create_library_applet(
    creator: &Service,
    applet_id: AppletId,
    mode: LibAppletMode,
) -> Result<Service, GetObjectError> {
    let input = CreateLibraryAppletIn {
        applet_id: applet_id as u32,
        mode: mode as u32,
    };

    let dispatch = creator.dispatch(CMD_LAC_CREATE_LIBRARY_APPLET).out_objects(1);

    // SAFETY: input lives until send() completes.
    let dispatch = unsafe {
        dispatch.in_raw((&raw const input).cast::<u8>(), size_of::<CreateLibraryAppletIn>())
    };

    let res = dispatch.send().map_err(GetObjectError::Dispatch)?;
    res.out_object(creator, 0).ok_or(GetObjectError::MissingObject)
}

/// Creates a `size`-byte storage.
pub fn create_storage(creator: &Service, size: i64) -> Result<Service, GetObjectError> {
    let dispatch = creator.dispatch(CMD_LAC_CREATE_STORAGE).out_objects(1);

    // SAFETY: size lives until send() completes.
    let dispatch = unsafe { dispatch.in_raw((&raw const size).cast::<u8>(), size_of::<i64>()) };

    let res = dispatch.send().map_err(GetObjectError::Dispatch)?;
    res.out_object(creator, 0).ok_or(GetObjectError::MissingObject)
}

/// Fetches the applet state changed event (autoclear off).
pub fn get_applet_state_changed_event(accessor: &Service) -> Result<Event, GetEventError> {
    let res = accessor
        .dispatch(CMD_LAA_GET_APPLET_STATE_CHANGED_EVENT)
        .out_handle(0, OutHandleAttr::Copy)
        .send()
        .map_err(GetEventError::Dispatch)?;

    let handle = res.out_handle(0).ok_or(GetEventError::MissingHandle)?;

    // SAFETY: The service returned a readable event handle.
    Ok(Event::new(unsafe { EventHandle::from_raw(handle) }, false))
}

/// Error returned by [`get_applet_state_changed_event`].
#[derive(Debug, thiserror::Error)]
pub enum GetEventError {
    /// Failed to dispatch the request.
    #[error("failed to dispatch request")]
    Dispatch(#[source] DispatchError),
    /// Response did not contain the expected handle.
    #[error("missing handle in response")]
    MissingHandle,
}

impl ToRawResultCode for GetEventError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::Dispatch(err) => err.to_rc(),
            Self::MissingHandle => LibnxError::ShouldNotHappen.to_rc(),
        }
    }
}

pub fn is_completed(accessor: &Service) -> Result<bool, DispatchError> {
    let res = accessor
        .dispatch(CMD_LAA_IS_COMPLETED)
        .out_size(size_of::<u8>())
        .send()?;
    Ok(res.data.first().is_some_and(|&b| b != 0))
}

pub fn start(accessor: &Service) -> Result<(), DispatchError> {
    send_plain(accessor, crate::proto::CMD_LAA_START)
}

pub fn request_exit(accessor: &Service) -> Result<(), DispatchError> {
    send_plain(accessor, crate::proto::CMD_LAA_REQUEST_EXIT)
}

/// Sends GetResult. The applet's result code comes back as the command result.
pub fn get_result(accessor: &Service) -> Result<(), DispatchError> {
    send_plain(accessor, CMD_LAA_GET_RESULT)
}

/// Passes `storage` to the applet's input channel.
pub fn push_in_data(accessor: &Service, storage: &Service) -> Result<(), DispatchError> {
    accessor
        .dispatch(CMD_LAA_PUSH_IN_DATA)
        .in_object(storage)
        .send()?;
    Ok(())
}

pub fn pop_out_data(accessor: &Service) -> Result<Service, GetObjectError> {
    get_object(accessor, CMD_LAA_POP_OUT_DATA)
}

/// Opens the accessor of a storage.
pub fn open_storage(storage: &Service) -> Result<Service, GetObjectError> {
    get_object(storage, CMD_STORAGE_OPEN)
}

pub fn get_storage_size(accessor: &Service) -> Result<i64, DispatchError> {
    let res = accessor
        .dispatch(CMD_SA_GET_SIZE)
        .out_size(size_of::<i64>())
        .send()?;

    // SAFETY: The reply payload was sized for one i64.
    Ok(unsafe { ptr::read_unaligned(res.data.as_ptr().cast::<i64>()) })
}

/// Writes `data` at `offset`.
pub fn write_storage(accessor: &Service, offset: i64, data: &[u8]) -> Result<(), DispatchError> {
    let dispatch = accessor
        .dispatch(CMD_SA_WRITE)
        .buffer(data.as_ptr(), data.len(), AUTO_IN);

    // SAFETY: offset lives until send() completes.
    let dispatch = unsafe { dispatch.in_raw((&raw const offset).cast::<u8>(), size_of::<i64>()) };

    dispatch.send()?;
    Ok(())
}

/// Reads `buf.len()` bytes from `offset`.
pub fn read_storage(accessor: &Service, offset: i64, buf: &mut [u8]) -> Result<(), DispatchError> {
    let dispatch = accessor
        .dispatch(CMD_SA_READ)
        .buffer(buf.as_mut_ptr().cast_const(), buf.len(), AUTO_OUT);

    // SAFETY: offset lives until send() completes.
    let dispatch = unsafe { dispatch.in_raw((&raw const offset).cast::<u8>(), size_of::<i64>()) };

    dispatch.send()?;
    Ok(())
}
