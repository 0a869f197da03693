//! `IClientRootSession` commands over CMIF.

use core::{mem::size_of, ptr};

use nx_sf::service::{BufferAttr, DispatchError, OutHandleAttr, Service};
use nx_svc::{
    error::{LibnxError, ToRawResultCode},
    process::Handle as ProcessHandle,
    result::ResultCode,
    sync::{Event, EventHandle},
};
use nx_usb::{
    cmd::RootCommandIds,
    hs::{
        InvalidEventIndex, UsbHsInterface, UsbHsInterfaceFilter, UsbHsInterfaceInfo,
        check_available_event_index,
    },
};
use zerocopy::{IntoBytes, little_endian::I32};

use crate::proto::{AcquireUsbIfIn, CreateInterfaceAvailableEventIn};

/// Receive buffer attributes used by every `usb:hs` output buffer.
pub(crate) const RECV_BUFFER: BufferAttr = BufferAttr::OUT.or(BufferAttr::HIPC_MAP_ALIAS);

/// Send buffer attributes.
pub(crate) const SEND_BUFFER: BufferAttr = BufferAttr::IN.or(BufferAttr::HIPC_MAP_ALIAS);

/// Binds the current process to the session (2.0.0+).
pub fn bind_client_process(service: &Service, cmd_id: u32) -> Result<(), DispatchError> {
    service
        .dispatch(cmd_id)
        .in_handle(ProcessHandle::current_process().to_raw())
        .send()?;
    Ok(())
}

/// Fetches an event returned as copy handle 0 by command `cmd_id`.
pub(crate) fn get_event(
    service: &Service,
    cmd_id: u32,
    autoclear: bool,
) -> Result<Event, GetEventError> {
    let res = service
        .dispatch(cmd_id)
        .out_handle(0, OutHandleAttr::Copy)
        .send()
        .map_err(GetEventError::Dispatch)?;

    let handle = res.out_handle(0).ok_or(GetEventError::MissingHandle)?;

    // SAFETY: The service returned a readable event handle.
    Ok(Event::new(unsafe { EventHandle::from_raw(handle) }, autoclear))
}

/// Error returned when fetching an event from a `usb:hs` session.
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

/// Runs `QueryAllInterfaces` or `QueryAvailableInterfaces`.
pub fn query_interfaces(
    service: &Service,
    cmd_id: u32,
    filter: &UsbHsInterfaceFilter,
    interfaces: &mut [UsbHsInterface],
) -> Result<i32, QueryInterfacesError> {
    let out = interfaces.as_mut_bytes();

    let dispatch = service
        .dispatch(cmd_id)
        .buffer(out.as_mut_ptr().cast_const(), out.len(), RECV_BUFFER)
        .out_size(size_of::<i32>());

    // SAFETY: filter outlives send().
    let dispatch = unsafe { dispatch.in_raw(filter.as_bytes().as_ptr(), size_of::<UsbHsInterfaceFilter>()) };

    let res = dispatch.send().map_err(QueryInterfacesError::Dispatch)?;
    let total = read_total(res.data);
    log::trace!("usb:hs cmd {cmd_id}: {total} interfaces");
    Ok(total)
}

/// Runs `QueryAcquiredInterfaces`.
pub fn query_acquired_interfaces(
    service: &Service,
    cmd_id: u32,
    interfaces: &mut [UsbHsInterface],
) -> Result<i32, QueryInterfacesError> {
    let out = interfaces.as_mut_bytes();

    let res = service
        .dispatch(cmd_id)
        .buffer(out.as_mut_ptr().cast_const(), out.len(), RECV_BUFFER)
        .out_size(size_of::<i32>())
        .send()
        .map_err(QueryInterfacesError::Dispatch)?;

    Ok(read_total(res.data))
}

fn read_total(data: &[u8]) -> i32 {
    // SAFETY: The reply payload was sized for one i32.
    unsafe { ptr::read_unaligned(data.as_ptr().cast::<i32>()) }
}

/// Error returned by the interface query commands.
#[derive(Debug, thiserror::Error)]
pub enum QueryInterfacesError {
    /// Failed to dispatch the request.
    #[error("failed to dispatch request")]
    Dispatch(#[source] DispatchError),
}

impl ToRawResultCode for QueryInterfacesError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::Dispatch(err) => err.to_rc(),
        }
    }
}

/// Creates the interface-available event in slot `index`.
pub fn create_interface_available_event(
    service: &Service,
    cmd_id: u32,
    autoclear: bool,
    index: u8,
    filter: &UsbHsInterfaceFilter,
) -> Result<Event, CreateInterfaceAvailableEventError> {
    check_available_event_index(index).map_err(CreateInterfaceAvailableEventError::InvalidIndex)?;

    let input = CreateInterfaceAvailableEventIn {
        index,
        pad: 0,
        filter: *filter,
    };

    let dispatch = service.dispatch(cmd_id).out_handle(0, OutHandleAttr::Copy);

    // SAFETY: input lives until send() completes.
    let dispatch = unsafe { dispatch.in_raw(input.as_bytes().as_ptr(), size_of::<CreateInterfaceAvailableEventIn>()) };

    let res = dispatch
        .send()
        .map_err(CreateInterfaceAvailableEventError::Dispatch)?;

    let handle = res
        .out_handle(0)
        .ok_or(CreateInterfaceAvailableEventError::MissingHandle)?;

    // SAFETY: The service returned a readable event handle.
    Ok(Event::new(unsafe { EventHandle::from_raw(handle) }, autoclear))
}

/// Error returned by [`create_interface_available_event`].
#[derive(Debug, thiserror::Error)]
pub enum CreateInterfaceAvailableEventError {
    /// The slot index is outside 0..=2; nothing was sent.
    #[error("invalid event index")]
    InvalidIndex(#[source] InvalidEventIndex),
    /// Failed to dispatch the request.
    #[error("failed to dispatch request")]
    Dispatch(#[source] DispatchError),
    /// Response did not contain the expected handle.
    #[error("missing handle in response")]
    MissingHandle,
}

impl ToRawResultCode for CreateInterfaceAvailableEventError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::InvalidIndex(_) => LibnxError::BadInput.to_rc(),
            Self::Dispatch(err) => err.to_rc(),
            Self::MissingHandle => LibnxError::ShouldNotHappen.to_rc(),
        }
    }
}

/// Destroys the interface-available event in slot `index`.
///
/// `event` is closed whatever the outcome.
pub fn destroy_interface_available_event(
    service: &Service,
    cmd_id: u32,
    event: Event,
    index: u8,
) -> Result<(), DestroyInterfaceAvailableEventError> {
    let result = if let Err(err) = check_available_event_index(index) {
        Err(DestroyInterfaceAvailableEventError::InvalidIndex(err))
    } else {
        let dispatch = service.dispatch(cmd_id);
        // SAFETY: index lives until send() completes.
        let dispatch = unsafe { dispatch.in_raw(&raw const index, size_of::<u8>()) };
        dispatch
            .send()
            .map(drop)
            .map_err(DestroyInterfaceAvailableEventError::Dispatch)
    };

    if let Err(err) = event.close() {
        log::warn!("failed to close interface available event {index}: {err}");
    }

    result
}

/// Error returned by [`destroy_interface_available_event`].
#[derive(Debug, thiserror::Error)]
pub enum DestroyInterfaceAvailableEventError {
    /// The slot index is outside 0..=2; nothing was sent.
    #[error("invalid event index")]
    InvalidIndex(#[source] InvalidEventIndex),
    /// Failed to dispatch the request.
    #[error("failed to dispatch request")]
    Dispatch(#[source] DispatchError),
}

impl ToRawResultCode for DestroyInterfaceAvailableEventError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::InvalidIndex(_) => LibnxError::BadInput.to_rc(),
            Self::Dispatch(err) => err.to_rc(),
        }
    }
}

/// Sends `AcquireUsbIf` for `interface_id`.
///
/// The service fills `info` and returns the `IClientIfSession` object.
pub fn acquire_usb_if(
    service: &Service,
    ids: RootCommandIds,
    interface_id: i32,
    info: &mut UsbHsInterfaceInfo,
) -> Result<Service, AcquireInterfaceError> {
    let input = AcquireUsbIfIn {
        id: I32::new(interface_id),
    };
    let out = info.as_mut_bytes();

    let dispatch = service
        .dispatch(ids.acquire_usb_if())
        .buffer(out.as_mut_ptr().cast_const(), out.len(), RECV_BUFFER)
        .out_objects(1);

    // SAFETY: input lives until send() completes.
    let dispatch = unsafe { dispatch.in_raw(input.as_bytes().as_ptr(), size_of::<AcquireUsbIfIn>()) };

    let res = dispatch.send().map_err(AcquireInterfaceError::Dispatch)?;

    res.out_object(service, 0)
        .ok_or(AcquireInterfaceError::MissingObject)
}

/// Error returned when acquiring an interface.
#[derive(Debug, thiserror::Error)]
pub enum AcquireInterfaceError {
    /// Failed to dispatch the acquire request.
    #[error("failed to dispatch request")]
    Dispatch(#[source] DispatchError),
    /// Response did not contain the interface session object.
    #[error("missing interface session object in response")]
    MissingObject,
    /// Failed to fetch one of the interface session events.
    #[error("failed to get interface event")]
    GetEvent(#[source] GetEventError),
}

impl ToRawResultCode for AcquireInterfaceError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::Dispatch(err) => err.to_rc(),
            Self::MissingObject => LibnxError::ShouldNotHappen.to_rc(),
            Self::GetEvent(err) => err.to_rc(),
        }
    }
}
