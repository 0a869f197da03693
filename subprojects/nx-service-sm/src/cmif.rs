//! `sm:` commands over CMIF.
//!
//! These are written against the raw request builder instead of
//! [`Service::dispatch`](nx_sf::service::Service::dispatch): the `sm:` session
//! is used before any pointer buffer size is known, and both commands are
//! fixed-shape.

use core::{mem::size_of, ptr};

use nx_sf::{ServiceName, cmif};
use nx_svc::{
    error::{LibnxError, ToRawResultCode},
    ipc::{self, Handle as SessionHandle},
    result::ResultCode,
};

use crate::proto;

/// Opens a session to the service registered as `name`.
pub fn get_service_handle(
    session: SessionHandle,
    name: ServiceName,
) -> Result<SessionHandle, GetServiceError> {
    let ipc_buf = nx_sys_thread_tls::ipc_buffer_ptr();

    let fmt = cmif::RequestFormatBuilder::new(proto::GET_SERVICE_HANDLE)
        .data_size(size_of::<u64>())
        .build();

    // SAFETY: ipc_buf points to the TLS IPC buffer.
    let req = unsafe { cmif::make_request(ipc_buf, fmt) };

    // SAFETY: The payload area was sized for one u64.
    unsafe { ptr::write_unaligned(req.data.as_mut_ptr().cast::<u64>(), name.to_u64()) };

    ipc::send_sync_request(session).map_err(GetServiceError::SendRequest)?;

    // SAFETY: The reply was just written to the TLS IPC buffer.
    let resp = unsafe { cmif::parse_response(ipc_buf, false, 0) }
        .map_err(GetServiceError::ParseResponse)?;

    let &[handle, ..] = resp.move_handles else {
        return Err(GetServiceError::MissingHandle);
    };

    // SAFETY: The service manager moved a session handle to us.
    Ok(unsafe { SessionHandle::from_raw(handle) })
}

/// Error returned by [`get_service_handle`].
#[derive(Debug, thiserror::Error)]
pub enum GetServiceError {
    /// Failed to send the IPC request.
    #[error("failed to send request")]
    SendRequest(#[source] ipc::SendSyncError),
    /// The service manager replied with an error (e.g. the service does not exist).
    #[error("failed to parse response")]
    ParseResponse(#[source] cmif::ParseResponseError),
    /// Response did not contain the expected handle.
    #[error("missing handle in response")]
    MissingHandle,
}

impl ToRawResultCode for GetServiceError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::SendRequest(err) => err.to_rc(),
            Self::ParseResponse(err) => err.to_rc(),
            Self::MissingHandle => LibnxError::ShouldNotHappen.to_rc(),
        }
    }
}

/// Registers the session as a client, sending the caller's PID.
pub fn register_client(session: SessionHandle) -> Result<(), RegisterClientError> {
    let ipc_buf = nx_sys_thread_tls::ipc_buffer_ptr();

    let fmt = cmif::RequestFormatBuilder::new(proto::REGISTER_CLIENT)
        .data_size(size_of::<u64>())
        .send_pid()
        .build();

    // SAFETY: ipc_buf points to the TLS IPC buffer.
    let req = unsafe { cmif::make_request(ipc_buf, fmt) };

    // Placeholder PID; the kernel fills in the real one.
    // SAFETY: The payload area was sized for one u64.
    unsafe { ptr::write_unaligned(req.data.as_mut_ptr().cast::<u64>(), 0) };

    ipc::send_sync_request(session).map_err(RegisterClientError::SendRequest)?;

    // SAFETY: The reply was just written to the TLS IPC buffer.
    unsafe { cmif::parse_response(ipc_buf, false, 0) }
        .map_err(RegisterClientError::ParseResponse)?;

    Ok(())
}

/// Error returned by [`register_client`].
#[derive(Debug, thiserror::Error)]
pub enum RegisterClientError {
    /// Failed to send the IPC request.
    #[error("failed to send request")]
    SendRequest(#[source] ipc::SendSyncError),
    /// Failed to parse the CMIF response.
    #[error("failed to parse response")]
    ParseResponse(#[source] cmif::ParseResponseError),
}

impl ToRawResultCode for RegisterClientError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::SendRequest(err) => err.to_rc(),
            Self::ParseResponse(err) => err.to_rc(),
        }
    }
}
