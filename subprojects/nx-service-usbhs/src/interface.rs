//! `IClientIfSession`: an acquired USB interface.

use core::{mem::size_of, ptr};

use nx_sf::service::{DispatchError, Service};
use nx_svc::{
    error::{LibnxError, ToRawResultCode},
    result::ResultCode,
    sync::{Event, WAIT_FOREVER, WaitSynchronizationError},
};
use nx_usb::{
    cmd::{CtrlXferCommand, IfCommandIds},
    hs::{
        CtrlXferBufferError, UsbHsInterface, UsbHsInterfaceInfo, UsbHsXferReport,
        check_ctrl_xfer_buffer, ctrl_xfer_buffer_size, is_ctrl_xfer_in,
    },
};
use zerocopy::{
    IntoBytes,
    little_endian::{U16, U32, U64},
};

use crate::{
    cmif::{self, GetEventError, RECV_BUFFER, SEND_BUFFER},
    proto::{CtrlXferAsyncIn, SubmitControlRequestIn},
};

/// An acquired USB interface.
///
/// Created by [`UsbHsService::acquire_interface`](crate::UsbHsService::acquire_interface).
/// Holds a domain object of the `usb:hs` session, so it must be closed before
/// the root service.
pub struct ClientIfSession {
    service: Service,
    ids: IfCommandIds,
    event_if: Event,
    event_ctrl_xfer: Option<Event>,
    id: i32,
    inf: UsbHsInterface,
}

impl ClientIfSession {
    /// Wraps the interface session object returned by `AcquireUsbIf`.
    ///
    /// `id` is the interface ID the acquire was requested for.
    ///
    /// Fetches the state change event and, on 2.0.0+, the control transfer
    /// completion event. On failure the subservice and any fetched event are
    /// released.
    pub(crate) fn open(
        service: Service,
        ids: IfCommandIds,
        id: i32,
        inf: UsbHsInterface,
    ) -> Result<Self, GetEventError> {
        let event_if = match cmif::get_event(&service, IfCommandIds::GET_STATE_CHANGE_EVENT, false)
        {
            Ok(event) => event,
            Err(err) => {
                service.close();
                return Err(err);
            }
        };

        let event_ctrl_xfer = match ids.get_ctrl_xfer_completion_event() {
            Some(cmd_id) => match cmif::get_event(&service, cmd_id, false) {
                Ok(event) => Some(event),
                Err(err) => {
                    close_event(event_if, "interface state change");
                    service.close();
                    return Err(err);
                }
            },
            None => None,
        };

        Ok(Self {
            service,
            ids,
            event_if,
            event_ctrl_xfer,
            id,
            inf,
        })
    }

    /// Interface ID this session was acquired for.
    #[inline]
    pub fn id(&self) -> i32 {
        self.id
    }

    /// The interface record, with `inf.inf` as last reported by the service.
    #[inline]
    pub fn interface(&self) -> &UsbHsInterface {
        &self.inf
    }

    /// Event signalled when the interface state changes (for example on
    /// detach).
    #[inline]
    pub fn state_change_event(&self) -> &Event {
        &self.event_if
    }

    /// Selects alternate setting `id` and reads back the interface info.
    ///
    /// With `out` set to `None` the session's own record is updated.
    pub fn set_interface(
        &mut self,
        id: u8,
        out: Option<&mut UsbHsInterfaceInfo>,
    ) -> Result<(), InterfaceInfoError> {
        let out = out.unwrap_or(&mut self.inf.inf);
        get_interface_info(&self.service, IfCommandIds::SET_INTERFACE, Some(id), out)
    }

    /// Reads the current interface info.
    ///
    /// With `out` set to `None` the session's own record is updated.
    pub fn get_interface(
        &mut self,
        out: Option<&mut UsbHsInterfaceInfo>,
    ) -> Result<(), InterfaceInfoError> {
        let out = out.unwrap_or(&mut self.inf.inf);
        get_interface_info(&self.service, IfCommandIds::GET_INTERFACE, None, out)
    }

    /// Reads the info of alternate setting `id` without selecting it.
    pub fn get_alternate_interface(
        &self,
        id: u8,
        out: &mut UsbHsInterfaceInfo,
    ) -> Result<(), InterfaceInfoError> {
        get_interface_info(&self.service, IfCommandIds::GET_ALTERNATE_INTERFACE, Some(id), out)
    }

    /// Returns the current USB frame number.
    pub fn get_current_frame(&self) -> Result<u32, GetCurrentFrameError> {
        let res = self
            .service
            .dispatch(self.ids.get_current_frame())
            .out_size(size_of::<u32>())
            .send()
            .map_err(GetCurrentFrameError::Dispatch)?;

        // SAFETY: The reply payload was sized for one u32.
        Ok(unsafe { ptr::read_unaligned(res.data.as_ptr().cast::<u32>()) })
    }

    /// Runs a control transfer on the default endpoint and returns the number
    /// of bytes transferred.
    ///
    /// `buffer` must start on a 0x1000 boundary and be at least `w_length`
    /// rounded up to 0x1000 bytes long. The data stage is read from it for
    /// host-to-device requests and written to it for device-to-host ones.
    pub fn ctrl_xfer(
        &self,
        bm_request_type: u8,
        b_request: u8,
        w_value: u16,
        w_index: u16,
        w_length: u16,
        buffer: &mut [u8],
    ) -> Result<u32, CtrlXferError> {
        check_ctrl_xfer_buffer(buffer, w_length).map_err(CtrlXferError::InvalidBuffer)?;

        let is_in = is_ctrl_xfer_in(bm_request_type);
        let command = self.ids.ctrl_xfer(is_in);
        log::trace!("ctrl xfer {bm_request_type:#04x}/{b_request:#04x}, {w_length} bytes via {command:?}");

        match command {
            CtrlXferCommand::Sync { cmd } => {
                let input = SubmitControlRequestIn {
                    b_request,
                    bm_request_type,
                    w_value: U16::new(w_value),
                    w_index: U16::new(w_index),
                    w_length: U16::new(w_length),
                    timeout_ms: U32::new(0),
                };
                self.submit_control_request(cmd, is_in, &input, buffer)
            }
            CtrlXferCommand::Async { submit, report } => {
                let input = CtrlXferAsyncIn {
                    bm_request_type,
                    b_request,
                    w_value: U16::new(w_value),
                    w_index: U16::new(w_index),
                    w_length: U16::new(w_length),
                    buffer: U64::new(buffer.as_ptr() as u64),
                };
                self.ctrl_xfer_async(submit, report, &input)
            }
        }
    }

    fn submit_control_request(
        &self,
        cmd_id: u32,
        is_in: bool,
        input: &SubmitControlRequestIn,
        buffer: &mut [u8],
    ) -> Result<u32, CtrlXferError> {
        let w_length = input.w_length.get();
        let data_len = usize::from(w_length);

        nx_cpu::cache::flush_data_cache(buffer.as_ptr(), data_len);

        let attr = if is_in { RECV_BUFFER } else { SEND_BUFFER };
        let dispatch = self
            .service
            .dispatch(cmd_id)
            .buffer(buffer.as_mut_ptr().cast_const(), ctrl_xfer_buffer_size(w_length), attr)
            .out_size(size_of::<u32>());

        // SAFETY: input lives until send() completes.
        let dispatch = unsafe { dispatch.in_raw(input.as_bytes().as_ptr(), size_of::<SubmitControlRequestIn>()) };

        let res = dispatch.send().map_err(CtrlXferError::Dispatch)?;

        // SAFETY: The reply payload was sized for one u32.
        let transferred = unsafe { ptr::read_unaligned(res.data.as_ptr().cast::<u32>()) };

        if is_in {
            nx_cpu::cache::flush_data_cache(buffer.as_ptr(), data_len);
        }

        Ok(transferred)
    }

    fn ctrl_xfer_async(
        &self,
        submit: u32,
        report: u32,
        input: &CtrlXferAsyncIn,
    ) -> Result<u32, CtrlXferError> {
        let event = self
            .event_ctrl_xfer
            .as_ref()
            .ok_or(CtrlXferError::MissingEvent)?;

        let dispatch = self.service.dispatch(submit);
        // SAFETY: input lives until send() completes.
        let dispatch = unsafe { dispatch.in_raw(input.as_bytes().as_ptr(), size_of::<CtrlXferAsyncIn>()) };
        dispatch.send().map_err(CtrlXferError::Dispatch)?;

        event.wait(WAIT_FOREVER).map_err(CtrlXferError::Wait)?;
        if let Err(err) = event.clear() {
            log::warn!("failed to clear control transfer event: {err}");
        }

        let mut xfer_report = UsbHsXferReport::default();
        let out = xfer_report.as_mut_bytes();
        self.service
            .dispatch(report)
            .buffer(out.as_mut_ptr().cast_const(), out.len(), RECV_BUFFER)
            .send()
            .map_err(CtrlXferError::Dispatch)?;

        let transferred = xfer_report.transferred_size();
        log::trace!("ctrl xfer report: res {:#x}, {transferred} bytes", xfer_report.result_code());
        match xfer_report.result_code() {
            0 => Ok(transferred),
            code => Err(CtrlXferError::Transfer { code, transferred }),
        }
    }

    /// Resets the device the interface belongs to.
    ///
    /// All interfaces of the device become invalid and must be closed.
    pub fn reset_device(&self) -> Result<(), ResetDeviceError> {
        self.service
            .dispatch(IfCommandIds::RESET_DEVICE)
            .send()
            .map_err(ResetDeviceError::Dispatch)?;
        Ok(())
    }

    /// Consumes the session, closing the interface object and both events.
    pub fn close(self) {
        log::debug!("releasing usb interface {}", self.id);
        self.service.close();
        close_event(self.event_if, "interface state change");
        if let Some(event) = self.event_ctrl_xfer {
            close_event(event, "control transfer");
        }
    }
}

/// Closes `event`, logging failures.
pub(crate) fn close_event(event: Event, what: &str) {
    if let Err(err) = event.close() {
        log::warn!("failed to close {what} event: {err}");
    }
}

/// Shared body of the interface info commands.
fn get_interface_info(
    service: &Service,
    cmd_id: u32,
    id: Option<u8>,
    out: &mut UsbHsInterfaceInfo,
) -> Result<(), InterfaceInfoError> {
    let out = out.as_mut_bytes();
    let mut dispatch = service
        .dispatch(cmd_id)
        .buffer(out.as_mut_ptr().cast_const(), out.len(), RECV_BUFFER);

    if let Some(id) = &id {
        // SAFETY: id lives until send() completes.
        dispatch = unsafe { dispatch.in_raw(ptr::from_ref(id), size_of::<u8>()) };
    }

    dispatch.send().map_err(InterfaceInfoError::Dispatch)?;
    Ok(())
}

/// Error returned by [`ClientIfSession::set_interface`],
/// [`ClientIfSession::get_interface`] and
/// [`ClientIfSession::get_alternate_interface`].
#[derive(Debug, thiserror::Error)]
pub enum InterfaceInfoError {
    /// Failed to dispatch the request.
    #[error("failed to dispatch request")]
    Dispatch(#[source] DispatchError),
}

impl ToRawResultCode for InterfaceInfoError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::Dispatch(err) => err.to_rc(),
        }
    }
}

/// Error returned by [`ClientIfSession::get_current_frame`].
#[derive(Debug, thiserror::Error)]
pub enum GetCurrentFrameError {
    /// Failed to dispatch the request.
    #[error("failed to dispatch request")]
    Dispatch(#[source] DispatchError),
}

impl ToRawResultCode for GetCurrentFrameError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::Dispatch(err) => err.to_rc(),
        }
    }
}

/// Error returned by [`ClientIfSession::ctrl_xfer`].
#[derive(Debug, thiserror::Error)]
pub enum CtrlXferError {
    /// The buffer is misaligned or too short; nothing was sent.
    #[error("invalid control transfer buffer")]
    InvalidBuffer(#[source] CtrlXferBufferError),
    /// Failed to dispatch a request.
    #[error("failed to dispatch request")]
    Dispatch(#[source] DispatchError),
    /// Waiting for the completion event failed.
    #[error("failed to wait for transfer completion")]
    Wait(#[source] WaitSynchronizationError),
    /// The session has no completion event.
    #[error("control transfer completion event missing")]
    MissingEvent,
    /// The transfer completed with an error.
    #[error("control transfer failed with {code:#x} after {transferred} bytes")]
    Transfer { code: ResultCode, transferred: u32 },
}

impl ToRawResultCode for CtrlXferError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::InvalidBuffer(_) => LibnxError::BadInput.to_rc(),
            Self::Dispatch(err) => err.to_rc(),
            Self::Wait(err) => err.to_rc(),
            Self::MissingEvent => LibnxError::NotInitialized.to_rc(),
            Self::Transfer { code, .. } => code,
        }
    }
}

/// Error returned by [`ClientIfSession::reset_device`].
#[derive(Debug, thiserror::Error)]
pub enum ResetDeviceError {
    /// Failed to dispatch the request.
    #[error("failed to dispatch request")]
    Dispatch(#[source] DispatchError),
}

impl ToRawResultCode for ResetDeviceError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::Dispatch(err) => err.to_rc(),
        }
    }
}
