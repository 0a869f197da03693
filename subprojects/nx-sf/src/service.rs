//! Client-side service sessions.
//!
//! A [`Service`] is one CMIF endpoint: either a whole kernel session, or one
//! object inside a session that has been converted to a domain.
//!
//! | Kind              | `own_handle` | `object_id` |
//! |-------------------|--------------|-------------|
//! | Plain session     | `true`       | `None`      |
//! | Domain root       | `true`       | `Some(_)`   |
//! | Domain subservice | `false`      | `Some(_)`   |
//!
//! Requests go out through the [`Dispatch`] builder, which lays out buffers,
//! objects and handles the way libnx's `serviceDispatch` macros do and parses
//! the reply.

use core::{mem::size_of, ptr};

use nx_svc::{
    error::{LibnxError, ToRawResultCode},
    ipc::{self, Handle as SessionHandle, SendSyncError},
    raw::Handle as RawHandle,
    result::ResultCode,
};

use crate::{
    cmif::{self, ObjectId, ParseResponseError},
    hipc::BufferMode,
};

/// An open CMIF endpoint.
#[derive(Debug)]
pub struct Service {
    /// Kernel session handle (shared by every object of a domain).
    pub session: SessionHandle,
    /// Whether closing this service closes the kernel session.
    pub own_handle: bool,
    /// Object ID within the domain, if the session is a domain.
    pub object_id: Option<ObjectId>,
    /// Size of the server's pointer buffer, used by auto-select buffers.
    pub pointer_buffer_size: u16,
}

impl Service {
    /// Wraps a freshly obtained session handle.
    ///
    /// Queries the server's pointer buffer size; a server that refuses the
    /// query is treated as having none, so auto-select buffers fall back to
    /// mapped aliases.
    pub fn new(session: SessionHandle) -> Self {
        let pointer_buffer_size = query_pointer_buffer_size(session).unwrap_or(0);
        Self {
            session,
            own_handle: true,
            object_id: None,
            pointer_buffer_size,
        }
    }

    /// Creates the service for an object returned by a domain request.
    ///
    /// The new service borrows the parent's session handle; only the object
    /// is released when it is closed.
    pub fn new_domain_subservice(parent: &Service, object_id: ObjectId) -> Self {
        Self {
            session: parent.session,
            own_handle: false,
            object_id: Some(object_id),
            pointer_buffer_size: parent.pointer_buffer_size,
        }
    }

    /// Creates the service for a session moved back by a non-domain request.
    ///
    /// The new service owns `session` and inherits the parent's pointer
    /// buffer size.
    pub fn new_non_domain_subservice(parent: &Service, session: SessionHandle) -> Self {
        Self {
            session,
            own_handle: true,
            object_id: None,
            pointer_buffer_size: parent.pointer_buffer_size,
        }
    }

    /// Converts the session into a domain (control request 0).
    ///
    /// Does nothing if the service already is a domain object.
    pub fn convert_to_domain(&mut self) -> Result<(), ConvertToDomainError> {
        if self.object_id.is_some() {
            return Ok(());
        }

        let ipc_buf = nx_sys_thread_tls::ipc_buffer_ptr();

        // SAFETY: The TLS IPC buffer is valid for the current thread.
        unsafe { cmif::make_control_request(ipc_buf, cmif::CONTROL_CONVERT_TO_DOMAIN, 0) };

        ipc::send_sync_request(self.session).map_err(ConvertToDomainError::SendRequest)?;

        // SAFETY: The reply was just written to the TLS IPC buffer.
        let resp = unsafe { cmif::parse_response(ipc_buf, false, size_of::<u32>()) }
            .map_err(ConvertToDomainError::ParseResponse)?;

        // SAFETY: The reply carries a u32 object ID.
        let raw = unsafe { ptr::read_unaligned(resp.data.as_ptr().cast::<u32>()) };
        self.object_id = Some(ObjectId::new(raw).ok_or(ConvertToDomainError::InvalidObjectId)?);

        Ok(())
    }

    /// Returns `true` when requests must carry a domain header.
    #[inline]
    pub fn is_domain(&self) -> bool {
        self.object_id.is_some()
    }

    /// Releases the service.
    ///
    /// A domain subservice closes its object; a service owning the session
    /// sends a session close and closes the handle. Failures are ignored,
    /// the server drops everything tied to the session anyway.
    pub fn close(self) {
        let ipc_buf = nx_sys_thread_tls::ipc_buffer_ptr();
        let close_object = if self.own_handle { None } else { self.object_id };

        // SAFETY: The TLS IPC buffer is valid for the current thread.
        unsafe { cmif::make_close_request(ipc_buf, close_object) };
        let _ = ipc::send_sync_request(self.session);

        if self.own_handle {
            if let Err(err) = ipc::close_handle(self.session) {
                log::warn!("failed to close session handle: {err}");
            }
        }
    }

    /// Starts building request `request_id` for this service.
    #[inline]
    pub fn dispatch(&self, request_id: u32) -> Dispatch<'_> {
        Dispatch::new(self, request_id)
    }
}

/// Queries the server's pointer buffer size (control request 3).
fn query_pointer_buffer_size(session: SessionHandle) -> Result<u16, DispatchError> {
    let ipc_buf = nx_sys_thread_tls::ipc_buffer_ptr();

    // SAFETY: The TLS IPC buffer is valid for the current thread.
    unsafe { cmif::make_control_request(ipc_buf, cmif::CONTROL_QUERY_POINTER_BUFFER_SIZE, 0) };

    ipc::send_sync_request(session).map_err(DispatchError::SendRequest)?;

    // SAFETY: The reply was just written to the TLS IPC buffer.
    let resp = unsafe { cmif::parse_response(ipc_buf, false, size_of::<u16>()) }
        .map_err(DispatchError::ParseResponse)?;

    // SAFETY: The reply carries a u16.
    Ok(unsafe { ptr::read_unaligned(resp.data.as_ptr().cast::<u16>()) })
}

/// Error returned by [`Service::convert_to_domain`].
#[derive(Debug, thiserror::Error)]
pub enum ConvertToDomainError {
    /// The kernel rejected the request.
    #[error("failed to send request")]
    SendRequest(#[source] SendSyncError),
    /// The server replied with an error.
    #[error("failed to parse response")]
    ParseResponse(#[source] ParseResponseError),
    /// The server returned object ID 0.
    #[error("invalid domain object ID")]
    InvalidObjectId,
}

impl ToRawResultCode for ConvertToDomainError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::SendRequest(err) => err.to_rc(),
            Self::ParseResponse(err) => err.to_rc(),
            Self::InvalidObjectId => LibnxError::ShouldNotHappen.to_rc(),
        }
    }
}

impl ToRawResultCode for ParseResponseError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::InvalidMagic => LibnxError::InvalidCmifOutHeader.to_rc(),
            Self::ServiceError(code) => code,
        }
    }
}

/// Maximum number of buffers in a single dispatch.
pub const MAX_BUFFERS: usize = 8;

/// Maximum number of input objects in a single dispatch.
pub const MAX_IN_OBJECTS: usize = 8;

/// Maximum number of input handles in a single dispatch.
pub const MAX_IN_HANDLES: usize = 8;

/// Maximum number of output objects in a single dispatch.
pub const MAX_OUT_OBJECTS: usize = 8;

/// Maximum number of output handles in a single dispatch.
pub const MAX_OUT_HANDLES: usize = 8;

/// Buffer attribute flags (libnx `SfBufferAttr`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferAttr(pub u32);

impl BufferAttr {
    pub const IN: Self = Self(1 << 0);
    pub const OUT: Self = Self(1 << 1);
    /// Mapped alias buffer (A/B/W).
    pub const HIPC_MAP_ALIAS: Self = Self(1 << 2);
    /// Pointer buffer (X/C).
    pub const HIPC_POINTER: Self = Self(1 << 3);
    pub const FIXED_SIZE: Self = Self(1 << 4);
    /// Pointer if it fits the server pointer buffer, otherwise mapped alias.
    pub const HIPC_AUTO_SELECT: Self = Self(1 << 5);
    pub const MAP_TRANSFER_ALLOWS_NON_SECURE: Self = Self(1 << 6);
    pub const MAP_TRANSFER_ALLOWS_NON_DEVICE: Self = Self(1 << 7);

    #[inline]
    pub const fn or(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn contains(self, flag: Self) -> bool {
        (self.0 & flag.0) != 0
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    fn mode(self) -> BufferMode {
        if self.contains(Self::MAP_TRANSFER_ALLOWS_NON_SECURE) {
            BufferMode::NonSecure
        } else if self.contains(Self::MAP_TRANSFER_ALLOWS_NON_DEVICE) {
            BufferMode::NonDevice
        } else {
            BufferMode::Normal
        }
    }
}

/// Expected kind of an output handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OutHandleAttr {
    #[default]
    None = 0,
    Copy = 1,
    Move = 2,
}

#[derive(Debug, Clone, Copy)]
struct Buffer {
    ptr: *const u8,
    size: usize,
    attr: BufferAttr,
}

impl Default for Buffer {
    fn default() -> Self {
        Self {
            ptr: ptr::null(),
            size: 0,
            attr: BufferAttr::default(),
        }
    }
}

/// Builder for one CMIF request.
#[derive(Debug)]
pub struct Dispatch<'a> {
    service: &'a Service,
    request_id: u32,
    in_data: *const u8,
    in_data_size: usize,
    out_data_size: usize,
    buffers: [Buffer; MAX_BUFFERS],
    buffer_count: usize,
    in_objects: [Option<ObjectId>; MAX_IN_OBJECTS],
    in_object_count: usize,
    in_handles: [RawHandle; MAX_IN_HANDLES],
    in_handle_count: usize,
    out_object_count: usize,
    out_handle_attrs: [OutHandleAttr; MAX_OUT_HANDLES],
    out_handle_count: usize,
    send_pid: bool,
}

impl<'a> Dispatch<'a> {
    fn new(service: &'a Service, request_id: u32) -> Self {
        Self {
            service,
            request_id,
            in_data: ptr::null(),
            in_data_size: 0,
            out_data_size: 0,
            buffers: [Buffer::default(); MAX_BUFFERS],
            buffer_count: 0,
            in_objects: [None; MAX_IN_OBJECTS],
            in_object_count: 0,
            in_handles: [0; MAX_IN_HANDLES],
            in_handle_count: 0,
            out_object_count: 0,
            out_handle_attrs: [OutHandleAttr::None; MAX_OUT_HANDLES],
            out_handle_count: 0,
            send_pid: false,
        }
    }

    /// Sets the raw request payload.
    ///
    /// # Safety
    ///
    /// `data` must be valid for `size` bytes until [`send`](Self::send).
    #[inline]
    pub unsafe fn in_raw(mut self, data: *const u8, size: usize) -> Self {
        self.in_data = data;
        self.in_data_size = size;
        self
    }

    /// Sets the size of the reply payload.
    #[inline]
    pub fn out_size(mut self, size: usize) -> Self {
        self.out_data_size = size;
        self
    }

    /// Adds a buffer. Extra buffers beyond [`MAX_BUFFERS`] are ignored.
    #[inline]
    pub fn buffer(mut self, ptr: *const u8, size: usize, attr: BufferAttr) -> Self {
        if self.buffer_count < MAX_BUFFERS {
            self.buffers[self.buffer_count] = Buffer { ptr, size, attr };
            self.buffer_count += 1;
        }
        self
    }

    /// Passes a service object in (for example a storage pushed to an
    /// applet).
    ///
    /// A domain object is sent by ID when this service is a domain too;
    /// otherwise the object's session handle is sent as a copy handle.
    pub fn in_object(mut self, object: &Service) -> Self {
        match object.object_id {
            Some(object_id) if self.service.is_domain() => {
                if self.in_object_count < MAX_IN_OBJECTS {
                    self.in_objects[self.in_object_count] = Some(object_id);
                    self.in_object_count += 1;
                }
                self
            }
            _ => self.in_handle(object.session.to_raw()),
        }
    }

    /// Passes a copy handle in.
    #[inline]
    pub fn in_handle(mut self, handle: RawHandle) -> Self {
        if self.in_handle_count < MAX_IN_HANDLES {
            self.in_handles[self.in_handle_count] = handle;
            self.in_handle_count += 1;
        }
        self
    }

    /// Sets the number of objects expected back, at most [`MAX_OUT_OBJECTS`].
    ///
    /// A domain returns them as object IDs, a plain session as the first
    /// move handles of the reply.
    #[inline]
    pub fn out_objects(mut self, count: usize) -> Self {
        self.out_object_count = count.min(MAX_OUT_OBJECTS);
        self
    }

    /// Declares the kind of output handle `index`.
    #[inline]
    pub fn out_handle(mut self, index: usize, attr: OutHandleAttr) -> Self {
        if index < MAX_OUT_HANDLES {
            self.out_handle_attrs[index] = attr;
            self.out_handle_count = self.out_handle_count.max(index + 1);
        }
        self
    }

    /// Asks the kernel to send the caller's PID.
    #[inline]
    pub fn send_pid(mut self) -> Self {
        self.send_pid = true;
        self
    }

    /// Sends the request and parses the reply.
    ///
    /// The returned slices point into the TLS IPC buffer and are only valid
    /// until the next request on this thread.
    pub fn send(self) -> Result<DispatchResult<'static>, DispatchError> {
        if !self.service.session.is_valid() {
            return Err(DispatchError::InactiveService);
        }

        let ipc_buf = nx_sys_thread_tls::ipc_buffer_ptr();
        let buffers = &self.buffers[..self.buffer_count];

        let mut fmt = cmif::RequestFormat {
            object_id: self.service.object_id,
            request_id: self.request_id,
            data_size: self.in_data_size,
            server_pointer_size: usize::from(self.service.pointer_buffer_size),
            num_objects: self.in_object_count as u32,
            num_handles: self.in_handle_count as u32,
            send_pid: self.send_pid,
            ..Default::default()
        };

        for buf in buffers {
            let (is_in, is_out) = (buf.attr.contains(BufferAttr::IN), buf.attr.contains(BufferAttr::OUT));
            if buf.attr.contains(BufferAttr::HIPC_AUTO_SELECT) {
                fmt.num_in_auto_buffers += u32::from(is_in);
                fmt.num_out_auto_buffers += u32::from(is_out);
            } else if buf.attr.contains(BufferAttr::HIPC_MAP_ALIAS) {
                match (is_in, is_out) {
                    (true, true) => fmt.num_inout_buffers += 1,
                    (true, false) => fmt.num_in_buffers += 1,
                    (false, true) => fmt.num_out_buffers += 1,
                    (false, false) => {}
                }
            } else if buf.attr.contains(BufferAttr::HIPC_POINTER) {
                if is_in {
                    fmt.num_in_pointers += 1;
                } else if is_out && buf.attr.contains(BufferAttr::FIXED_SIZE) {
                    fmt.num_out_fixed_pointers += 1;
                } else if is_out {
                    fmt.num_out_pointers += 1;
                }
            }
        }

        // SAFETY: The TLS IPC buffer is valid for the current thread.
        let mut req = unsafe { cmif::make_request(ipc_buf, fmt) };

        if !self.in_data.is_null() && self.in_data_size > 0 {
            // SAFETY: `in_raw` guarantees the source; `req.data` has exactly
            // `in_data_size` bytes.
            unsafe {
                ptr::copy_nonoverlapping(self.in_data, req.data.as_mut_ptr(), self.in_data_size);
            }
        }

        for buf in buffers {
            let (is_in, is_out) = (buf.attr.contains(BufferAttr::IN), buf.attr.contains(BufferAttr::OUT));
            let mode = buf.attr.mode();
            let out_ptr = buf.ptr.cast_mut();

            if buf.attr.contains(BufferAttr::HIPC_AUTO_SELECT) {
                if is_in {
                    req.add_in_auto_buffer(buf.ptr, buf.size, mode);
                }
                if is_out {
                    req.add_out_auto_buffer(out_ptr, buf.size, mode);
                }
            } else if buf.attr.contains(BufferAttr::HIPC_MAP_ALIAS) {
                match (is_in, is_out) {
                    (true, true) => req.add_inout_buffer(out_ptr, buf.size, mode),
                    (true, false) => req.add_in_buffer(buf.ptr, buf.size, mode),
                    (false, true) => req.add_out_buffer(out_ptr, buf.size, mode),
                    (false, false) => {}
                }
            } else if buf.attr.contains(BufferAttr::HIPC_POINTER) {
                if is_in {
                    req.add_in_pointer(buf.ptr, buf.size);
                } else if is_out && buf.attr.contains(BufferAttr::FIXED_SIZE) {
                    req.add_out_fixed_pointer(out_ptr, buf.size);
                } else if is_out {
                    req.add_out_pointer(out_ptr, buf.size);
                }
            }
        }

        for object in self.in_objects[..self.in_object_count].iter().flatten() {
            req.add_object(*object);
        }

        for handle in &self.in_handles[..self.in_handle_count] {
            req.add_handle(*handle);
        }

        ipc::send_sync_request(self.service.session).map_err(DispatchError::SendRequest)?;

        let is_domain = self.service.is_domain();

        // SAFETY: The reply was just written to the TLS IPC buffer.
        let resp = unsafe { cmif::parse_response(ipc_buf, is_domain, self.out_data_size) }
            .map_err(DispatchError::ParseResponse)?;

        // Out objects of a plain session take the leading move handles.
        let (object_handles, move_handles) = if is_domain {
            (&resp.move_handles[..0], resp.move_handles)
        } else {
            resp.move_handles
                .split_at(self.out_object_count.min(resp.move_handles.len()))
        };

        let mut copy_iter = resp.copy_handles.iter().copied();
        let mut move_iter = move_handles.iter().copied();
        let mut out_handles = [None; MAX_OUT_HANDLES];
        for (slot, attr) in out_handles
            .iter_mut()
            .zip(&self.out_handle_attrs[..self.out_handle_count])
        {
            *slot = match attr {
                OutHandleAttr::Copy => copy_iter.next(),
                OutHandleAttr::Move => move_iter.next(),
                OutHandleAttr::None => None,
            };
        }

        Ok(DispatchResult {
            data: resp.data,
            objects: resp.objects,
            copy_handles: resp.copy_handles,
            move_handles: resp.move_handles,
            is_domain,
            out_object_count: self.out_object_count,
            object_handles,
            out_handles,
        })
    }
}

/// Reply of a successful [`Dispatch::send`].
#[derive(Debug)]
pub struct DispatchResult<'a> {
    pub data: &'a [u8],
    /// Object IDs returned by a domain.
    pub objects: &'a [u32],
    pub copy_handles: &'a [RawHandle],
    pub move_handles: &'a [RawHandle],
    is_domain: bool,
    out_object_count: usize,
    object_handles: &'a [RawHandle],
    out_handles: [Option<RawHandle>; MAX_OUT_HANDLES],
}

impl DispatchResult<'_> {
    /// Wraps out object `index` as a service under `parent`, the service the
    /// request was sent to.
    ///
    /// Returns `None` if `index` was not requested with
    /// [`Dispatch::out_objects`] or the reply lacks it.
    pub fn out_object(&self, parent: &Service, index: usize) -> Option<Service> {
        if index >= self.out_object_count {
            return None;
        }

        if self.is_domain {
            let object_id = ObjectId::new(*self.objects.get(index)?)?;
            Some(Service::new_domain_subservice(parent, object_id))
        } else {
            let raw = *self.object_handles.get(index)?;
            // SAFETY: The server moved this session handle to us.
            let session = unsafe { SessionHandle::from_raw(raw) };
            Some(Service::new_non_domain_subservice(parent, session))
        }
    }

    /// Returns out handle `index`, of the kind declared with
    /// [`Dispatch::out_handle`].
    ///
    /// Returns `None` if the handle was not declared or the reply lacks it.
    #[inline]
    pub fn out_handle(&self, index: usize) -> Option<RawHandle> {
        self.out_handles.get(index).copied().flatten()
    }
}

/// Error returned by [`Dispatch::send`].
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The kernel rejected the request.
    #[error("failed to send request")]
    SendRequest(#[source] SendSyncError),
    /// The reply was malformed or carried a service error code.
    #[error("failed to parse response")]
    ParseResponse(#[source] ParseResponseError),
    /// The service has no session.
    #[error("service is not active")]
    InactiveService,
}

impl ToRawResultCode for DispatchError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::SendRequest(err) => err.to_rc(),
            Self::ParseResponse(err) => err.to_rc(),
            Self::InactiveService => LibnxError::NotInitialized.to_rc(),
        }
    }
}
