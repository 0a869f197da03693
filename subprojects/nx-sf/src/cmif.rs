//! CMIF command serialization.
//!
//! CMIF sits on top of [HIPC](crate::hipc) and is what every `appletOE`,
//! `usb:hs` or `sm:` command speaks. A request places a 16-byte `"SFCI"`
//! header at the first 16-byte aligned offset of the HIPC data words,
//! followed by the raw payload. Replies carry an `"SFCO"` header whose
//! `result` field is the service's status code.
//!
//! Sessions converted to a *domain* prefix both headers with a domain header
//! naming the target [`ObjectId`], and may carry object IDs in or out after
//! the payload.
//!
//! ```text
//! [HIPC header + descriptors]
//! [pad to 16]
//! [DomainInHeader]        (domain only)
//! [InHeader "SFCI"]
//! [payload]
//! [object IDs]            (domain only)
//! [out pointer size table]
//! ```
//!
//! Layouts follow libnx `sf/cmif.h`.

use core::{mem::size_of, ptr, ptr::NonNull, slice};

use nx_svc::raw::Handle as RawHandle;
use static_assertions::const_assert_eq;

use crate::hipc::{self, BufferMode};

/// `"SFCI"`
const IN_HEADER_MAGIC: u32 = 0x4943_4653;

/// `"SFCO"`
const OUT_HEADER_MAGIC: u32 = 0x4F43_4653;

/// Control request: convert the session into a domain.
pub const CONTROL_CONVERT_TO_DOMAIN: u32 = 0;

/// Control request: query the server's pointer buffer size.
pub const CONTROL_QUERY_POINTER_BUFFER_SIZE: u32 = 3;

/// Builds a CMIF request in the IPC buffer at `base`.
///
/// # Safety
///
/// `base` must point to the thread's IPC buffer and the request described by
/// `fmt` must fit in it.
pub unsafe fn make_request(base: NonNull<u8>, fmt: RequestFormat) -> Request<'static> {
    let mut payload_size = 16 + size_of::<InHeader>() + fmt.data_size;
    if fmt.object_id.is_some() {
        payload_size += size_of::<DomainInHeader>() + fmt.num_objects as usize * 4;
    }
    payload_size = (payload_size + 1) & !1;

    let out_pointer_sizes_offset = payload_size;
    let num_out_pointer_sizes = (fmt.num_out_auto_buffers + fmt.num_out_pointers) as usize;
    payload_size += 2 * num_out_pointer_sizes;

    let num_recv_statics = num_out_pointer_sizes as u32 + fmt.num_out_fixed_pointers;
    let command_type = if fmt.context != 0 {
        CommandType::RequestWithContext
    } else {
        CommandType::Request
    };

    let meta = hipc::Metadata {
        message_type: command_type.into(),
        num_send_statics: (fmt.num_in_auto_buffers + fmt.num_in_pointers) as usize,
        num_send_buffers: (fmt.num_in_auto_buffers + fmt.num_in_buffers) as usize,
        num_recv_buffers: (fmt.num_out_auto_buffers + fmt.num_out_buffers) as usize,
        num_exch_buffers: fmt.num_inout_buffers as usize,
        num_data_words: payload_size.div_ceil(4),
        recv_static_mode: (num_recv_statics > 0)
            .then_some(hipc::RecvStaticMode::Explicit(num_recv_statics as u8)),
        send_pid: fmt.send_pid,
        num_copy_handles: fmt.num_handles as usize,
        num_move_handles: 0,
    };

    // SAFETY: The caller guarantees `base` is the IPC buffer.
    let mut hipc = unsafe { hipc::make_request(base, meta) };
    let words = hipc.data_words.as_mut_ptr().cast::<u8>();
    let start = aligned_data_start(words, base.as_ptr());

    let (header_ptr, objects): (*mut InHeader, &'static mut [u32]) = match fmt.object_id {
        Some(object_id) => {
            let domain_size = size_of::<InHeader>() + fmt.data_size;
            // SAFETY: `start` lies within the data words reserved above.
            unsafe {
                ptr::write(
                    start.cast::<DomainInHeader>(),
                    DomainInHeader {
                        request_type: DomainRequestType::SendMessage as u8,
                        num_in_objects: fmt.num_objects as u8,
                        data_size: domain_size as u16,
                        object_id: object_id.to_raw(),
                        _padding: 0,
                        token: fmt.context,
                    },
                );
                let header = start.add(size_of::<DomainInHeader>()).cast::<InHeader>();
                let objects_ptr = header.cast::<u8>().add(domain_size).cast::<u32>();
                let objects = slice::from_raw_parts_mut(objects_ptr, fmt.num_objects as usize);
                (header, objects)
            }
        }
        None => (start.cast::<InHeader>(), &mut []),
    };

    // SAFETY: `header_ptr` and the payload behind it lie within the data words.
    let data = unsafe {
        ptr::write(
            header_ptr,
            InHeader {
                magic: IN_HEADER_MAGIC,
                version: u32::from(fmt.context != 0),
                command_id: fmt.request_id,
                token: if fmt.object_id.is_some() { 0 } else { fmt.context },
            },
        );
        slice::from_raw_parts_mut(header_ptr.add(1).cast::<u8>(), fmt.data_size)
    };

    // SAFETY: The size table was reserved at the end of the data words.
    let out_pointer_sizes = unsafe {
        slice::from_raw_parts_mut(
            words.add(out_pointer_sizes_offset).cast::<u16>(),
            num_out_pointer_sizes,
        )
    };

    Request {
        hipc,
        data,
        out_pointer_sizes,
        objects,
        server_pointer_size: fmt.server_pointer_size,
        cur_in_ptr_id: 0,
        send_buffer_idx: 0,
        recv_buffer_idx: 0,
        exch_buffer_idx: 0,
        send_static_idx: 0,
        recv_list_idx: 0,
        out_pointer_size_idx: 0,
        object_idx: 0,
        copy_handle_idx: 0,
    }
}

/// Builds a control request and returns a pointer to its `size`-byte payload.
///
/// # Safety
///
/// `base` must point to the thread's IPC buffer.
pub unsafe fn make_control_request(base: NonNull<u8>, request_id: u32, size: usize) -> *mut u8 {
    let meta = hipc::Metadata {
        message_type: CommandType::Control.into(),
        num_data_words: (16 + size_of::<InHeader>() + size).div_ceil(4),
        ..Default::default()
    };

    // SAFETY: The caller guarantees `base` is the IPC buffer.
    let mut hipc = unsafe { hipc::make_request(base, meta) };
    let header = aligned_data_start(hipc.data_words.as_mut_ptr().cast(), base.as_ptr())
        .cast::<InHeader>();

    // SAFETY: The header lies within the data words reserved above.
    unsafe {
        ptr::write(
            header,
            InHeader {
                magic: IN_HEADER_MAGIC,
                version: 0,
                command_id: request_id,
                token: 0,
            },
        );
        header.add(1).cast::<u8>()
    }
}

/// Builds a close request.
///
/// With an object ID this closes a single domain object; without one it
/// closes the whole session.
///
/// # Safety
///
/// `base` must point to the thread's IPC buffer.
pub unsafe fn make_close_request(base: NonNull<u8>, object_id: Option<ObjectId>) {
    let Some(object_id) = object_id else {
        let meta = hipc::Metadata {
            message_type: CommandType::Close.into(),
            ..Default::default()
        };
        // SAFETY: The caller guarantees `base` is the IPC buffer.
        unsafe { hipc::make_request(base, meta) };
        return;
    };

    let meta = hipc::Metadata {
        message_type: CommandType::Request.into(),
        num_data_words: (16 + size_of::<DomainInHeader>()) / 4,
        ..Default::default()
    };

    // SAFETY: The caller guarantees `base` is the IPC buffer.
    let mut hipc = unsafe { hipc::make_request(base, meta) };
    let header = aligned_data_start(hipc.data_words.as_mut_ptr().cast(), base.as_ptr())
        .cast::<DomainInHeader>();

    // SAFETY: The header lies within the data words reserved above.
    unsafe {
        ptr::write(
            header,
            DomainInHeader {
                request_type: DomainRequestType::Close as u8,
                num_in_objects: 0,
                data_size: 0,
                object_id: object_id.to_raw(),
                _padding: 0,
                token: 0,
            },
        );
    }
}

/// Parses a CMIF reply carrying `size` bytes of payload.
///
/// A non-zero `result` in the `"SFCO"` header comes back as
/// [`ParseResponseError::ServiceError`] with the code untouched.
///
/// # Safety
///
/// `base` must point to the thread's IPC buffer right after a successful
/// `svcSendSyncRequest`, and `size` must not exceed the reply payload.
pub unsafe fn parse_response(
    base: NonNull<u8>,
    is_domain: bool,
    size: usize,
) -> Result<Response<'static>, ParseResponseError> {
    // SAFETY: Guaranteed by the caller.
    let hipc = unsafe { hipc::parse_response(base) };
    let start = aligned_data_start(hipc.data_words.as_ptr().cast_mut().cast(), base.as_ptr());

    let (header_ptr, objects): (*const OutHeader, &'static [u32]) = if is_domain {
        // SAFETY: Domain replies start with a domain header, then the CMIF
        // header and payload, then the returned object IDs.
        unsafe {
            let domain = ptr::read(start.cast::<DomainOutHeader>());
            let header = start.add(size_of::<DomainOutHeader>()).cast::<OutHeader>();
            let objects_ptr = header.cast::<u8>().add(size_of::<OutHeader>() + size);
            let objects = slice::from_raw_parts(
                objects_ptr.cast::<u32>(),
                domain.num_out_objects as usize,
            );
            (header.cast_const(), objects)
        }
    } else {
        (start.cast_const().cast(), &[])
    };

    // SAFETY: The header lies within the reply data words.
    let header = unsafe { ptr::read(header_ptr) };
    if header.magic != OUT_HEADER_MAGIC {
        return Err(ParseResponseError::InvalidMagic);
    }
    if header.result != 0 {
        return Err(ParseResponseError::ServiceError(header.result));
    }

    // SAFETY: The payload follows the header; the caller bounds `size`.
    let data = unsafe { slice::from_raw_parts(header_ptr.add(1).cast::<u8>(), size) };

    Ok(Response {
        data,
        objects,
        copy_handles: hipc.copy_handles,
        move_handles: hipc.move_handles,
    })
}

/// Error returned by [`parse_response`].
#[derive(Debug, thiserror::Error)]
pub enum ParseResponseError {
    /// The reply is not a CMIF reply.
    #[error("invalid CMIF magic header")]
    InvalidMagic,
    /// The service returned a non-zero status code.
    #[error("service error: {0:#x}")]
    ServiceError(u32),
}

/// Returns the first 16-byte aligned address (relative to `base`) at or
/// after `data_words`.
#[inline]
fn aligned_data_start(data_words: *mut u8, base: *const u8) -> *mut u8 {
    let offset = data_words as usize - base as usize;
    let aligned = (offset + 0xF) & !0xF;
    data_words.wrapping_add(aligned - offset)
}

/// CMIF command type, carried in the HIPC message type field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CommandType {
    Invalid = 0,
    LegacyRequest = 1,
    Close = 2,
    LegacyControl = 3,
    Request = 4,
    Control = 5,
    RequestWithContext = 6,
    ControlWithContext = 7,
}

impl From<CommandType> for hipc::MessageType {
    fn from(cmd: CommandType) -> Self {
        hipc::MessageType::from_raw(cmd as u16)
    }
}

/// Domain request type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DomainRequestType {
    Invalid = 0,
    SendMessage = 1,
    Close = 2,
}

/// `"SFCI"` request header.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct InHeader {
    pub magic: u32,
    pub version: u32,
    pub command_id: u32,
    pub token: u32,
}

const_assert_eq!(size_of::<InHeader>(), 16);

/// `"SFCO"` reply header.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct OutHeader {
    pub magic: u32,
    pub version: u32,
    pub result: u32,
    pub token: u32,
}

const_assert_eq!(size_of::<OutHeader>(), 16);

/// Domain request header.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct DomainInHeader {
    pub request_type: u8,
    pub num_in_objects: u8,
    /// Size of the CMIF header plus payload.
    pub data_size: u16,
    pub object_id: u32,
    _padding: u32,
    pub token: u32,
}

const_assert_eq!(size_of::<DomainInHeader>(), 16);

/// Domain reply header.
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct DomainOutHeader {
    pub num_out_objects: u32,
    _padding: [u32; 3],
}

const_assert_eq!(size_of::<DomainOutHeader>(), 16);

/// Shape of a request to be built by [`make_request`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestFormat {
    /// Target domain object; `None` for non-domain sessions.
    pub object_id: Option<ObjectId>,
    pub request_id: u32,
    pub context: u32,
    pub data_size: usize,
    pub server_pointer_size: usize,
    pub num_in_auto_buffers: u32,
    pub num_out_auto_buffers: u32,
    pub num_in_buffers: u32,
    pub num_out_buffers: u32,
    pub num_inout_buffers: u32,
    pub num_in_pointers: u32,
    pub num_out_pointers: u32,
    pub num_out_fixed_pointers: u32,
    pub num_objects: u32,
    pub num_handles: u32,
    pub send_pid: bool,
}

/// Builder for [`RequestFormat`], used by hand-rolled requests such as the
/// `sm:` ones.
#[derive(Debug, Clone, Default)]
pub struct RequestFormatBuilder {
    inner: RequestFormat,
}

impl RequestFormatBuilder {
    pub fn new(request_id: u32) -> Self {
        Self {
            inner: RequestFormat {
                request_id,
                ..Default::default()
            },
        }
    }

    pub fn object_id(mut self, id: ObjectId) -> Self {
        self.inner.object_id = Some(id);
        self
    }

    pub fn data_size(mut self, size: usize) -> Self {
        self.inner.data_size = size;
        self
    }

    pub fn handles(mut self, count: u32) -> Self {
        self.inner.num_handles = count;
        self
    }

    pub fn send_pid(mut self) -> Self {
        self.inner.send_pid = true;
        self
    }

    pub fn build(self) -> RequestFormat {
        self.inner
    }
}

/// A CMIF request under construction.
///
/// The `add_*` methods fill descriptors in the order the counts in the
/// [`RequestFormat`] promised.
#[derive(Debug)]
pub struct Request<'a> {
    pub hipc: hipc::Request<'a>,
    pub data: &'a mut [u8],
    pub out_pointer_sizes: &'a mut [u16],
    pub objects: &'a mut [u32],
    /// Pointer buffer space the server still has left.
    pub server_pointer_size: usize,
    pub cur_in_ptr_id: u32,
    send_buffer_idx: usize,
    recv_buffer_idx: usize,
    exch_buffer_idx: usize,
    send_static_idx: usize,
    recv_list_idx: usize,
    out_pointer_size_idx: usize,
    object_idx: usize,
    copy_handle_idx: usize,
}

impl Request<'_> {
    /// Type A.
    pub fn add_in_buffer(&mut self, buffer: *const u8, size: usize, mode: BufferMode) {
        self.hipc.send_buffers[self.send_buffer_idx] =
            hipc::BufferDescriptor::new_buffer(buffer, size, mode);
        self.send_buffer_idx += 1;
    }

    /// Type B.
    pub fn add_out_buffer(&mut self, buffer: *mut u8, size: usize, mode: BufferMode) {
        self.hipc.recv_buffers[self.recv_buffer_idx] =
            hipc::BufferDescriptor::new_buffer(buffer, size, mode);
        self.recv_buffer_idx += 1;
    }

    /// Type W.
    pub fn add_inout_buffer(&mut self, buffer: *mut u8, size: usize, mode: BufferMode) {
        self.hipc.exch_buffers[self.exch_buffer_idx] =
            hipc::BufferDescriptor::new_buffer(buffer, size, mode);
        self.exch_buffer_idx += 1;
    }

    /// Type X.
    pub fn add_in_pointer(&mut self, buffer: *const u8, size: usize) {
        self.hipc.send_statics[self.send_static_idx] =
            hipc::StaticDescriptor::new_send(buffer, size, self.cur_in_ptr_id as u8);
        self.send_static_idx += 1;
        self.cur_in_ptr_id += 1;
        self.server_pointer_size = self.server_pointer_size.saturating_sub(size);
    }

    /// Type C.
    pub fn add_out_fixed_pointer(&mut self, buffer: *mut u8, size: usize) {
        self.hipc.recv_list[self.recv_list_idx] = hipc::RecvListEntry::new_recv(buffer, size);
        self.recv_list_idx += 1;
        self.server_pointer_size = self.server_pointer_size.saturating_sub(size);
    }

    /// Type C with its size recorded in the out pointer size table.
    pub fn add_out_pointer(&mut self, buffer: *mut u8, size: usize) {
        self.add_out_fixed_pointer(buffer, size);
        self.out_pointer_sizes[self.out_pointer_size_idx] = size as u16;
        self.out_pointer_size_idx += 1;
    }

    /// Sends the buffer as a pointer if it fits in what is left of the
    /// server's pointer buffer, otherwise as a mapped alias. The unused half
    /// of the pair is sent empty.
    pub fn add_in_auto_buffer(&mut self, buffer: *const u8, size: usize, mode: BufferMode) {
        if self.server_pointer_size > 0 && size <= self.server_pointer_size {
            self.add_in_pointer(buffer, size);
            self.add_in_buffer(ptr::null(), 0, mode);
        } else {
            self.add_in_pointer(ptr::null(), 0);
            self.add_in_buffer(buffer, size, mode);
        }
    }

    /// Output counterpart of [`add_in_auto_buffer`](Self::add_in_auto_buffer).
    pub fn add_out_auto_buffer(&mut self, buffer: *mut u8, size: usize, mode: BufferMode) {
        if self.server_pointer_size > 0 && size <= self.server_pointer_size {
            self.add_out_pointer(buffer, size);
            self.add_out_buffer(ptr::null_mut(), 0, mode);
        } else {
            self.add_out_pointer(ptr::null_mut(), 0);
            self.add_out_buffer(buffer, size, mode);
        }
    }

    pub fn add_object(&mut self, id: ObjectId) {
        self.objects[self.object_idx] = id.to_raw();
        self.object_idx += 1;
    }

    pub fn add_handle(&mut self, handle: RawHandle) {
        self.hipc.copy_handles[self.copy_handle_idx] = handle;
        self.copy_handle_idx += 1;
    }
}

/// A parsed CMIF reply.
#[derive(Debug)]
pub struct Response<'a> {
    pub data: &'a [u8],
    /// Object IDs returned by a domain.
    pub objects: &'a [u32],
    pub copy_handles: &'a [RawHandle],
    pub move_handles: &'a [RawHandle],
}

/// Identifies one object within a domain session.
///
/// Converting a session to a domain turns the session's own object into the
/// first ID; every interface the domain hands out afterwards (a library
/// applet accessor, a USB interface session) gets its own ID while sharing
/// the single kernel session handle. Zero is never a valid ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Returns `None` for zero.
    #[inline]
    pub const fn new(raw: u32) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }

    #[inline]
    pub const fn to_raw(self) -> u32 {
        self.0
    }
}
