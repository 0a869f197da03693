//! HIPC message framing.
//!
//! HIPC is the kernel-level message format that carries every IPC request on
//! Horizon OS. A message is written to the calling thread's 0x100-byte IPC
//! buffer (offset 0 of the TLS region) and handed to the kernel with
//! `svcSendSyncRequest`, which overwrites the same buffer with the reply.
//!
//! ```text
//! Offset  Field
//! ────────────────────────────────────────────────────────────
//! 0x00    Header (8 B): message type, descriptor counts
//! 0x08    SpecialHeader (4 B, optional): PID flag, handle counts
//!         ProcessId (8 B, optional, reserved by the kernel)
//!         Copy handles, then move handles (4 B each)
//!         Send statics / X (8 B each)
//!         Send buffers / A, recv buffers / B, exch buffers / W (12 B each)
//!         Data words (4 B each)
//!         Recv list / C (8 B each)
//! ```
//!
//! Only the client side is implemented: request construction and reply
//! parsing. The bit layouts follow libnx `sf/hipc.h`.

use core::{mem::size_of, ptr::{self, NonNull}, slice};

use modular_bitfield::prelude::*;
use nx_svc::raw::Handle as RawHandle;
use static_assertions::const_assert_eq;

/// Builds an HIPC request header in `base` and returns the carved-out
/// descriptor and payload sections.
///
/// # Safety
///
/// `base` must point to the thread's IPC buffer (or a buffer at least as
/// large), and `meta` must describe a message that fits in it.
pub unsafe fn make_request<'a>(base: NonNull<u8>, meta: Metadata) -> Request<'a> {
    let has_special_header = meta.has_special_header();
    let recv_static_mode = meta.recv_static_mode.map_or(0, |m| m.to_raw());

    let header = Header::new()
        .with_message_type(meta.message_type.to_raw())
        .with_num_send_statics(meta.num_send_statics as u8)
        .with_num_send_buffers(meta.num_send_buffers as u8)
        .with_num_recv_buffers(meta.num_recv_buffers as u8)
        .with_num_exch_buffers(meta.num_exch_buffers as u8)
        .with_num_data_words(meta.num_data_words as u16)
        .with_recv_static_mode(recv_static_mode)
        .with_recv_list_offset(0)
        .with_has_special_header(has_special_header);

    let mut cursor = Cursor(base.as_ptr());

    // SAFETY: The caller guarantees the buffer is large enough for the header.
    unsafe { cursor.take::<Header>(1)[0] = header };

    if has_special_header {
        let special = SpecialHeader::new()
            .with_send_pid(meta.send_pid)
            .with_num_copy_handles(meta.num_copy_handles as u8)
            .with_num_move_handles(meta.num_move_handles as u8);

        // SAFETY: Still within the message described by `meta`.
        unsafe { cursor.take::<SpecialHeader>(1)[0] = special };

        if meta.send_pid {
            // The kernel fills the PID slot in; only reserve it.
            // SAFETY: Still within the message described by `meta`.
            unsafe { cursor.skip::<u64>(1) };
        }
    }

    // SAFETY: Each section is laid out in the order the kernel expects, and
    // the caller guarantees the whole message fits in the buffer.
    unsafe {
        Request {
            copy_handles: cursor.take(meta.num_copy_handles),
            move_handles: cursor.take(meta.num_move_handles),
            send_statics: cursor.take(meta.num_send_statics),
            send_buffers: cursor.take(meta.num_send_buffers),
            recv_buffers: cursor.take(meta.num_recv_buffers),
            exch_buffers: cursor.take(meta.num_exch_buffers),
            data_words: cursor.take(meta.num_data_words),
            recv_list: cursor.take(meta.recv_static_mode.map_or(0, |m| m.as_count())),
        }
    }
}

/// Parses the HIPC reply the kernel wrote into `base`.
///
/// # Safety
///
/// `base` must point to the thread's IPC buffer right after a successful
/// `svcSendSyncRequest`.
pub unsafe fn parse_response<'a>(base: NonNull<u8>) -> Response<'a> {
    let mut cursor = Cursor(base.as_ptr());

    // SAFETY: Every reply starts with a header.
    let header = unsafe { cursor.read::<Header>() };

    let mut num_copy_handles = 0;
    let mut num_move_handles = 0;
    let mut pid = None;

    if header.has_special_header() {
        // SAFETY: The header says a special header follows.
        let special = unsafe { cursor.read::<SpecialHeader>() };
        num_copy_handles = special.num_copy_handles() as usize;
        num_move_handles = special.num_move_handles() as usize;

        if special.send_pid() {
            // SAFETY: The special header says a PID follows.
            pid = Some(unsafe { cursor.read::<u64>() });
        }
    }

    // SAFETY: The section counts come from the headers the kernel wrote.
    unsafe {
        let copy_handles = cursor.take::<RawHandle>(num_copy_handles);
        let move_handles = cursor.take::<RawHandle>(num_move_handles);
        let statics = cursor.take::<StaticDescriptor>(header.num_send_statics() as usize);
        let data_words = cursor.take::<u32>(header.num_data_words() as usize);

        Response {
            pid,
            statics,
            data_words,
            copy_handles,
            move_handles,
        }
    }
}

/// Sequential writer/reader over the IPC buffer.
struct Cursor(*mut u8);

impl Cursor {
    /// Carves a `len`-element section out of the buffer and advances past it.
    ///
    /// # Safety
    ///
    /// `len` elements of `T` starting at the cursor must lie within the IPC
    /// buffer, and the cursor must be aligned for `T`.
    unsafe fn take<'a, T>(&mut self, len: usize) -> &'a mut [T] {
        if len == 0 {
            return &mut [];
        }
        let ptr = self.0.cast::<T>();
        // SAFETY: Guaranteed by the caller.
        unsafe {
            self.skip::<T>(len);
            slice::from_raw_parts_mut(ptr, len)
        }
    }

    /// Reads one `T` (no alignment required) and advances past it.
    ///
    /// # Safety
    ///
    /// A `T` starting at the cursor must lie within the IPC buffer.
    unsafe fn read<T: Copy>(&mut self) -> T {
        // SAFETY: Guaranteed by the caller.
        unsafe {
            let value = ptr::read_unaligned(self.0.cast::<T>());
            self.skip::<T>(1);
            value
        }
    }

    /// Advances the cursor past `len` elements of `T`.
    ///
    /// # Safety
    ///
    /// The new position must stay within the IPC buffer.
    unsafe fn skip<T>(&mut self, len: usize) {
        // SAFETY: Guaranteed by the caller.
        self.0 = unsafe { self.0.add(len * size_of::<T>()) };
    }
}

/// Buffer transfer mode for HIPC buffer descriptors.
#[derive(BitfieldSpecifier, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[bits = 2]
pub enum BufferMode {
    /// Normal buffer mapping.
    #[default]
    Normal = 0,
    /// Non-secure memory area.
    NonSecure = 1,
    /// Invalid/device memory.
    Invalid = 2,
    /// Non-device memory area.
    NonDevice = 3,
}

/// HIPC message header (8 bytes).
#[bitfield]
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct Header {
    pub message_type: B16,
    pub num_send_statics: B4,
    pub num_send_buffers: B4,
    pub num_recv_buffers: B4,
    pub num_exch_buffers: B4,
    pub num_data_words: B10,
    /// 0 = none, 2 = auto, 2+n = n entries.
    pub recv_static_mode: B4,
    #[skip]
    __padding: B6,
    pub recv_list_offset: B11,
    pub has_special_header: bool,
}

const_assert_eq!(size_of::<Header>(), 8);

/// HIPC special header (4 bytes). Present when a PID or handles are sent.
#[bitfield]
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct SpecialHeader {
    pub send_pid: bool,
    pub num_copy_handles: B4,
    pub num_move_handles: B4,
    #[skip]
    __padding: B23,
}

const_assert_eq!(size_of::<SpecialHeader>(), 4);

/// Send static descriptor, type X (8 bytes).
#[bitfield]
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct StaticDescriptor {
    pub index: B6,
    /// Address bits 36..42.
    pub address_high: B6,
    /// Address bits 32..36.
    pub address_mid: B4,
    pub size: B16,
    /// Address bits 0..32.
    pub address_low: B32,
}

const_assert_eq!(size_of::<StaticDescriptor>(), 8);

impl StaticDescriptor {
    /// Encodes a send static for `size` bytes at `buffer`.
    pub fn new_send(buffer: *const u8, size: usize, index: u8) -> Self {
        let addr = buffer as usize;
        Self::new()
            .with_index(index & 0x3F)
            .with_address_low(addr as u32)
            .with_address_mid(((addr >> 32) & 0xF) as u8)
            .with_address_high(((addr >> 36) & 0x3F) as u8)
            .with_size(size as u16)
    }
}

/// Mapped buffer descriptor, types A/B/W (12 bytes).
#[bitfield]
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct BufferDescriptor {
    /// Size bits 0..32.
    pub size_low: B32,
    /// Address bits 0..32.
    pub address_low: B32,
    pub mode: BufferMode,
    /// Address bits 36..58.
    pub address_high: B22,
    /// Size bits 32..36.
    pub size_high: B4,
    /// Address bits 32..36.
    pub address_mid: B4,
}

const_assert_eq!(size_of::<BufferDescriptor>(), 12);

impl BufferDescriptor {
    /// Encodes a mapped buffer of `size` bytes at `buffer`.
    pub fn new_buffer(buffer: *const u8, size: usize, mode: BufferMode) -> Self {
        let addr = buffer as usize;
        Self::new()
            .with_mode(mode)
            .with_address_low(addr as u32)
            .with_address_mid(((addr >> 32) & 0xF) as u8)
            .with_address_high(((addr >> 36) & 0x3F_FFFF) as u32)
            .with_size_low(size as u32)
            .with_size_high(((size >> 32) & 0xF) as u8)
    }
}

/// Receive list entry, type C (8 bytes).
#[bitfield]
#[derive(Debug, Clone, Copy, Default)]
#[repr(C)]
pub struct RecvListEntry {
    pub address_low: B32,
    pub address_high: B16,
    pub size: B16,
}

const_assert_eq!(size_of::<RecvListEntry>(), 8);

impl RecvListEntry {
    /// Encodes a receive list slot of `size` bytes at `buffer`.
    pub fn new_recv(buffer: *mut u8, size: usize) -> Self {
        let addr = buffer as usize;
        Self::new()
            .with_address_low(addr as u32)
            .with_address_high(((addr >> 32) & 0xFFFF) as u16)
            .with_size(size as u16)
    }
}

/// Section counts of a request to be built.
#[derive(Debug, Clone, Copy, Default)]
pub struct Metadata {
    pub message_type: MessageType,
    pub num_send_statics: usize,
    pub num_send_buffers: usize,
    pub num_recv_buffers: usize,
    pub num_exch_buffers: usize,
    pub num_data_words: usize,
    /// `None` means no receive list.
    pub recv_static_mode: Option<RecvStaticMode>,
    pub send_pid: bool,
    pub num_copy_handles: usize,
    pub num_move_handles: usize,
}

impl Metadata {
    /// A special header is needed when sending a PID or any handles.
    #[inline]
    pub const fn has_special_header(&self) -> bool {
        self.send_pid || self.num_copy_handles > 0 || self.num_move_handles > 0
    }
}

/// Raw 16-bit HIPC message type. CMIF command types convert into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct MessageType(u16);

impl MessageType {
    #[inline]
    pub(crate) const fn from_raw(value: u16) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn to_raw(self) -> u16 {
        self.0
    }
}

/// Receive list mode carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvStaticMode {
    /// Count derived from the send statics (mode 2).
    Auto,
    /// Exactly `n` receive list entries (mode 2+n).
    Explicit(u8),
}

impl RecvStaticMode {
    /// Number of receive list entries reserved in the request.
    ///
    /// `Auto` reserves a single entry, which is what the server writes into.
    #[inline]
    pub const fn as_count(self) -> usize {
        match self {
            Self::Auto => 1,
            Self::Explicit(n) => n as usize,
        }
    }

    #[inline]
    const fn to_raw(self) -> u8 {
        match self {
            Self::Auto => 2,
            Self::Explicit(n) => 2 + n,
        }
    }
}

/// Sections of a request under construction.
#[derive(Debug)]
pub struct Request<'a> {
    pub send_statics: &'a mut [StaticDescriptor],
    pub send_buffers: &'a mut [BufferDescriptor],
    pub recv_buffers: &'a mut [BufferDescriptor],
    pub exch_buffers: &'a mut [BufferDescriptor],
    pub data_words: &'a mut [u32],
    pub recv_list: &'a mut [RecvListEntry],
    pub copy_handles: &'a mut [RawHandle],
    pub move_handles: &'a mut [RawHandle],
}

/// Sections of a parsed reply.
#[derive(Debug)]
pub struct Response<'a> {
    /// PID echoed by the server, if any.
    pub pid: Option<u64>,
    pub statics: &'a [StaticDescriptor],
    pub data_words: &'a [u32],
    pub copy_handles: &'a [RawHandle],
    pub move_handles: &'a [RawHandle],
}
