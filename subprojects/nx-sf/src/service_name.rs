//! Service names as registered with the service manager.
//!
//! A name is up to 8 ASCII bytes, zero padded, and travels as a single `u64`
//! in `sm:` requests.

use static_assertions::const_assert_eq;

/// Fixed-capacity ASCII service name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ServiceName([u8; 8]);

const_assert_eq!(size_of::<ServiceName>(), size_of::<u64>());

impl ServiceName {
    /// Maximum length of a service name.
    pub const MAX_LEN: usize = 8;

    /// Returns `None` if `name` is longer than 8 bytes or not ASCII.
    pub const fn new(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        if bytes.len() > Self::MAX_LEN {
            return None;
        }

        let mut out = [0u8; 8];
        let mut i = 0;
        while i < bytes.len() {
            if !bytes[i].is_ascii() {
                return None;
            }
            out[i] = bytes[i];
            i += 1;
        }
        Some(Self(out))
    }

    /// Like [`new`](Self::new), for names fixed at compile time.
    ///
    /// # Panics
    ///
    /// Panics (at compile time when used in a `const`) if the name is invalid.
    pub const fn from_static(name: &'static str) -> Self {
        match Self::new(name) {
            Some(name) => name,
            None => panic!("invalid service name"),
        }
    }

    /// Returns the name packed little-endian into a `u64`, as sent on the wire.
    #[inline]
    pub const fn to_u64(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }

    /// Returns the name without its zero padding.
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(Self::MAX_LEN);
        &self.0[..len]
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }
}

impl core::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<str> for ServiceName {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
