//! Horizon OS version.
//!
//! The version is packed as `major << 16 | minor << 8 | micro`, the same
//! layout `set:sys` GetFirmwareVersion is usually folded into. Bit 31 marks
//! Atmosphère and never takes part in comparisons.

use core::{
    cmp::Ordering as CmpOrdering,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicU32, Ordering},
};

/// Atmosphère flag bit.
const ATMOSPHERE_BIT: u32 = 1 << 31;

/// Mask of the version number bits.
const VERSION_MASK: u32 = 0x00FF_FFFF;

static VERSION: AtomicU32 = AtomicU32::new(0);

/// Returns the version stored with [`set`], or 0.0.0 if it was never set.
pub fn get() -> HosVersion {
    HosVersion::from_u32(VERSION.load(Ordering::Acquire))
}

/// Stores the running OS version.
///
/// Called once by the runtime during startup. Sessions opened before this
/// see 0.0.0 and therefore take the 1.x command layout.
pub fn set(version: HosVersion) {
    log::debug!(
        "HOS version {}{}",
        version,
        if version.is_atmosphere() { " (atmosphere)" } else { "" }
    );
    VERSION.store(version.to_raw(), Ordering::Release);
}

/// Returns `true` if the stored version carries the Atmosphère flag.
pub fn is_atmosphere() -> bool {
    get().is_atmosphere()
}

/// A Horizon OS version (`major.minor.micro`), optionally flagged as
/// running under Atmosphère.
#[derive(Debug, Clone, Copy, Default)]
pub struct HosVersion(u32);

impl HosVersion {
    #[inline]
    pub const fn new(major: u8, minor: u8, micro: u8) -> Self {
        Self(((major as u32) << 16) | ((minor as u32) << 8) | (micro as u32))
    }

    /// Creates a version from its packed form, keeping the Atmosphère flag.
    #[inline]
    pub const fn from_u32(raw: u32) -> Self {
        Self(raw & (VERSION_MASK | ATMOSPHERE_BIT))
    }

    /// Returns the same version with the Atmosphère flag set.
    #[inline]
    pub const fn with_atmosphere(self) -> Self {
        Self(self.0 | ATMOSPHERE_BIT)
    }

    /// Returns the packed version number, without the Atmosphère flag.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0 & VERSION_MASK
    }

    #[inline]
    const fn to_raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn major(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub const fn minor(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub const fn micro(self) -> u8 {
        self.0 as u8
    }

    #[inline]
    pub const fn is_atmosphere(self) -> bool {
        self.0 & ATMOSPHERE_BIT != 0
    }

    /// Returns `true` if this version is `major.minor.micro` or newer.
    #[inline]
    pub const fn at_least(self, major: u8, minor: u8, micro: u8) -> bool {
        self.as_u32() >= Self::new(major, minor, micro).as_u32()
    }
}

impl PartialEq for HosVersion {
    fn eq(&self, other: &Self) -> bool {
        self.as_u32() == other.as_u32()
    }
}

impl Eq for HosVersion {}

impl PartialOrd for HosVersion {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for HosVersion {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.as_u32().cmp(&other.as_u32())
    }
}

impl Hash for HosVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_u32().hash(state);
    }
}

impl core::fmt::Display for HosVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.micro())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_components() {
        let v = HosVersion::new(5, 1, 2);
        assert_eq!(v.as_u32(), 0x0005_0102);
        assert_eq!((v.major(), v.minor(), v.micro()), (5, 1, 2));
        assert_eq!(HosVersion::from_u32(0x0005_0102), v);
    }

    #[test]
    fn atmosphere_flag_is_ignored_by_comparisons() {
        let plain = HosVersion::new(10, 0, 0);
        let ams = plain.with_atmosphere();

        assert!(ams.is_atmosphere());
        assert!(!plain.is_atmosphere());
        assert_eq!(plain, ams);
        assert_eq!(ams.as_u32(), 0x000A_0000);
        assert!(ams < HosVersion::new(10, 0, 1));
    }

    #[test]
    fn at_least_compares_all_components() {
        let v = HosVersion::new(4, 1, 0);
        assert!(v.at_least(2, 0, 0));
        assert!(v.at_least(4, 0, 0));
        assert!(v.at_least(4, 1, 0));
        assert!(!v.at_least(4, 1, 1));
        assert!(!v.at_least(5, 0, 0));
    }

    #[test]
    fn default_behaves_like_first_firmware() {
        let v = HosVersion::default();
        assert_eq!(v.to_string(), "0.0.0");
        assert!(!v.at_least(2, 0, 0));
        assert!(v.at_least(0, 0, 0));
    }

    #[test]
    fn global_store_round_trips() {
        set(HosVersion::new(9, 2, 0).with_atmosphere());
        assert_eq!(get(), HosVersion::new(9, 2, 0));
        assert!(is_atmosphere());
    }
}
