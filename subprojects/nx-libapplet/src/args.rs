//! CommonArguments, the header storage every library applet receives.

use static_assertions::const_assert_eq;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    little_endian::{I32, U32, U64},
};

/// Layout version of [`CommonArguments`].
pub const COMMON_ARGUMENTS_VERSION: u32 = 1;

/// Wire form of the common arguments (0x20 bytes).
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct CommonArguments {
    pub version: U32,
    pub size: U32,
    /// Argument layout version of the applet being launched.
    pub la_version: U32,
    pub expected_theme_color: I32,
    pub play_startup_sound: u8,
    pub pad: [u8; 7],
    /// System tick at push time.
    pub tick: U64,
}

const_assert_eq!(size_of::<CommonArguments>(), 0x20);

/// Caller-side common arguments. The tick is only filled in when the
/// arguments are pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibAppletArgs {
    la_version: u32,
    theme_color: i32,
    play_startup_sound: bool,
}

impl LibAppletArgs {
    /// Arguments for an applet expecting layout `la_version`, with theme
    /// color 0 and the startup sound off.
    #[inline]
    pub const fn new(la_version: u32) -> Self {
        Self {
            la_version,
            theme_color: 0,
            play_startup_sound: false,
        }
    }

    #[inline]
    pub const fn with_theme_color(mut self, color: i32) -> Self {
        self.theme_color = color;
        self
    }

    #[inline]
    pub const fn with_startup_sound(mut self, enabled: bool) -> Self {
        self.play_startup_sound = enabled;
        self
    }

    #[inline]
    pub const fn la_version(&self) -> u32 {
        self.la_version
    }

    /// Builds the wire header stamped with `tick`.
    pub fn to_common_arguments(&self, tick: u64) -> CommonArguments {
        CommonArguments {
            version: U32::new(COMMON_ARGUMENTS_VERSION),
            size: U32::new(size_of::<CommonArguments>() as u32),
            la_version: U32::new(self.la_version),
            expected_theme_color: I32::new(self.theme_color),
            play_startup_sound: u8::from(self.play_startup_sound),
            pad: [0; 7],
            tick: U64::new(tick),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_args_use_defaults() {
        let args = LibAppletArgs::new(0x50000);
        let common = args.to_common_arguments(0);

        assert_eq!(common.version.get(), 1);
        assert_eq!(common.size.get(), 0x20);
        assert_eq!(common.la_version.get(), 0x50000);
        assert_eq!(common.expected_theme_color.get(), 0);
        assert_eq!(common.play_startup_sound, 0);
    }

    #[test]
    fn wire_layout() {
        let common = LibAppletArgs::new(0x30000)
            .with_theme_color(-1)
            .with_startup_sound(true)
            .to_common_arguments(0x0102_0304_0506_0708);

        let bytes = common.as_bytes();
        assert_eq!(bytes.len(), 0x20);
        assert_eq!(&bytes[0x00..0x04], &1u32.to_le_bytes());
        assert_eq!(&bytes[0x04..0x08], &0x20u32.to_le_bytes());
        assert_eq!(&bytes[0x08..0x0C], &0x30000u32.to_le_bytes());
        assert_eq!(&bytes[0x0C..0x10], &(-1i32).to_le_bytes());
        assert_eq!(bytes[0x10], 1);
        assert!(bytes[0x11..0x18].iter().all(|&b| b == 0));
        assert_eq!(&bytes[0x18..0x20], &0x0102_0304_0506_0708u64.to_le_bytes());
    }
}
