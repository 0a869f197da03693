use nx_rt_env::hos_version::HosVersion;

use crate::arg::{WebArgKind, WebArgType};

/// Error returned by the web config builders.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebConfigError {
    /// A string does not fit its buffer together with the NUL terminator.
    #[error("string of {len} bytes does not fit {ty:?} (max {max} including NUL)")]
    StringTooLong {
        ty: Option<WebArgType>,
        len: usize,
        max: usize,
    },
    #[error("payload of {len} bytes exceeds {ty:?} size {max}")]
    PayloadTooLarge {
        ty: WebArgType,
        len: usize,
        max: usize,
    },
    /// The setter does not match the argument's payload kind.
    #[error("{ty:?} holds {kind:?}")]
    WrongKind { ty: WebArgType, kind: WebArgKind },
    /// An existing entry was stored with a size other than the type's fixed size.
    #[error("stored {ty:?} entry has size {stored}")]
    SizeMismatch { ty: WebArgType, stored: u16 },
    #[error("no room left for {ty:?}")]
    OutOfSpace { ty: WebArgType },
    /// The entry table runs past the end of the storage.
    #[error("argument storage is corrupt")]
    Corrupt,
    #[error("requires system version {required}, running {current}")]
    IncompatibleVersion {
        required: HosVersion,
        current: HosVersion,
    },
}

#[cfg(target_os = "horizon")]
impl nx_svc::error::ToRawResultCode for WebConfigError {
    fn to_rc(self) -> nx_svc::result::ResultCode {
        use nx_svc::error::LibnxError;

        match self {
            Self::StringTooLong { .. }
            | Self::PayloadTooLarge { .. }
            | Self::WrongKind { .. }
            | Self::SizeMismatch { .. }
            | Self::Corrupt => LibnxError::BadInput.to_rc(),
            Self::OutOfSpace { .. } => LibnxError::OutOfMemory.to_rc(),
            Self::IncompatibleVersion { .. } => LibnxError::IncompatSysVer.to_rc(),
        }
    }
}
