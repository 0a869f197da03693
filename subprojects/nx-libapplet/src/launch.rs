//! Library applet launch and storage helpers.

use nx_service_applet::{
    AppletId, CreateLibraryAppletError, GetObjectError, LibAppletMode, LibraryAppletAccessor,
    LibraryAppletCreator,
};
use nx_sf::{cmif::ParseResponseError, service::DispatchError};
use nx_svc::{
    error::{LibnxError, ToRawResultCode},
    result::ResultCode,
    sync::{WAIT_FOREVER, WaitSynchronizationError},
};
use zerocopy::IntoBytes;

use crate::args::LibAppletArgs;

/// Copies `data` into a new storage and pushes it to the applet's input
/// channel.
pub fn push_storage(
    creator: &LibraryAppletCreator,
    accessor: &LibraryAppletAccessor,
    data: &[u8],
) -> Result<(), StorageError> {
    let storage = creator
        .create_storage(data.len() as i64)
        .map_err(StorageError::Create)?;

    let written = match storage.open() {
        Ok(sa) => {
            let res = sa.write(0, data).map_err(StorageError::Write);
            sa.close();
            res
        }
        Err(err) => Err(StorageError::Open(err)),
    };

    if let Err(err) = written {
        storage.close();
        return Err(err);
    }

    accessor.push_in_data(storage).map_err(StorageError::Push)?;
    log::trace!("pushed {} byte storage", data.len());
    Ok(())
}

/// Pops one storage from the applet's output channel and copies up to
/// `buf.len()` bytes of it into `buf`.
///
/// Returns the number of bytes copied.
pub fn pop_storage(accessor: &LibraryAppletAccessor, buf: &mut [u8]) -> Result<usize, StorageError> {
    let storage = accessor.pop_out_data().map_err(StorageError::Pop)?;

    let result = match storage.open() {
        Ok(sa) => {
            let res = sa
                .get_size()
                .map_err(StorageError::GetSize)
                .and_then(|size| {
                    let len = usize::try_from(size).unwrap_or(0).min(buf.len());
                    log::trace!("popped {size} byte storage, reading {len}");
                    sa.read(0, &mut buf[..len]).map_err(StorageError::Read)?;
                    Ok(len)
                });
            sa.close();
            res
        }
        Err(err) => Err(StorageError::Open(err)),
    };

    storage.close();
    result
}

/// Error returned by [`push_storage`] and [`pop_storage`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to create storage")]
    Create(#[source] GetObjectError),
    #[error("failed to open storage")]
    Open(#[source] GetObjectError),
    #[error("failed to write storage")]
    Write(#[source] DispatchError),
    #[error("failed to push storage")]
    Push(#[source] DispatchError),
    #[error("failed to pop storage")]
    Pop(#[source] GetObjectError),
    #[error("failed to get storage size")]
    GetSize(#[source] DispatchError),
    #[error("failed to read storage")]
    Read(#[source] DispatchError),
}

impl ToRawResultCode for StorageError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::Create(err) | Self::Open(err) | Self::Pop(err) => err.to_rc(),
            Self::Write(err) | Self::Push(err) | Self::GetSize(err) | Self::Read(err) => err.to_rc(),
        }
    }
}

/// Launches `applet_id` in the foreground and waits for it to exit.
///
/// Pushes the common arguments built from `args`, then `arg` unless it is
/// empty. When `reply` is given, one output storage is popped into it.
/// Returns the number of reply bytes copied.
pub fn launch(
    creator: &LibraryAppletCreator,
    applet_id: AppletId,
    args: &LibAppletArgs,
    arg: &[u8],
    reply: Option<&mut [u8]>,
) -> Result<usize, LaunchError> {
    let accessor = creator
        .create_library_applet(applet_id, LibAppletMode::AllForeground)
        .map_err(LaunchError::Create)?;

    let result = run(creator, &accessor, args, arg, reply);
    accessor.close();

    match &result {
        Ok(len) => log::debug!("library applet {applet_id:?} exited, {len} reply bytes"),
        Err(err) => log::warn!("library applet {applet_id:?} failed: {err}"),
    }
    result
}

fn run(
    creator: &LibraryAppletCreator,
    accessor: &LibraryAppletAccessor,
    args: &LibAppletArgs,
    arg: &[u8],
    reply: Option<&mut [u8]>,
) -> Result<usize, LaunchError> {
    let common = args.to_common_arguments(nx_svc::tick::get_system_tick());
    push_storage(creator, accessor, common.as_bytes()).map_err(LaunchError::PushArgs)?;

    if !arg.is_empty() {
        push_storage(creator, accessor, arg).map_err(LaunchError::PushArgs)?;
    }

    accessor.start().map_err(LaunchError::Start)?;
    accessor
        .state_changed_event()
        .wait(WAIT_FOREVER)
        .map_err(LaunchError::Wait)?;

    match accessor.get_result() {
        Ok(()) => {}
        Err(DispatchError::ParseResponse(ParseResponseError::ServiceError(code))) => {
            return Err(LaunchError::BadExit { code });
        }
        Err(err) => return Err(LaunchError::GetResult(err)),
    }

    match reply {
        Some(buf) => pop_storage(accessor, buf).map_err(LaunchError::PopReply),
        None => Ok(0),
    }
}

/// Error returned by [`launch`].
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to create library applet")]
    Create(#[source] CreateLibraryAppletError),
    #[error("failed to push applet arguments")]
    PushArgs(#[source] StorageError),
    #[error("failed to start library applet")]
    Start(#[source] DispatchError),
    #[error("failed to wait for library applet")]
    Wait(#[source] WaitSynchronizationError),
    #[error("failed to get library applet result")]
    GetResult(#[source] DispatchError),
    /// The applet exited with a non-zero result. `code` is the applet's own
    /// result.
    #[error("library applet exited with {code:#x}")]
    BadExit { code: ResultCode },
    #[error("failed to pop applet reply")]
    PopReply(#[source] StorageError),
}

impl ToRawResultCode for LaunchError {
    fn to_rc(self) -> ResultCode {
        match self {
            Self::Create(err) => err.to_rc(),
            Self::PushArgs(err) | Self::PopReply(err) => err.to_rc(),
            Self::Start(err) | Self::GetResult(err) => err.to_rc(),
            Self::Wait(err) => err.to_rc(),
            Self::BadExit { .. } => LibnxError::LibAppletBadExit.to_rc(),
        }
    }
}
