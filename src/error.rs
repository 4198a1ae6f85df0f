use std::{io, path::PathBuf};

use snafu::Snafu;

use crate::{PAGE_COUNT, PAGE_SIZE};

/// Enum of link errors.
#[non_exhaustive]
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Device {} does not exist", path.display()))]
    DeviceAbsent { path: PathBuf },
    #[snafu(display("Device {} is not a character device", path.display()))]
    NotCharacterDevice { path: PathBuf },
    #[snafu(display("Failed to open {}: {source}", path.display()))]
    OpenFailed { path: PathBuf, source: io::Error },
    #[snafu(display("Write failed: {source}"))]
    WriteFailed { source: io::Error },
    #[snafu(display("Write stalled after {retries} would-block retries"))]
    WriteStalled { retries: usize },
    #[snafu(display("Read failed: {source}"))]
    ReadFailed { source: io::Error },
    #[snafu(display("Resync failed after {attempts} attempts"))]
    ResyncExhausted { attempts: u8 },
    #[snafu(display("Read failed during resync: {source}"))]
    ResyncRead { source: io::Error },
    #[snafu(display("Page {index} out of range, should be below {PAGE_COUNT}"))]
    PageOutOfRange { index: usize },
    #[snafu(display("Payload of {len} bytes is too long, max {PAGE_SIZE}"))]
    PayloadTooLong { len: usize },
}

impl Error {
    /// Returns the OS error code behind an I/O failure, if there is one.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            Error::OpenFailed { source, .. }
            | Error::WriteFailed { source }
            | Error::ReadFailed { source }
            | Error::ResyncRead { source } => source.raw_os_error(),
            _ => None,
        }
    }

    /// Whether the link was closed as a consequence of this error.
    pub fn closed_link(&self) -> bool {
        matches!(
            self,
            Error::OpenFailed { .. }
                | Error::WriteFailed { .. }
                | Error::WriteStalled { .. }
                | Error::ReadFailed { .. }
                | Error::ResyncRead { .. }
                | Error::DeviceAbsent { .. }
                | Error::NotCharacterDevice { .. }
        )
    }
}
