// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A library for accessing individual GPIO lines on Linux platforms
//! using either the GPIO character device or the legacy sysfs interface.
//!
//! Lines are opened using [`Gpio::open`] or the [`Builder`], which select the
//! backend from the shape of the arguments.  Whichever backend is selected,
//! the line is then accessed through the one [`GpioLine`] interface.
//!
//! To open and read a character device line:
//! ```no_run
//! # use gpioline::Result;
//! use gpioline::{Gpio, GpioLine};
//!
//! # fn main() -> Result<()> {
//! let l3 = Gpio::builder()
//!     .on_chip("/dev/gpiochip0")
//!     .with_line(3)
//!     .as_input()
//!     .open()?;
//! let value = l3.read()?;
//! # Ok(())
//! # }
//! ```
//!
//! Omitting the chip selects the sysfs interface, with the line identified by
//! its global number:
//! ```no_run
//! # use gpioline::Result;
//! use gpioline::{Direction, Gpio, GpioLine, Options};
//!
//! # fn main() -> Result<()> {
//! let mut l = Gpio::open(None, 17, Direction::Out, &Options::default())?;
//! l.write(true)?;
//! l.close()?;
//! # Ok(())
//! # }
//! ```

use gpioline_uapi as uapi;
#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Wrappers for various async reactors.
#[cfg(feature = "async_tokio")]
pub mod r#async;
#[cfg(feature = "async_tokio")]
pub use r#async::tokio;

/// The GPIO character device backend.
pub mod cdev;
pub use cdev::CdevGpio;

/// The line capability interface and the facade that selects the backend.
pub mod gpio;
pub use gpio::{Builder, Gpio, GpioLine};

/// Types specific to lines.
pub mod line;
pub use line::{
    Bias, Direction, Drive, Edge, EdgeEvent, EdgeKind, LineId, Offset, Options, DEFAULT_LABEL,
};

mod poll;
pub use poll::poll_multiple;

mod retry;
pub use retry::RetryPolicy;

/// The sysfs backend.
pub mod sysfs;
pub use sysfs::SysfsGpio;

/// The versions of the GPIO character device ABI.
///
/// v1 was released in Linux v4.8 and superseded by v2 in Linux v5.10.
/// The character device backend uses v2 where the kernel provides it and
/// falls back to v1 otherwise.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AbiVersion {
    V1,
    V2,
}

impl fmt::Display for AbiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiVersion::V1 => write!(f, "uAPI ABI v1"),
            AbiVersion::V2 => write!(f, "uAPI ABI v2"),
        }
    }
}

/// Errors returned by [`gpioline`] functions.
///
/// [`gpioline`]: crate
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// An error returned when there is a problem with an argument.
    #[error("{0}")]
    InvalidArgument(String),

    /// The line identified could not be found.
    #[error("line {0} not found")]
    LineNotFound(String),

    /// The operation was attempted on a line that has been closed.
    #[error("{0} on a closed line")]
    Closed(Operation),

    /// The operation is not available for the line, backend or platform.
    #[error("{op} is not supported: {reason}")]
    Unsupported {
        /// The operation attempted.
        op: Operation,
        /// Why the operation is unavailable.
        reason: String,
    },

    /// Access was still denied after the retry budget was exhausted.
    #[error("{op} {path:?}: permission denied after {attempts} attempts")]
    PermissionDenied {
        /// The operation attempted.
        op: Operation,
        /// The file being accessed.
        path: PathBuf,
        /// The number of attempts made.
        attempts: u32,
    },

    /// An error returned from an underlying system call.
    #[error("{op} {path:?}: {source}")]
    Io {
        /// The operation attempted.
        op: Operation,
        /// The device or file being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: uapi::Error,
    },
}

impl Error {
    pub(crate) fn io<E: Into<uapi::Error>>(op: Operation, path: &Path, e: E) -> Error {
        Error::Io {
            op,
            path: path.to_path_buf(),
            source: e.into(),
        }
    }

    pub(crate) fn unsupported<S: Into<String>>(op: Operation, reason: S) -> Error {
        Error::Unsupported {
            op,
            reason: reason.into(),
        }
    }

    /// The OS error code underlying the error, if any.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Error::Io { source, .. } => source.errno(),
            Error::PermissionDenied { .. } => Some(libc::EACCES),
            _ => None,
        }
    }
}

/// The operations performed on a line, as reported in errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operation {
    Open,
    Export,
    Unexport,
    Read,
    Write,
    Poll,
    ReadEvent,
    Direction,
    SetDirection,
    Edge,
    SetEdge,
    Bias,
    SetBias,
    Drive,
    SetDrive,
    Inverted,
    SetInverted,
    Fd,
    Line,
    Path,
    Name,
    Label,
    ChipName,
    ChipLabel,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Open => "open",
            Operation::Export => "export",
            Operation::Unexport => "unexport",
            Operation::Read => "read",
            Operation::Write => "write",
            Operation::Poll => "poll",
            Operation::ReadEvent => "read_event",
            Operation::Direction => "direction",
            Operation::SetDirection => "set_direction",
            Operation::Edge => "edge",
            Operation::SetEdge => "set_edge",
            Operation::Bias => "bias",
            Operation::SetBias => "set_bias",
            Operation::Drive => "drive",
            Operation::SetDrive => "set_drive",
            Operation::Inverted => "inverted",
            Operation::SetInverted => "set_inverted",
            Operation::Fd => "fd",
            Operation::Line => "line",
            Operation::Path => "path",
            Operation::Name => "name",
            Operation::Label => "label",
            Operation::ChipName => "chip_name",
            Operation::ChipLabel => "chip_label",
        };
        write!(f, "{}", name)
    }
}

/// The result for [`gpioline`] functions.
///
/// [`gpioline`]: crate
pub type Result<T> = std::result::Result<T, Error>;
