// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use libc::{c_long, pollfd, ppoll, sigset_t, time_t, timespec};
use std::ffi::OsStr;
use std::fmt;
use std::fs::File;
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::AsRawFd;
use std::ptr;
use std::time::Duration;

pub(crate) const IOCTL_MAGIC: u8 = 0xb4;

macro_rules! ior {
    ($nr:expr, $dty:ty) => {
        ioctl_sys::ior!(
            $crate::common::IOCTL_MAGIC,
            $nr,
            std::mem::size_of::<$dty>()
        ) as _
    };
}
pub(crate) use ior;

macro_rules! iorw {
    ($nr:expr, $dty:ty) => {
        ioctl_sys::iorw!(
            $crate::common::IOCTL_MAGIC,
            $nr,
            std::mem::size_of::<$dty>()
        ) as _
    };
}
pub(crate) use iorw;

#[repr(u8)]
enum Ioctl {
    GetChipInfo = 1,
}

/// Wait for any of the descriptors to report one of their requested events.
///
/// A single call to the underlying `ppoll`, so it may be interrupted by a
/// signal, in which case an [`Errno`] of `EINTR` is returned.
///
/// * `fds` - The descriptors and their requested events.
///   The `revents` are populated on return.
/// * `timeout` - The maximum time to wait.  `None` waits indefinitely.
///
/// Returns the number of descriptors with events, or 0 if the timeout expired.
pub fn wait_fds(fds: &mut [pollfd], timeout: Option<Duration>) -> Result<usize> {
    let ts = timeout.map(|d| timespec {
        tv_sec: d.as_secs() as time_t,
        tv_nsec: d.subsec_nanos() as c_long,
    });
    let tsp = match &ts {
        Some(ts) => ts as *const timespec,
        None => ptr::null(),
    };
    // SAFETY: fds is a valid slice for the duration of the call and only revents is modified.
    match unsafe {
        ppoll(
            fds.as_mut_ptr(),
            fds.len() as libc::nfds_t,
            tsp,
            ptr::null::<sigset_t>(),
        )
    } {
        -1 => Err(Error::from_errno()),
        n => Ok(n as usize),
    }
}

/// Read an event from a chip or request file descriptor.
///
/// The buffer is `u64` to satisfy alignment requirements of the event structs.
///
/// Returns the number of u64 words read.
pub fn read_event(f: &File, buf: &mut [u64]) -> Result<usize> {
    // SAFETY: the kernel only writes to the buffer, and never more than the length provided.
    let n = unsafe {
        libc::read(
            f.as_raw_fd(),
            buf.as_mut_ptr() as *mut libc::c_void,
            buf.len() * 8,
        )
    };
    match n {
        -1 => Err(Error::from_errno()),
        n if n as usize % 8 != 0 => Err(Error::from(UnderReadError::new(
            "event",
            buf.len() * 8,
            n as usize,
        ))),
        n => Ok(n as usize / 8),
    }
}

/// Information about a particular GPIO chip.
#[repr(C)]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ChipInfo {
    /// The Linux kernel name of this GPIO chip.
    pub name: Name,

    /// A functional name for this GPIO chip, such as a product number.
    ///
    /// May be empty.
    pub label: Name,

    /// The number of GPIO lines on this chip.
    pub num_lines: u32,
}

/// Get the publicly available information for a chip.
///
/// * `cf` - The open gpiochip device file.
pub fn get_chip_info(cf: &File) -> Result<ChipInfo> {
    let mut chip = MaybeUninit::<ChipInfo>::uninit();
    // SAFETY: returned struct contains raw byte arrays and ints that are safe to decode.
    match unsafe {
        libc::ioctl(
            cf.as_raw_fd(),
            ior!(Ioctl::GetChipInfo, ChipInfo),
            chip.as_mut_ptr(),
        )
    } {
        0 => Ok(unsafe { chip.assume_init() }),
        _ => Err(Error::from_errno()),
    }
}

/// The result returned by [`gpioline_uapi`] functions.
///
/// [`gpioline_uapi`]: crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [`gpioline_uapi`] functions.
///
/// [`gpioline_uapi`]: crate
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
pub enum Error {
    /// An error returned from an underlying system call.
    #[error(transparent)]
    Os(#[from] Errno),

    /// An error indicating insufficient data read for the expected object.
    #[error(transparent)]
    UnderRead(#[from] UnderReadError),

    /// An error validating a value returned from the kernel.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    /// Create an error from the current errno value.
    #[inline]
    pub fn from_errno() -> Error {
        Error::Os(Errno::last())
    }

    /// The OS error code, if the error originated from a system call.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Error::Os(e) => Some(e.0),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Os(Errno::from(&e))
    }
}

/// A raw OS error code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Errno(pub i32);

impl Errno {
    /// The errno of the most recent failed system call on this thread.
    pub fn last() -> Errno {
        Errno::from(&std::io::Error::last_os_error())
    }
}

impl From<&std::io::Error> for Errno {
    fn from(e: &std::io::Error) -> Self {
        // errors synthesized in user space carry no code, so report them as generic I/O errors.
        Errno(e.raw_os_error().unwrap_or(libc::EIO))
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", std::io::Error::from_raw_os_error(self.0))
    }
}

impl std::error::Error for Errno {}

/// A failure to read sufficient bytes to construct an object.
//
// This should never happen - but is checked to be safe.
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
#[error("Reading {obj} returned {found} bytes, expected {expected}.")]
pub struct UnderReadError {
    /// The struct being read.
    pub obj: &'static str,
    /// The number of bytes expected.
    pub expected: usize,
    /// The number of bytes read.
    pub found: usize,
}

impl UnderReadError {
    /// Create an UnderReadError.
    pub(crate) fn new(obj: &'static str, expected: usize, found: usize) -> UnderReadError {
        UnderReadError {
            obj,
            expected,
            found,
        }
    }
}

/// A failure to validate a value returned from the kernel.
//
// Should only be seen if a kernel update adds an enum value we are unaware of,
// or a sysfs attribute contains an unexpected token.
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
#[error("Kernel returned invalid {field}: {msg}")]
pub struct ValidationError {
    /// The field or attribute that failed to validate.
    pub field: String,
    /// The reason for the failure.
    pub msg: String,
}

impl ValidationError {
    /// Create a ValidationError.
    pub fn new<S: Into<String>, T: Into<String>>(field: S, msg: T) -> ValidationError {
        ValidationError {
            field: field.into(),
            msg: msg.into(),
        }
    }
}

/// The maximum number of bytes stored in a Name.
pub const NAME_MAX: usize = 32;

/// A uAPI name string.
#[repr(C)]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Name([u8; NAME_MAX]);

impl Name {
    /// Checks whether the Name is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    /// The length of the contained name.
    #[inline]
    pub fn strlen(&self) -> usize {
        self.0.iter().position(|&x| x == 0).unwrap_or(self.0.len())
    }

    /// Convert the contained name to a OsStr slice.
    pub fn as_os_str(&self) -> &OsStr {
        OsStr::from_bytes(&self.0[..self.strlen()])
    }

    /// Construct a Name from a byte slice.
    ///
    /// The name is truncated if the slice exceeds [`NAME_MAX`] bytes.
    /// May result in invalid UTF-8 if truncated in the middle of a multi-byte character.
    pub fn from_bytes(s: &[u8]) -> Name {
        let mut d: Name = Default::default();
        // drop any trailing byte so the name remains null terminated.
        for (src, dst) in s.iter().zip(d.0.iter_mut().take(NAME_MAX - 1)) {
            *dst = *src;
        }
        d
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name::from_bytes(s.as_bytes())
    }
}

/// An identifier for a line on a particular chip.
///
/// Valid offsets are in the range 0..`num_lines` as reported in the [`ChipInfo`].
pub type Offset = u32;

/// The maximum number of lines that may be requested in a single request.
pub const LINES_MAX: usize = 64;

/// A collection of line offsets.
///
/// Typically used to identify the lines belonging to a particular request.
#[repr(C)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Offsets([Offset; LINES_MAX]);

impl Offsets {
    /// Create offsets from a slice.
    pub fn from_slice(s: &[u32]) -> Self {
        let mut n: Offsets = Default::default();
        for (src, dst) in s.iter().zip(n.0.iter_mut()) {
            *dst = *src;
        }
        n
    }

    /// Get the indexed offset from the set.
    #[inline]
    pub fn get(&self, idx: usize) -> Offset {
        self.0[idx]
    }

    /// Set the indexed offset in the set.
    #[inline]
    pub fn set(&mut self, idx: usize, offset: Offset) {
        self.0[idx] = offset;
    }
}

impl Default for Offsets {
    fn default() -> Self {
        Offsets([0; LINES_MAX])
    }
}

/// Space reserved for future use.
///
/// Sized in multiples of u32 words.
#[repr(C)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[doc(hidden)]
pub struct Padding<const SIZE: usize>([u32; SIZE]);

impl<const SIZE: usize> Default for Padding<SIZE> {
    fn default() -> Self {
        Padding([0; SIZE])
    }
}

impl<const SIZE: usize> Padding<SIZE> {
    pub fn is_zeroed(&self) -> bool {
        self.0.iter().all(|x| *x == 0)
    }
}

/// The trigger identifier for a [`LineEdgeEvent`].
///
/// [`LineEdgeEvent`]: crate::v2::LineEdgeEvent
#[repr(u32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineEdgeEventKind {
    /// Indicates the line transitioned from *inactive* to *active*.
    RisingEdge = 1,

    /// Indicates the line transitioned from *active* to *inactive*.
    FallingEdge = 2,
}

impl TryFrom<u32> for LineEdgeEventKind {
    type Error = String;

    fn try_from(v: u32) -> std::result::Result<Self, Self::Error> {
        use LineEdgeEventKind::*;
        match v {
            x if x == RisingEdge as u32 => Ok(RisingEdge),
            x if x == FallingEdge as u32 => Ok(FallingEdge),
            _ => Err(format!("invalid value: {v}")),
        }
    }
}
