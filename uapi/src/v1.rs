// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bitflags::bitflags;
use std::fs::File;
use std::mem::size_of;
use std::os::unix::prelude::{AsRawFd, FromRawFd};

use crate::common::iorw;
pub use crate::common::{
    Error, LineEdgeEventKind, Name, Offset, Offsets, Result, UnderReadError, ValidationError,
    LINES_MAX,
};

#[repr(u8)]
enum Ioctl {
    GetLineInfo = 2,
    GetLineHandle = 3,
    GetLineEvent = 4,
    GetLineValues = 8,
    SetLineValues = 9,
}

/// The publicly visible state of a line.
#[repr(C)]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LineInfo {
    /// The offset of the line on the chip.
    pub offset: Offset,

    /// The current configuration.
    pub flags: LineInfoFlags,

    /// The name assigned to the line by the chip or platform, possibly empty.
    pub name: Name,

    /// The label of the current consumer, empty if the line is free.
    pub consumer: Name,
}

bitflags! {
    /// The configuration of a line as reported by the kernel.
    ///
    /// A line without `OUTPUT` is an input.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct LineInfoFlags: u32 {
        const USED = 1 << 0;
        const OUTPUT = 1 << 1;
        const ACTIVE_LOW = 1 << 2;
        const OPEN_DRAIN = 1 << 3;
        const OPEN_SOURCE = 1 << 4;
        const BIAS_PULL_UP = 1 << 5;
        const BIAS_PULL_DOWN = 1 << 6;
        const BIAS_DISABLED = 1 << 7;
    }
}

/// Get the state of a line, which need not be requested.
///
/// * `cf` - The open gpiochip device file.
/// * `offset` - The offset of the line.
pub fn get_line_info(cf: &File, offset: Offset) -> Result<LineInfo> {
    let mut li = LineInfo {
        offset,
        ..Default::default()
    };
    // SAFETY: every field is an integer or byte array, so any content is valid.
    match unsafe { libc::ioctl(cf.as_raw_fd(), iorw!(Ioctl::GetLineInfo, LineInfo), &mut li) } {
        0 => Ok(li),
        _ => Err(Error::from_errno()),
    }
}

bitflags! {
    /// The requested configuration of handle and event requests.
    ///
    /// The kernel rejects contradictory combinations, such as two biases.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct HandleFlags: u32 {
        const INPUT = 1 << 0;
        const OUTPUT = 1 << 1;
        const ACTIVE_LOW = 1 << 2;
        const OPEN_DRAIN = 1 << 3;
        const OPEN_SOURCE = 1 << 4;
        const BIAS_PULL_UP = 1 << 5;
        const BIAS_PULL_DOWN = 1 << 6;
        const BIAS_DISABLED = 1 << 7;
    }
}

/// Logical line values, one byte per requested line.
///
/// Index n corresponds to `offsets[n]` of the request.  Any non-zero byte is
/// taken as active.
#[repr(C)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LineValues([u8; LINES_MAX]);

impl Default for LineValues {
    fn default() -> Self {
        LineValues([0; LINES_MAX])
    }
}

impl LineValues {
    /// The value of the line at `idx`.
    #[inline]
    pub fn get(&self, idx: usize) -> bool {
        self.0[idx] != 0
    }

    /// Record the value of the line at `idx`.
    #[inline]
    pub fn set(&mut self, idx: usize, active: bool) {
        self.0[idx] = active as u8;
    }
}

/// A request for exclusive access to lines without edge detection.
#[repr(C)]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HandleRequest {
    /// The offsets of the requested lines.  Only the first `num_lines` are used.
    pub offsets: Offsets,

    /// The configuration, applied to every requested line.
    pub flags: HandleFlags,

    /// The initial values of output lines.
    pub values: LineValues,

    /// The consumer label reported for the lines while they are held.
    pub consumer: Name,

    /// The number of lines requested.
    pub num_lines: u32,

    // written by the kernel
    fd: i32,
}

impl HandleRequest {
    /// A request for the single line at `offset`.
    pub fn new(offset: Offset, consumer: Name, flags: HandleFlags) -> HandleRequest {
        HandleRequest {
            offsets: Offsets::from_slice(&[offset]),
            flags,
            consumer,
            num_lines: 1,
            ..Default::default()
        }
    }
}

/// Request lines from the chip.
///
/// Returns the handle, which holds the lines until it is closed.
///
/// * `cf` - The open gpiochip device file.
pub fn get_line_handle(cf: &File, mut hr: HandleRequest) -> Result<File> {
    // SAFETY: hr outlives the call and the fd is only trusted on success.
    match unsafe {
        libc::ioctl(
            cf.as_raw_fd(),
            iorw!(Ioctl::GetLineHandle, HandleRequest),
            &mut hr,
        )
    } {
        0 => Ok(unsafe { File::from_raw_fd(hr.fd) }),
        _ => Err(Error::from_errno()),
    }
}

bitflags! {
    /// The edges reported by an event request.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct EventFlags: u32 {
        const RISING_EDGE = 1 << 0;
        const FALLING_EDGE = 1 << 1;
    }
}

/// A request for a single input line with edge detection.
#[repr(C)]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EventRequest {
    /// The offset of the requested line.
    pub offset: Offset,

    /// The line configuration, which must describe an input.
    pub handle_flags: HandleFlags,

    /// The edges to detect.
    pub event_flags: EventFlags,

    /// The consumer label reported for the line while it is held.
    pub consumer: Name,

    // written by the kernel
    fd: i32,
}

impl EventRequest {
    /// A request for edges on the line at `offset`.
    pub fn new(
        offset: Offset,
        consumer: Name,
        handle_flags: HandleFlags,
        event_flags: EventFlags,
    ) -> EventRequest {
        EventRequest {
            offset,
            handle_flags,
            event_flags,
            consumer,
            fd: 0,
        }
    }
}

/// Request a line with edge detection.
///
/// Events are read from the returned file, which also supports
/// [`get_line_values`].
///
/// * `cf` - The open gpiochip device file.
pub fn get_line_event(cf: &File, mut er: EventRequest) -> Result<File> {
    // SAFETY: er outlives the call and the fd is only trusted on success.
    match unsafe {
        libc::ioctl(
            cf.as_raw_fd(),
            iorw!(Ioctl::GetLineEvent, EventRequest),
            &mut er,
        )
    } {
        0 => Ok(unsafe { File::from_raw_fd(er.fd) }),
        _ => Err(Error::from_errno()),
    }
}

/// Read the values of the requested lines.
///
/// * `lf` - The file returned by [`get_line_handle`] or [`get_line_event`].
pub fn get_line_values(lf: &File, lv: &mut LineValues) -> Result<()> {
    // SAFETY: the kernel fills the byte array, and any content is valid.
    match unsafe { libc::ioctl(lf.as_raw_fd(), iorw!(Ioctl::GetLineValues, LineValues), lv) } {
        0 => Ok(()),
        _ => Err(Error::from_errno()),
    }
}

/// Drive the requested output lines.
///
/// * `lf` - The file returned by [`get_line_handle`].
pub fn set_line_values(lf: &File, lv: &LineValues) -> Result<()> {
    // SAFETY: lv is only read by the kernel.
    match unsafe { libc::ioctl(lf.as_raw_fd(), iorw!(Ioctl::SetLineValues, LineValues), lv) } {
        0 => Ok(()),
        _ => Err(Error::from_errno()),
    }
}

/// An edge detected on a line requested with [`get_line_event`].
#[repr(C)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LineEdgeEvent {
    /// When the edge was detected, in nanoseconds.
    ///
    /// Drawn from CLOCK_MONOTONIC since Linux v5.7, and CLOCK_REALTIME before.
    pub timestamp_ns: u64,

    /// The raw [`LineEdgeEventKind`].
    pub kind: u32,
}

impl LineEdgeEvent {
    /// The size of an event in u64 words, the unit of [`read_event`] buffers.
    ///
    /// [`read_event`]: crate::read_event
    pub const fn u64_size() -> usize {
        size_of::<LineEdgeEvent>() / 8
    }

    /// Interpret the words read from an event request as an event.
    ///
    /// The kind is checked, so an event returned is known to be well formed.
    pub fn from_slice(d: &[u64]) -> Result<&LineEdgeEvent> {
        if d.len() < Self::u64_size() {
            return Err(Error::from(UnderReadError::new(
                "LineEdgeEvent",
                size_of::<LineEdgeEvent>(),
                d.len() * 8,
            )));
        }
        // SAFETY: the slice is long enough and u64 aligned, and the fields are integers.
        let le = unsafe { &*(d.as_ptr() as *const LineEdgeEvent) };
        LineEdgeEventKind::try_from(le.kind)
            .map(|_| le)
            .map_err(|e| Error::from(ValidationError::new("kind", e)))
    }
}
