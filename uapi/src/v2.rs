// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bitflags::bitflags;
use std::fs::File;
use std::mem::size_of;
use std::os::unix::prelude::{AsRawFd, FromRawFd};

use crate::common::{iorw, Padding};
pub use crate::common::{
    Error, LineEdgeEventKind, Name, Offset, Offsets, Result, UnderReadError, ValidationError,
};

#[repr(u8)]
enum Ioctl {
    GetLineInfo = 5,
    GetLine = 7,
    GetLineValues = 0xE,
    SetLineValues = 0xF,
}

bitflags! {
    /// The configuration of a line, as requested or as reported by the kernel.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct LineFlags: u64 {
        /// Reported when the line is held by some consumer.
        const USED = 1 << 0;

        /// The logical value is the inverse of the physical level.
        const ACTIVE_LOW = 1 << 1;

        const INPUT = 1 << 2;

        const OUTPUT = 1 << 3;

        /// Detect transitions to active.
        const EDGE_RISING = 1 << 4;

        /// Detect transitions to inactive.
        const EDGE_FALLING = 1 << 5;

        const OPEN_DRAIN = 1 << 6;

        const OPEN_SOURCE = 1 << 7;

        const BIAS_PULL_UP = 1 << 8;

        const BIAS_PULL_DOWN = 1 << 9;

        const BIAS_DISABLED = 1 << 10;

        /// Stamp events from CLOCK_REALTIME instead of CLOCK_MONOTONIC.
        const EVENT_CLOCK_REALTIME = 1 << 11;
    }
}

/// A bitmap of logical line values.
///
/// Bit n corresponds to `offsets[n]` of the request, and only the lines
/// selected by `mask` are read or written.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LineValues {
    /// The values, 1 for active.
    pub bits: u64,

    /// The lines of interest.
    pub mask: u64,
}

impl LineValues {
    /// The value of the line at `idx`, or None if it is not in the mask.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<bool> {
        let bit = 1u64 << idx;
        (self.mask & bit != 0).then_some(self.bits & bit != 0)
    }

    /// Select the line at `idx` and record its value.
    #[inline]
    pub fn set(&mut self, idx: usize, active: bool) {
        let bit = 1u64 << idx;
        self.mask |= bit;
        self.bits = if active {
            self.bits | bit
        } else {
            self.bits & !bit
        };
    }
}

/// Read the values of the lines selected in `lv.mask`.
///
/// * `lf` - The request returned by [`get_line`].
pub fn get_line_values(lf: &File, lv: &mut LineValues) -> Result<()> {
    // SAFETY: the kernel only updates the bits, which are plain integers.
    match unsafe { libc::ioctl(lf.as_raw_fd(), iorw!(Ioctl::GetLineValues, LineValues), lv) } {
        0 => Ok(()),
        _ => Err(Error::from_errno()),
    }
}

/// Drive the output lines selected in `lv.mask`.
///
/// * `lf` - The request returned by [`get_line`].
pub fn set_line_values(lf: &File, lv: &LineValues) -> Result<()> {
    // SAFETY: lv is only read by the kernel.
    match unsafe { libc::ioctl(lf.as_raw_fd(), iorw!(Ioctl::SetLineValues, LineValues), lv) } {
        0 => Ok(()),
        _ => Err(Error::from_errno()),
    }
}

// The attribute id for output values.
const ATTR_OUTPUT_VALUES: u32 = 2;

const NUM_ATTRS_MAX: usize = 10;

// A tagged attribute slot.  The payload is a union in the kernel, but the
// only attribute set here is output values, which fills all 64 bits.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct Attribute {
    id: u32,
    padding: u32,
    data: u64,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct ConfigAttribute {
    attr: Attribute,
    mask: u64,
}

/// The configuration of the lines in a request.
#[repr(C)]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LineConfig {
    /// The flags applied to every requested line.
    pub flags: LineFlags,

    num_attrs: u32,

    padding: Padding<5>,

    attrs: [ConfigAttribute; NUM_ATTRS_MAX],
}

impl LineConfig {
    /// Attach initial values for the selected output lines.
    ///
    /// Each call consumes one of the ten attribute slots.
    pub fn add_output_values(&mut self, lv: &LineValues) {
        let idx = self.num_attrs as usize;
        self.attrs[idx] = ConfigAttribute {
            attr: Attribute {
                id: ATTR_OUTPUT_VALUES,
                padding: 0,
                data: lv.bits,
            },
            mask: lv.mask,
        };
        self.num_attrs += 1;
    }

    /// The initial values attached by [`add_output_values`], if any.
    ///
    /// [`add_output_values`]: LineConfig::add_output_values
    pub fn output_values(&self) -> Option<LineValues> {
        self.attrs[..self.num_attrs as usize]
            .iter()
            .find(|ca| ca.attr.id == ATTR_OUTPUT_VALUES)
            .map(|ca| LineValues {
                bits: ca.attr.data,
                mask: ca.mask,
            })
    }
}

/// A request for exclusive access to lines on a chip.
#[repr(C)]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LineRequest {
    /// The offsets of the requested lines.  Only the first `num_lines` are used.
    pub offsets: Offsets,

    /// The consumer label reported for the lines while they are held.
    pub consumer: Name,

    /// The requested configuration.
    pub config: LineConfig,

    /// The number of lines requested.
    pub num_lines: u32,

    /// The minimum number of edge events to buffer, or 0 for the kernel default.
    pub event_buffer_size: u32,

    padding: Padding<5>,

    // written by the kernel
    fd: i32,
}

impl LineRequest {
    /// A request for the single line at `offset`.
    pub fn new(offset: Offset, consumer: Name, flags: LineFlags) -> LineRequest {
        let mut lr = LineRequest {
            offsets: Offsets::from_slice(&[offset]),
            consumer,
            num_lines: 1,
            ..Default::default()
        };
        lr.config.flags = flags;
        lr
    }
}

/// Request lines from the chip.
///
/// Returns the request, which holds the lines until it is closed.
///
/// * `cf` - The open gpiochip device file.
pub fn get_line(cf: &File, mut lr: LineRequest) -> Result<File> {
    // SAFETY: lr outlives the call and the fd is only trusted on success.
    match unsafe { libc::ioctl(cf.as_raw_fd(), iorw!(Ioctl::GetLine, LineRequest), &mut lr) } {
        0 => Ok(unsafe { File::from_raw_fd(lr.fd) }),
        _ => Err(Error::from_errno()),
    }
}

/// The publicly visible state of a line.
#[repr(C)]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LineInfo {
    /// The name assigned to the line by the chip or platform, possibly empty.
    pub name: Name,

    /// The label of the current consumer, empty if the line is free.
    pub consumer: Name,

    /// The offset of the line on the chip.
    pub offset: Offset,

    num_attrs: u32,

    /// The current configuration.
    pub flags: LineFlags,

    attrs: [Attribute; NUM_ATTRS_MAX],

    padding: Padding<4>,
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

/// An edge detected on a requested line.
#[repr(C)]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LineEdgeEvent {
    /// When the edge was detected, in nanoseconds.
    ///
    /// Drawn from CLOCK_MONOTONIC unless the request asked otherwise.
    pub timestamp_ns: u64,

    /// The raw [`LineEdgeEventKind`].
    pub kind: u32,

    /// The offset of the line.
    pub offset: Offset,

    /// The position of the event among all events in the request.
    pub seqno: u32,

    /// The position of the event among events on this line.
    pub line_seqno: u32,

    #[doc(hidden)]
    pub padding: Padding<6>,
}

impl LineEdgeEvent {
    /// The size of an event in u64 words, the unit of [`read_event`] buffers.
    ///
    /// [`read_event`]: crate::read_event
    pub const fn u64_size() -> usize {
        size_of::<LineEdgeEvent>() / 8
    }

    /// Interpret the words read from a request as an event.
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
        // SAFETY: the slice is long enough and u64 aligned, and every field is an integer.
        let le = unsafe { &*(d.as_ptr() as *const LineEdgeEvent) };
        LineEdgeEventKind::try_from(le.kind)
            .map(|_| le)
            .map_err(|e| Error::from(ValidationError::new("kind", e)))
    }
}
