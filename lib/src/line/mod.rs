// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

mod event;
pub use self::event::{EdgeEvent, EdgeKind};

mod options;
pub use self::options::{Options, DEFAULT_LABEL};

use gpioline_uapi::{sysfs, v1, v2};
#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// An identifier for a line on a particular chip.
///
/// For the sysfs backend this is the global line number.
pub type Offset = u32;

/// Identifies the line to open.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LineId {
    /// The line offset on the chip, or the global number for sysfs.
    Offset(Offset),

    /// The name of the line, as reported by the chip.
    ///
    /// Only meaningful to the character device backend.
    Name(String),
}

impl From<Offset> for LineId {
    fn from(offset: Offset) -> Self {
        LineId::Offset(offset)
    }
}

impl From<&str> for LineId {
    fn from(name: &str) -> Self {
        LineId::Name(name.to_string())
    }
}

impl From<String> for LineId {
    fn from(name: String) -> Self {
        LineId::Name(name)
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineId::Offset(o) => write!(f, "{o}"),
            LineId::Name(n) => write!(f, "{n:?}"),
        }
    }
}

/// The direction of a line.
///
/// `High` and `Low` request an output initially driven to the given
/// physical level, whether the line is active low or not.
/// When read back from a line the direction is always `In` or `Out`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    /// The line is an input.
    #[default]
    In,

    /// The line is an output, initially driven low.
    Out,

    /// The line is an output, initially driven high.
    High,

    /// The line is an output, initially driven low.
    Low,
}

impl Direction {
    /// Check if the direction is any flavour of output.
    pub fn is_output(&self) -> bool {
        !matches!(self, Direction::In)
    }

    /// The direction with any initial value stripped.
    pub fn normalized(&self) -> Direction {
        match self {
            Direction::In => Direction::In,
            _ => Direction::Out,
        }
    }

    /// The physical level initially driven by an output.
    pub(crate) fn initial_level(&self) -> bool {
        matches!(self, Direction::High)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", sysfs::Direction::from(*self).as_str())
    }
}

impl From<Direction> for sysfs::Direction {
    fn from(d: Direction) -> Self {
        match d {
            Direction::In => sysfs::Direction::In,
            Direction::Out => sysfs::Direction::Out,
            Direction::High => sysfs::Direction::High,
            Direction::Low => sysfs::Direction::Low,
        }
    }
}

impl From<sysfs::Direction> for Direction {
    fn from(d: sysfs::Direction) -> Self {
        match d {
            sysfs::Direction::In => Direction::In,
            // the kernel only reports in or out, but high and low are outputs too.
            _ => Direction::Out,
        }
    }
}

/// The edges of a line that trigger events.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Edge {
    /// Edge detection is disabled.
    #[default]
    None,

    /// Events are generated on transitions from *inactive* to *active*.
    Rising,

    /// Events are generated on transitions from *active* to *inactive*.
    Falling,

    /// Events are generated on both transitions.
    Both,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", sysfs::Edge::from(*self).as_str())
    }
}

impl From<Edge> for sysfs::Edge {
    fn from(e: Edge) -> Self {
        match e {
            Edge::None => sysfs::Edge::None,
            Edge::Rising => sysfs::Edge::Rising,
            Edge::Falling => sysfs::Edge::Falling,
            Edge::Both => sysfs::Edge::Both,
        }
    }
}

impl From<sysfs::Edge> for Edge {
    fn from(e: sysfs::Edge) -> Self {
        match e {
            sysfs::Edge::None => Edge::None,
            sysfs::Edge::Rising => Edge::Rising,
            sysfs::Edge::Falling => Edge::Falling,
            sysfs::Edge::Both => Edge::Both,
        }
    }
}

impl From<Edge> for v2::LineFlags {
    fn from(e: Edge) -> Self {
        match e {
            Edge::None => v2::LineFlags::empty(),
            Edge::Rising => v2::LineFlags::EDGE_RISING,
            Edge::Falling => v2::LineFlags::EDGE_FALLING,
            Edge::Both => v2::LineFlags::EDGE_RISING | v2::LineFlags::EDGE_FALLING,
        }
    }
}

impl From<Edge> for v1::EventFlags {
    fn from(e: Edge) -> Self {
        match e {
            Edge::None => v1::EventFlags::empty(),
            Edge::Rising => v1::EventFlags::RISING_EDGE,
            Edge::Falling => v1::EventFlags::FALLING_EDGE,
            Edge::Both => v1::EventFlags::RISING_EDGE | v1::EventFlags::FALLING_EDGE,
        }
    }
}

/// The bias settings for a line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Bias {
    /// The bias is left as the platform has it.
    #[default]
    Default,

    /// The line has pull-up enabled.
    PullUp,

    /// The line has pull-down enabled.
    PullDown,

    /// The line has bias disabled and will float unless externally driven.
    Disabled,
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Bias::Default => "default",
            Bias::PullUp => "pull-up",
            Bias::PullDown => "pull-down",
            Bias::Disabled => "disabled",
        };
        write!(f, "{s}")
    }
}

impl From<Bias> for v2::LineFlags {
    fn from(b: Bias) -> Self {
        match b {
            Bias::Default => v2::LineFlags::empty(),
            Bias::PullUp => v2::LineFlags::BIAS_PULL_UP,
            Bias::PullDown => v2::LineFlags::BIAS_PULL_DOWN,
            Bias::Disabled => v2::LineFlags::BIAS_DISABLED,
        }
    }
}

impl From<Bias> for v1::HandleFlags {
    fn from(b: Bias) -> Self {
        match b {
            Bias::Default => v1::HandleFlags::empty(),
            Bias::PullUp => v1::HandleFlags::BIAS_PULL_UP,
            Bias::PullDown => v1::HandleFlags::BIAS_PULL_DOWN,
            Bias::Disabled => v1::HandleFlags::BIAS_DISABLED,
        }
    }
}

/// The drive policy settings for an output line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Drive {
    /// The line is driven when both active and inactive.
    #[default]
    Default,

    /// The line is driven when low and set high impedance when high.
    OpenDrain,

    /// The line is driven when high and set high impedance when low.
    OpenSource,
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Drive::Default => "default",
            Drive::OpenDrain => "open-drain",
            Drive::OpenSource => "open-source",
        };
        write!(f, "{s}")
    }
}

impl From<Drive> for v2::LineFlags {
    fn from(d: Drive) -> Self {
        match d {
            Drive::Default => v2::LineFlags::empty(),
            Drive::OpenDrain => v2::LineFlags::OPEN_DRAIN,
            Drive::OpenSource => v2::LineFlags::OPEN_SOURCE,
        }
    }
}

impl From<Drive> for v1::HandleFlags {
    fn from(d: Drive) -> Self {
        match d {
            Drive::Default => v1::HandleFlags::empty(),
            Drive::OpenDrain => v1::HandleFlags::OPEN_DRAIN,
            Drive::OpenSource => v1::HandleFlags::OPEN_SOURCE,
        }
    }
}
