// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::Edge;
use gpioline_uapi::{self as uapi, v1, v2, ValidationError};
#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use std::time::Duration;

/// The details of an edge detected on an input line.
///
/// Both backends return events of this shape, but the quality of the
/// timestamp differs:
///
/// * the character device timestamp is taken by the kernel when the edge is
///   detected.
/// * sysfs provides no timestamp, so the **CLOCK_MONOTONIC** is sampled when
///   the edge is noticed in userspace.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeEvent {
    /// The event trigger identifier.
    pub kind: EdgeKind,

    /// The best estimate of time of event occurrence, in nanoseconds,
    /// drawn from **CLOCK_MONOTONIC**.
    ///
    /// Intended for comparing times between events and should be converted
    /// to [`Duration`](std::time::Duration), e.g. by [`EdgeEvent::elapsed`].
    pub timestamp_ns: u64,
}

impl EdgeEvent {
    /// The event timestamp as a Duration since an arbitrary epoch.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.timestamp_ns)
    }
}

impl TryFrom<&v2::LineEdgeEvent> for EdgeEvent {
    type Error = uapi::Error;

    fn try_from(le: &v2::LineEdgeEvent) -> Result<Self, Self::Error> {
        let kind = uapi::LineEdgeEventKind::try_from(le.kind)
            .map_err(|e| uapi::Error::from(ValidationError::new("kind", e)))?;
        Ok(EdgeEvent {
            kind: kind.into(),
            timestamp_ns: le.timestamp_ns,
        })
    }
}

impl TryFrom<&v1::LineEdgeEvent> for EdgeEvent {
    type Error = uapi::Error;

    // Kernels before v5.7 stamp v1 events from CLOCK_REALTIME.
    fn try_from(le: &v1::LineEdgeEvent) -> Result<Self, Self::Error> {
        let kind = uapi::LineEdgeEventKind::try_from(le.kind)
            .map_err(|e| uapi::Error::from(ValidationError::new("kind", e)))?;
        Ok(EdgeEvent {
            kind: kind.into(),
            timestamp_ns: le.timestamp_ns,
        })
    }
}

/// The cause of an [`EdgeEvent`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EdgeKind {
    /// Indicates the line transitioned from inactive to active.
    Rising = 1,

    /// Indicates the line transitioned from active to inactive.
    Falling = 2,
}

impl EdgeKind {
    /// The kind of edge implied by the configured edge detection and the
    /// value of the line after the edge.
    ///
    /// Only needed where the platform reports that an edge occurred but not
    /// which.
    pub(crate) fn infer(edge: Edge, value: bool) -> EdgeKind {
        match edge {
            Edge::Rising => EdgeKind::Rising,
            Edge::Falling => EdgeKind::Falling,
            _ if value => EdgeKind::Rising,
            _ => EdgeKind::Falling,
        }
    }
}

impl From<uapi::LineEdgeEventKind> for EdgeKind {
    fn from(kind: uapi::LineEdgeEventKind) -> Self {
        match kind {
            uapi::LineEdgeEventKind::RisingEdge => EdgeKind::Rising,
            uapi::LineEdgeEventKind::FallingEdge => EdgeKind::Falling,
        }
    }
}
