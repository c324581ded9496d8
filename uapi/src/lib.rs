// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A thin but safe Rust layer around the two Linux GPIO userspace interfaces.
//!
//! The [`v2`] module covers the GPIO character device ABI v2, released in
//! Linux v5.10, [`v1`] covers the ABI it superseded, and the [`sysfs`]
//! module covers the deprecated `/sys/class/gpio` interface.
//!
//! None of the modules apply any policy - there is no retrying, no caching and
//! no selection between them.  That is left to higher layers.

pub(crate) mod common;

pub use common::{
    get_chip_info, read_event, wait_fds, ChipInfo, Errno, Error, LineEdgeEventKind, Name, Offset,
    Offsets, Padding, Result, UnderReadError, ValidationError, LINES_MAX, NAME_MAX,
};

/// The subset of GPIO character device ABI v1 used to access single lines.
///
/// Only needed on kernels that predate ABI v2.
pub mod v1;

/// The subset of GPIO character device ABI v2 used to access single lines.
pub mod v2;

/// The legacy sysfs GPIO interface.
///
/// This interface has been deprecated in the kernel since Linux v4.8 but
/// remains in use on many embedded platforms.
pub mod sysfs;
