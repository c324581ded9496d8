// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::{Error, Offset, Result, ValidationError};

/// The default mount point of the sysfs GPIO class.
pub const ROOT: &str = "/sys/class/gpio";

/// The per-line attribute files exposed in an exported line directory.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Attr {
    /// The line direction, one of `in`, `out`, `high` or `low`.
    Direction,

    /// The line value, `0` or `1`.
    Value,

    /// The edges that trigger a priority event on the value file.
    Edge,

    /// Whether the line value is inverted, `0` or `1`.
    ActiveLow,
}

impl Attr {
    /// The name of the attribute file.
    pub fn name(&self) -> &'static str {
        match self {
            Attr::Direction => "direction",
            Attr::Value => "value",
            Attr::Edge => "edge",
            Attr::ActiveLow => "active_low",
        }
    }
}

/// The direction tokens accepted by the `direction` attribute.
///
/// `High` and `Low` set the line as an output with the given initial value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// An input.
    In,
    /// An output, initially low.
    Out,
    /// An output, initially high.
    High,
    /// An output, initially low.
    Low,
}

impl Direction {
    /// The token written to the `direction` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::High => "high",
            Direction::Low => "low",
        }
    }

    /// Parse the content of a `direction` attribute.
    pub fn parse(s: &str) -> Result<Direction> {
        Ok(match s.trim() {
            "in" => Direction::In,
            "out" => Direction::Out,
            "high" => Direction::High,
            "low" => Direction::Low,
            x => return Err(invalid(Attr::Direction, x)),
        })
    }
}

/// The edge tokens accepted by the `edge` attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Edge {
    /// No edge detection.
    None,
    /// Rising edges only.
    Rising,
    /// Falling edges only.
    Falling,
    /// Both rising and falling edges.
    Both,
}

impl Edge {
    /// The token written to the `edge` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::None => "none",
            Edge::Rising => "rising",
            Edge::Falling => "falling",
            Edge::Both => "both",
        }
    }

    /// Parse the content of an `edge` attribute.
    pub fn parse(s: &str) -> Result<Edge> {
        Ok(match s.trim() {
            "none" => Edge::None,
            "rising" => Edge::Rising,
            "falling" => Edge::Falling,
            "both" => Edge::Both,
            x => return Err(invalid(Attr::Edge, x)),
        })
    }
}

/// Parse the content of a boolean attribute, such as `value` or `active_low`.
pub fn parse_bool(attr: Attr, s: &str) -> Result<bool> {
    match s.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        x => Err(invalid(attr, x)),
    }
}

fn invalid(attr: Attr, token: &str) -> Error {
    Error::from(ValidationError::new(
        attr.name(),
        format!("unexpected token: {token:?}"),
    ))
}

/// The directory of an exported line.
pub fn line_dir(root: &Path, line: Offset) -> PathBuf {
    root.join(format!("gpio{line}"))
}

/// The path to an attribute of an exported line.
pub fn attr_path(root: &Path, line: Offset, attr: Attr) -> PathBuf {
    line_dir(root, line).join(attr.name())
}

/// Check if the line directory is present, i.e. the line is exported.
pub fn is_exported(root: &Path, line: Offset) -> bool {
    line_dir(root, line).is_dir()
}

fn write_control(path: &Path, line: Offset) -> io::Result<()> {
    let mut f = OpenOptions::new().write(true).truncate(true).open(path)?;
    f.write_all(format!("{line}\n").as_bytes())
}

/// Request the kernel to export a line to userspace.
///
/// The kernel returns `EBUSY` if the line is already exported and `EINVAL`
/// if the line does not exist.
pub fn export(root: &Path, line: Offset) -> io::Result<()> {
    write_control(&root.join("export"), line)
}

/// Request the kernel to withdraw an exported line.
pub fn unexport(root: &Path, line: Offset) -> io::Result<()> {
    write_control(&root.join("unexport"), line)
}

/// Read an attribute, with surrounding whitespace removed.
pub fn read_attr(root: &Path, line: Offset, attr: Attr) -> io::Result<String> {
    let s = fs::read_to_string(attr_path(root, line, attr))?;
    Ok(s.trim().to_string())
}

/// Write a token to an attribute.
pub fn write_attr(root: &Path, line: Offset, attr: Attr, token: &str) -> io::Result<()> {
    let mut f = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(attr_path(root, line, attr))?;
    f.write_all(format!("{token}\n").as_bytes())
}

/// Open the value attribute for reading and writing.
///
/// The file is held open for the lifetime of the line so that its
/// priority events can be polled.
pub fn open_value(root: &Path, line: Offset) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(attr_path(root, line, Attr::Value))
}

/// Return an open value file to the start so the next read returns fresh data.
pub fn rewind(mut f: &File) -> io::Result<()> {
    f.seek(SeekFrom::Start(0)).map(|_| ())
}

/// Clear any pending priority event on an open value file.
///
/// A value file polls as ready from when it is opened, or from when the
/// kernel last notified a change, until it is read.
/// The file is rewound after the read.
pub fn clear_event(f: &File) -> io::Result<()> {
    io::copy(&mut f.take(16), &mut io::sink())?;
    rewind(f)
}

/// Read the value from an open value file.
///
/// The file is rewound after the read.
pub fn read_value(mut f: &File) -> Result<bool> {
    let mut buf = [0u8; 2];
    let n = f.read(&mut buf)?;
    rewind(f)?;
    let s = String::from_utf8_lossy(&buf[..n]);
    parse_bool(Attr::Value, &s)
}

/// Write a value to an open value file.
///
/// The file is rewound after the write.
pub fn write_value(mut f: &File, value: bool) -> io::Result<()> {
    f.write_all(if value { b"1\n" } else { b"0\n" })?;
    rewind(f)
}

/// The name of the chip containing an exported line, e.g. `gpiochip0`.
///
/// Drawn from the target of the line's `device` link.
pub fn chip_name(root: &Path, line: Offset) -> io::Result<String> {
    let target = fs::read_link(line_dir(root, line).join("device"))?;
    target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))
}

/// The label of a chip, as reported by `<root>/<chip>/label`.
pub fn chip_label(root: &Path, chip: &str) -> io::Result<String> {
    let s = fs::read_to_string(root.join(chip).join("label"))?;
    Ok(s.trim().to_string())
}
