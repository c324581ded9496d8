// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::gpio::prop;
use crate::line::{Bias, Direction, Drive, Edge, EdgeEvent, EdgeKind, Offset, Options};
use crate::retry::with_retry;
use crate::{Error, GpioLine, Operation, Result, RetryPolicy};
use gpioline_uapi::sysfs::{self, Attr};
use gpioline_uapi::{self as uapi, Errno};
use log::{debug, warn};
use std::fmt;
use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// A line exported via the legacy sysfs GPIO interface.
///
/// If the line was not already exported it is exported when opened, and
/// unexported when closed.  A line that was already exported, e.g. by
/// another process, is left exported.
///
/// Accesses to the line attributes that are denied are retried according to
/// the [`RetryPolicy`], as permissions on a freshly exported line are
/// applied asynchronously by udev.
///
/// Bias, drive and label are not available via sysfs.
pub struct SysfsGpio {
    root: PathBuf,
    line: Offset,
    dir: PathBuf,
    value: Option<File>,
    owns_export: bool,
    retry: RetryPolicy,
}

impl SysfsGpio {
    /// Export and open a line.
    ///
    /// * `line` - The global line number.
    /// * `direction` - The requested direction, with initial value for outputs.
    /// * `options` - The remaining configuration.  Only `edge`, `inverted`,
    ///   `retry` and `sysfs_root` are applicable.
    pub fn open(line: Offset, direction: Direction, options: &Options) -> Result<SysfsGpio> {
        SysfsGpio::open_with(line, direction, options, sysfs::open_value)
    }

    /// Open a line, using `open_value` to open its value attribute.
    pub(crate) fn open_with<F>(
        line: Offset,
        direction: Direction,
        options: &Options,
        open_value: F,
    ) -> Result<SysfsGpio>
    where
        F: FnMut(&Path, Offset) -> io::Result<File>,
    {
        options.validate(direction)?;
        options.validate_sysfs()?;
        let root = options.sysfs_root.clone();
        if !root.join("export").exists() {
            return Err(Error::unsupported(
                Operation::Open,
                format!("no sysfs GPIO interface at {root:?}"),
            ));
        }
        let mut gpio = SysfsGpio {
            dir: sysfs::line_dir(&root, line),
            root,
            line,
            value: None,
            owns_export: false,
            retry: options.retry,
        };
        if let Err(e) = gpio.setup(direction, options, open_value) {
            if let Err(ce) = gpio.close() {
                warn!("cleaning up line {} after failed open: {ce}", gpio.line);
            }
            return Err(e);
        }
        Ok(gpio)
    }

    fn setup<F>(
        &mut self,
        direction: Direction,
        options: &Options,
        mut open_value: F,
    ) -> Result<()>
    where
        F: FnMut(&Path, Offset) -> io::Result<File>,
    {
        if !sysfs::is_exported(&self.root, self.line) {
            self.export()?;
            self.wait_for_export()?;
        }
        let path = self.attr_path(Attr::Value);
        let f = with_retry(&self.retry, Operation::Open, &path, || {
            open_value(&self.root, self.line)
        })?;
        // an unread value file polls as ready
        sysfs::clear_event(&f).map_err(|e| Error::io(Operation::Open, &path, e))?;
        self.value = Some(f);

        if options.inverted != self.inverted()? {
            self.set_inverted(options.inverted)?;
        }
        match self.read_direction(Operation::Open)? {
            // high and low are always applied as they carry a level
            Some(current) => {
                if matches!(direction, Direction::High | Direction::Low) || direction != current {
                    self.set_direction(direction)?;
                }
            }
            // fixed, so only the level can be applied
            None => {
                if matches!(direction, Direction::High | Direction::Low) {
                    self.write(direction.initial_level() ^ options.inverted)?;
                }
            }
        }
        if options.edge != self.edge()? {
            self.set_edge(options.edge)?;
        }
        Ok(())
    }

    fn export(&mut self) -> Result<()> {
        let path = self.root.join("export");
        let exported = with_retry(&self.retry, Operation::Export, &path, || {
            match sysfs::export(&self.root, self.line) {
                Ok(()) => Ok(true),
                // exported by someone else since we checked
                Err(e) if e.raw_os_error() == Some(libc::EBUSY) => Ok(false),
                Err(e) => Err(e),
            }
        })
        .map_err(|e| match e.errno() {
            Some(libc::EINVAL) => Error::LineNotFound(format!("{} in {:?}", self.line, self.root)),
            _ => e,
        })?;
        if exported {
            debug!("exported line {} in {:?}", self.line, self.root);
        }
        self.owns_export = exported;
        Ok(())
    }

    fn wait_for_export(&self) -> Result<()> {
        for _ in 0..self.retry.budget() {
            if self.dir.is_dir() {
                return Ok(());
            }
            thread::sleep(self.retry.delay);
        }
        if self.dir.is_dir() {
            return Ok(());
        }
        Err(Error::io(Operation::Export, &self.dir, Errno(libc::ETIMEDOUT)))
    }

    fn attr_path(&self, attr: Attr) -> PathBuf {
        self.dir.join(attr.name())
    }

    fn value(&self, op: Operation) -> Result<&File> {
        self.value.as_ref().ok_or(Error::Closed(op))
    }

    fn read_attr(&self, op: Operation, attr: Attr) -> Result<String> {
        self.value(op)?;
        with_retry(&self.retry, op, &self.attr_path(attr), || {
            sysfs::read_attr(&self.root, self.line, attr)
        })
    }

    fn write_attr(&self, op: Operation, attr: Attr, token: &str) -> Result<()> {
        self.value(op)?;
        with_retry(&self.retry, op, &self.attr_path(attr), || {
            sysfs::write_attr(&self.root, self.line, attr, token)
        })
    }

    fn parse_err(&self, op: Operation, attr: Attr, e: uapi::Error) -> Error {
        Error::io(op, &self.attr_path(attr), e)
    }

    /// The current direction, or None if the line direction is fixed.
    ///
    /// The kernel hides the direction attribute of fixed lines.
    fn read_direction(&self, op: Operation) -> Result<Option<Direction>> {
        match self.read_attr(op, Attr::Direction) {
            Ok(token) => sysfs::Direction::parse(&token)
                .map(|d| Some(Direction::from(d)))
                .map_err(|e| self.parse_err(op, Attr::Direction, e)),
            Err(e) if e.errno() == Some(libc::ENOENT) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn monotonic_ns() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: ts is a valid timespec and CLOCK_MONOTONIC is always available.
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}

impl GpioLine for SysfsGpio {
    fn read(&self) -> Result<bool> {
        let f = self.value(Operation::Read)?;
        sysfs::read_value(f).map_err(|e| self.parse_err(Operation::Read, Attr::Value, e))
    }

    fn write(&self, value: bool) -> Result<()> {
        let f = self.value(Operation::Write)?;
        // a fixed line is left for the kernel to refuse
        if self.read_direction(Operation::Write)? == Some(Direction::In) {
            return Err(Error::unsupported(Operation::Write, "line is an input"));
        }
        sysfs::write_value(f, value)
            .map_err(|e| Error::io(Operation::Write, &self.attr_path(Attr::Value), e))
    }

    fn read_event(&self, timeout: Option<Duration>) -> Result<Option<EdgeEvent>> {
        self.wait_source(Operation::ReadEvent)?;
        let edge = self.edge()?;
        if !self.poll(timeout)? {
            return Ok(None);
        }
        let timestamp_ns = monotonic_ns();
        let value = self.read()?;
        Ok(Some(EdgeEvent {
            kind: EdgeKind::infer(edge, value),
            timestamp_ns,
        }))
    }

    fn close(&mut self) -> Result<()> {
        self.value = None;
        if self.owns_export {
            self.owns_export = false;
            let path = self.root.join("unexport");
            sysfs::unexport(&self.root, self.line)
                .map_err(|e| Error::io(Operation::Unexport, &path, e))?;
            debug!("unexported line {} in {:?}", self.line, self.root);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.value.is_none()
    }

    fn direction(&self) -> Result<Direction> {
        let op = Operation::Direction;
        self.read_direction(op)?
            .ok_or_else(|| Error::unsupported(op, "line direction is fixed"))
    }

    fn set_direction(&mut self, direction: Direction) -> Result<()> {
        let op = Operation::SetDirection;
        self.value(op)?;
        // the kernel refuses to drive a line while it is waiting for edges
        if direction.is_output() && self.edge()? != Edge::None {
            self.set_edge(Edge::None)?;
        }
        // high and low set the physical level, ignoring active_low
        self.write_attr(op, Attr::Direction, sysfs::Direction::from(direction).as_str())
            .map_err(|e| match e.errno() {
                Some(libc::ENOENT) => Error::unsupported(op, "line direction is fixed"),
                _ => e,
            })
    }

    fn edge(&self) -> Result<Edge> {
        let op = Operation::Edge;
        match self.read_attr(op, Attr::Edge) {
            Ok(token) => sysfs::Edge::parse(&token)
                .map(Edge::from)
                .map_err(|e| self.parse_err(op, Attr::Edge, e)),
            // no edge attribute means the line cannot generate interrupts
            Err(e) if e.errno() == Some(libc::ENOENT) => Ok(Edge::None),
            Err(e) => Err(e),
        }
    }

    fn set_edge(&mut self, edge: Edge) -> Result<()> {
        let op = Operation::SetEdge;
        self.value(op)?;
        if edge != Edge::None && self.direction()?.is_output() {
            return Err(Error::InvalidArgument(
                "edge detection is only available on inputs".to_string(),
            ));
        }
        self.write_attr(op, Attr::Edge, sysfs::Edge::from(edge).as_str())
            .map_err(|e| match e.errno() {
                Some(libc::ENOENT) | Some(libc::EINVAL) | Some(libc::EIO) => {
                    Error::unsupported(op, format!("line does not support {edge} edges"))
                }
                _ => e,
            })?;
        if edge != Edge::None {
            // only edges from here on should be reported
            let f = self.value(op)?;
            sysfs::clear_event(f).map_err(|e| Error::io(op, &self.attr_path(Attr::Value), e))?;
        }
        Ok(())
    }

    fn bias(&self) -> Result<Bias> {
        self.value(Operation::Bias)?;
        Err(Error::unsupported(Operation::Bias, "sysfs has no bias control"))
    }

    fn set_bias(&mut self, _bias: Bias) -> Result<()> {
        self.value(Operation::SetBias)?;
        Err(Error::unsupported(
            Operation::SetBias,
            "sysfs has no bias control",
        ))
    }

    fn drive(&self) -> Result<Drive> {
        self.value(Operation::Drive)?;
        Err(Error::unsupported(
            Operation::Drive,
            "sysfs has no drive control",
        ))
    }

    fn set_drive(&mut self, _drive: Drive) -> Result<()> {
        self.value(Operation::SetDrive)?;
        Err(Error::unsupported(
            Operation::SetDrive,
            "sysfs has no drive control",
        ))
    }

    fn inverted(&self) -> Result<bool> {
        let op = Operation::Inverted;
        let token = self.read_attr(op, Attr::ActiveLow)?;
        sysfs::parse_bool(Attr::ActiveLow, &token).map_err(|e| self.parse_err(op, Attr::ActiveLow, e))
    }

    fn set_inverted(&mut self, inverted: bool) -> Result<()> {
        let token = if inverted { "1" } else { "0" };
        self.write_attr(Operation::SetInverted, Attr::ActiveLow, token)
    }

    fn fd(&self) -> Result<RawFd> {
        Ok(self.value(Operation::Fd)?.as_raw_fd())
    }

    fn line(&self) -> Result<Offset> {
        self.value(Operation::Line)?;
        Ok(self.line)
    }

    fn path(&self) -> Result<&Path> {
        self.value(Operation::Path)?;
        Ok(&self.dir)
    }

    fn name(&self) -> Result<String> {
        self.value(Operation::Name)?;
        Ok(String::new())
    }

    fn label(&self) -> Result<String> {
        self.value(Operation::Label)?;
        Ok(String::new())
    }

    fn chip_name(&self) -> Result<String> {
        let op = Operation::ChipName;
        self.value(op)?;
        sysfs::chip_name(&self.root, self.line)
            .map_err(|e| Error::io(op, &self.dir.join("device"), e))
    }

    fn chip_label(&self) -> Result<String> {
        let op = Operation::ChipLabel;
        self.value(op)?;
        let chip = sysfs::chip_name(&self.root, self.line)
            .map_err(|e| Error::io(op, &self.dir.join("device"), e))?;
        sysfs::chip_label(&self.root, &chip)
            .map_err(|e| Error::io(op, &self.root.join(&chip).join("label"), e))
    }

    fn wait_source(&self, op: Operation) -> Result<(RawFd, i16)> {
        let f = self.value(op)?;
        if self.edge()? == Edge::None {
            return Err(Error::unsupported(op, "edge detection is disabled"));
        }
        Ok((f.as_raw_fd(), libc::POLLPRI | libc::POLLERR))
    }

    fn acknowledge(&self) -> Result<()> {
        // the pending event is only cleared by reading the value
        self.read().map(|_| ())
    }
}

impl fmt::Debug for SysfsGpio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SysfsGpio")
            .field("line", &self.line)
            .field("dir", &self.dir)
            .field("fd", &self.value.as_ref().map(|f| f.as_raw_fd()))
            .field("owns_export", &self.owns_export)
            .field("retry", &self.retry)
            .finish()
    }
}

impl fmt::Display for SysfsGpio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GPIO {} (device={:?}, fd={}, direction={}, edge={}, inverted={}, \
             chip_name=\"{}\", chip_label=\"{}\", type=sysfs)",
            self.line,
            self.dir,
            prop(self.fd()),
            prop(self.direction()),
            prop(self.edge()),
            prop(self.inverted()),
            prop(self.chip_name()),
            prop(self.chip_label()),
        )
    }
}

impl Drop for SysfsGpio {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("closing line {} in {:?}: {e}", self.line, self.root);
        }
    }
}
