// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::gpio::prop;
use crate::line::{Bias, Direction, Drive, Edge, EdgeEvent, LineId, Offset, Options};
use crate::{AbiVersion, Error, GpioLine, Operation, Result};
use gpioline_uapi::{self as uapi, v1, v2};
use log::{debug, warn};
use std::fmt;
use std::fs::{self, File};
use std::os::unix::fs::{FileTypeExt, MetadataExt};
use std::os::unix::prelude::{AsRawFd, OsStrExt, RawFd};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Check that the path refers to a GPIO character device.
///
/// Returns the canonical path of the device.
pub fn is_chip<P: AsRef<Path>>(path: P) -> Result<PathBuf> {
    let path = path.as_ref();
    let pb = fs::canonicalize(path).map_err(|e| Error::io(Operation::Open, path, e))?;
    // if canonical path is of form /dev/gpiochipXX assume we are good
    if let Some(num) = pb.to_str().and_then(|s| s.strip_prefix("/dev/gpiochip")) {
        if !num.is_empty() && num.chars().all(|c| c.is_ascii_digit()) {
            return Ok(pb);
        }
    }

    // else take a more detailed look...
    let m = fs::metadata(&pb).map_err(|e| Error::io(Operation::Open, &pb, e))?;
    if !m.file_type().is_char_device() {
        return Err(Error::unsupported(
            Operation::Open,
            format!("{pb:?} is not a character device"),
        ));
    }
    if let Some(name) = pb.file_name() {
        let mut sysfs_dev = PathBuf::from("/sys/bus/gpio/devices");
        sysfs_dev.push(name);
        sysfs_dev.push("dev");
        if let Ok(rdev) = fs::read_to_string(sysfs_dev) {
            let dev = m.rdev();
            let major = ((dev >> 8) & 0xfff) | ((dev >> 32) & !0xfff);
            let minor = (dev & 0xff) | ((dev >> 12) & !0xff);
            if rdev.trim_end() == format!("{major}:{minor}") {
                return Ok(pb);
            }
        }
    }
    Err(Error::unsupported(
        Operation::Open,
        format!("{pb:?} is not a GPIO character device"),
    ))
}

/// The configuration of a requested line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct Config {
    direction: Direction,
    edge: Edge,
    bias: Bias,
    drive: Drive,
    inverted: bool,
}

impl Config {
    fn flags(&self) -> v2::LineFlags {
        let mut flags = v2::LineFlags::from(self.bias);
        if self.direction.is_output() {
            flags |= v2::LineFlags::OUTPUT | v2::LineFlags::from(self.drive);
        } else {
            flags |= v2::LineFlags::INPUT | v2::LineFlags::from(self.edge);
        }
        if self.inverted {
            flags |= v2::LineFlags::ACTIVE_LOW;
        }
        flags
    }

    fn handle_flags(&self) -> v1::HandleFlags {
        let mut flags = v1::HandleFlags::from(self.bias);
        if self.direction.is_output() {
            flags |= v1::HandleFlags::OUTPUT | v1::HandleFlags::from(self.drive);
        } else {
            flags |= v1::HandleFlags::INPUT;
        }
        if self.inverted {
            flags |= v1::HandleFlags::ACTIVE_LOW;
        }
        flags
    }

    // v1 only detects edges on a dedicated event request.
    fn needs_event_request(&self) -> bool {
        !self.direction.is_output() && self.edge != Edge::None
    }
}

/// Select the newest ABI supported by the kernel.
///
/// A kernel without an ABI rejects its ioctls, so probe with a line info
/// request on a line known to exist.
fn detect_abi_version(cf: &File, chip: &Path) -> Result<AbiVersion> {
    if v2::get_line_info(cf, 0).is_ok() {
        return Ok(AbiVersion::V2);
    }
    if v1::get_line_info(cf, 0).is_ok() {
        return Ok(AbiVersion::V1);
    }
    Err(Error::unsupported(
        Operation::Open,
        format!("{chip:?} supports neither GPIO character device ABI"),
    ))
}

/// A line requested from a GPIO character device.
///
/// The line is held for exclusive use until the `CdevGpio` is closed or dropped.
///
/// The line is accessed using uAPI ABI v2 if the kernel provides it, else
/// ABI v1, unless [`Options::abi_version`] selects one.
///
/// The kernel does not allow a granted request to be reconfigured, so the
/// setters release the line and request it again with the new configuration.
/// If the new request fails the previous configuration is restored.
/// An output keeps driving the same physical level across the change.
pub struct CdevGpio {
    chip: PathBuf,
    offset: Offset,
    label: String,
    abiv: AbiVersion,
    cfg: Config,
    req: Option<File>,
}

impl CdevGpio {
    /// Request a line from a chip.
    ///
    /// * `chip` - The path to the GPIO character device.
    /// * `line` - The offset or name of the line.
    /// * `direction` - The requested direction, with initial level for outputs.
    /// * `options` - The remaining configuration.
    pub fn open<P: AsRef<Path>, L: Into<LineId>>(
        chip: P,
        line: L,
        direction: Direction,
        options: &Options,
    ) -> Result<CdevGpio> {
        options.validate(direction)?;
        let chip = is_chip(chip)?;
        let cf = open_chip(&chip, Operation::Open)?;
        let info = uapi::get_chip_info(&cf).map_err(|e| Error::io(Operation::Open, &chip, e))?;
        let line = line.into();
        if info.num_lines == 0 {
            return Err(Error::LineNotFound(format!("{line} on {chip:?}")));
        }
        let abiv = match options.abi_version {
            Some(abiv) => abiv,
            None => detect_abi_version(&cf, &chip)?,
        };
        let offset = match line {
            LineId::Offset(offset) if offset < info.num_lines => offset,
            LineId::Offset(offset) => {
                return Err(Error::LineNotFound(format!("{offset} on {chip:?}")))
            }
            LineId::Name(name) => find_line(&cf, &chip, abiv, info.num_lines, &name)?,
        };
        let mut gpio = CdevGpio {
            chip,
            offset,
            label: options.label.clone(),
            abiv,
            cfg: Config {
                direction: direction.normalized(),
                edge: options.edge,
                bias: options.bias,
                drive: options.drive,
                inverted: options.inverted,
            },
            req: None,
        };
        gpio.req = Some(gpio.request(&cf, Operation::Open, direction.initial_level())?);
        debug!(
            "requested line {} on {:?} as {direction} using {abiv}",
            gpio.offset, gpio.chip
        );
        Ok(gpio)
    }

    /// The ABI used to access the line.
    pub fn abi_version(&self) -> AbiVersion {
        self.abiv
    }

    fn req(&self, op: Operation) -> Result<&File> {
        self.req.as_ref().ok_or(Error::Closed(op))
    }

    /// Request the line with the current configuration.
    ///
    /// * `level` - The physical level to drive, if the line is an output.
    fn request(&self, cf: &File, op: Operation, level: bool) -> Result<File> {
        let consumer = uapi::Name::from(self.label.as_str());
        let output = self.cfg.direction.is_output();
        // the kernel expects the logical value
        let value = level ^ self.cfg.inverted;
        let res = match self.abiv {
            AbiVersion::V2 => {
                let mut lr = v2::LineRequest::new(self.offset, consumer, self.cfg.flags());
                if output {
                    let mut lv = v2::LineValues::default();
                    lv.set(0, value);
                    lr.config.add_output_values(&lv);
                }
                v2::get_line(cf, lr)
            }
            AbiVersion::V1 if self.cfg.needs_event_request() => {
                let er = v1::EventRequest::new(
                    self.offset,
                    consumer,
                    self.cfg.handle_flags(),
                    self.cfg.edge.into(),
                );
                v1::get_line_event(cf, er)
            }
            AbiVersion::V1 => {
                let mut hr = v1::HandleRequest::new(self.offset, consumer, self.cfg.handle_flags());
                if output {
                    hr.values.set(0, value);
                }
                v1::get_line_handle(cf, hr)
            }
        };
        res.map_err(|e| Error::io(op, &self.chip, e))
    }

    /// Release the line and request it again with a new configuration.
    ///
    /// * `level` - The physical level to drive, if the new configuration is
    ///   an output.  If None the current level is retained.
    fn reconfigure(&mut self, op: Operation, cfg: Config, level: Option<bool>) -> Result<()> {
        self.req(op)?;
        let cf = open_chip(&self.chip, op)?;
        let prev = self.cfg;
        let current = if prev.direction.is_output() {
            self.read()? ^ prev.inverted
        } else {
            false
        };
        let level = level.unwrap_or(current);

        // the line must be released before it can be requested again
        self.req = None;
        self.cfg = cfg;
        match self.request(&cf, op, level) {
            Ok(f) => {
                self.req = Some(f);
                debug!(
                    "reconfigured line {} on {:?} to {:?}",
                    self.offset, self.chip, self.cfg
                );
                Ok(())
            }
            Err(e) => {
                self.cfg = prev;
                match self.request(&cf, op, current) {
                    Ok(f) => self.req = Some(f),
                    Err(re) => warn!(
                        "restoring line {} on {:?} failed, line closed: {re}",
                        self.offset, self.chip
                    ),
                }
                Err(e)
            }
        }
    }

    /// The line name and consumer label.
    fn names(&self, op: Operation) -> Result<(uapi::Name, uapi::Name)> {
        self.req(op)?;
        let cf = open_chip(&self.chip, op)?;
        line_names(&cf, self.abiv, self.offset).map_err(|e| Error::io(op, &self.chip, e))
    }

    fn chip_info(&self, op: Operation) -> Result<uapi::ChipInfo> {
        self.req(op)?;
        let cf = open_chip(&self.chip, op)?;
        uapi::get_chip_info(&cf).map_err(|e| Error::io(op, &self.chip, e))
    }
}

fn open_chip(chip: &Path, op: Operation) -> Result<File> {
    File::open(chip).map_err(|e| Error::io(op, chip, e))
}

fn line_names(
    cf: &File,
    abiv: AbiVersion,
    offset: Offset,
) -> uapi::Result<(uapi::Name, uapi::Name)> {
    match abiv {
        AbiVersion::V1 => v1::get_line_info(cf, offset).map(|li| (li.name, li.consumer)),
        AbiVersion::V2 => v2::get_line_info(cf, offset).map(|li| (li.name, li.consumer)),
    }
}

fn find_line(
    cf: &File,
    chip: &Path,
    abiv: AbiVersion,
    num_lines: u32,
    name: &str,
) -> Result<Offset> {
    for offset in 0..num_lines {
        let (line_name, _) =
            line_names(cf, abiv, offset).map_err(|e| Error::io(Operation::Open, chip, e))?;
        if line_name.as_os_str().as_bytes() == name.as_bytes() {
            return Ok(offset);
        }
    }
    Err(Error::LineNotFound(format!("{name:?} on {chip:?}")))
}

fn lossy(name: &uapi::Name) -> String {
    name.as_os_str().to_string_lossy().into_owned()
}

impl GpioLine for CdevGpio {
    fn read(&self) -> Result<bool> {
        let req = self.req(Operation::Read)?;
        let res = match self.abiv {
            AbiVersion::V1 => {
                let mut lv = v1::LineValues::default();
                v1::get_line_values(req, &mut lv).map(|_| lv.get(0))
            }
            AbiVersion::V2 => {
                let mut lv = v2::LineValues {
                    bits: 0,
                    mask: 0x01,
                };
                v2::get_line_values(req, &mut lv).map(|_| lv.get(0) == Some(true))
            }
        };
        res.map_err(|e| Error::io(Operation::Read, &self.chip, e))
    }

    fn write(&self, value: bool) -> Result<()> {
        let req = self.req(Operation::Write)?;
        if !self.cfg.direction.is_output() {
            return Err(Error::unsupported(Operation::Write, "line is an input"));
        }
        let res = match self.abiv {
            AbiVersion::V1 => {
                let mut lv = v1::LineValues::default();
                lv.set(0, value);
                v1::set_line_values(req, &lv)
            }
            AbiVersion::V2 => {
                let mut lv = v2::LineValues::default();
                lv.set(0, value);
                v2::set_line_values(req, &lv)
            }
        };
        res.map_err(|e| Error::io(Operation::Write, &self.chip, e))
    }

    fn read_event(&self, timeout: Option<Duration>) -> Result<Option<EdgeEvent>> {
        self.wait_source(Operation::ReadEvent)?;
        if !self.poll(timeout)? {
            return Ok(None);
        }
        let req = self.req(Operation::ReadEvent)?;
        let mut buf = [0u64; v2::LineEdgeEvent::u64_size()];
        // the buffer must only fit one event, else v1 returns several
        let res = match self.abiv {
            AbiVersion::V1 => {
                let buf = &mut buf[..v1::LineEdgeEvent::u64_size()];
                uapi::read_event(req, buf)
                    .and_then(|n| v1::LineEdgeEvent::from_slice(&buf[..n]))
                    .and_then(EdgeEvent::try_from)
            }
            AbiVersion::V2 => uapi::read_event(req, &mut buf)
                .and_then(|n| v2::LineEdgeEvent::from_slice(&buf[..n]))
                .and_then(EdgeEvent::try_from),
        };
        res.map(Some)
            .map_err(|e| Error::io(Operation::ReadEvent, &self.chip, e))
    }

    fn close(&mut self) -> Result<()> {
        if self.req.take().is_some() {
            debug!("released line {} on {:?}", self.offset, self.chip);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.req.is_none()
    }

    fn direction(&self) -> Result<Direction> {
        self.req(Operation::Direction)?;
        Ok(self.cfg.direction)
    }

    fn set_direction(&mut self, direction: Direction) -> Result<()> {
        self.req(Operation::SetDirection)?;
        match (self.cfg.direction.is_output(), direction) {
            (false, Direction::In) | (true, Direction::Out) => Ok(()),
            (true, Direction::High | Direction::Low) => {
                self.write(direction.initial_level() ^ self.cfg.inverted)
            }
            (_, direction) => {
                let cfg = Config {
                    direction: direction.normalized(),
                    edge: Edge::None,
                    drive: Drive::Default,
                    ..self.cfg
                };
                self.reconfigure(
                    Operation::SetDirection,
                    cfg,
                    Some(direction.initial_level()),
                )
            }
        }
    }

    fn edge(&self) -> Result<Edge> {
        self.req(Operation::Edge)?;
        Ok(self.cfg.edge)
    }

    fn set_edge(&mut self, edge: Edge) -> Result<()> {
        self.req(Operation::SetEdge)?;
        if self.cfg.direction.is_output() {
            return Err(Error::InvalidArgument(
                "edge detection is only available on inputs".to_string(),
            ));
        }
        if edge == self.cfg.edge {
            return Ok(());
        }
        let cfg = Config { edge, ..self.cfg };
        self.reconfigure(Operation::SetEdge, cfg, None)
    }

    fn bias(&self) -> Result<Bias> {
        self.req(Operation::Bias)?;
        Ok(self.cfg.bias)
    }

    fn set_bias(&mut self, bias: Bias) -> Result<()> {
        self.req(Operation::SetBias)?;
        if bias == self.cfg.bias {
            return Ok(());
        }
        let cfg = Config { bias, ..self.cfg };
        self.reconfigure(Operation::SetBias, cfg, None)
    }

    fn drive(&self) -> Result<Drive> {
        self.req(Operation::Drive)?;
        Ok(self.cfg.drive)
    }

    fn set_drive(&mut self, drive: Drive) -> Result<()> {
        self.req(Operation::SetDrive)?;
        if !self.cfg.direction.is_output() && drive != Drive::Default {
            return Err(Error::InvalidArgument(
                "drive is only available on outputs".to_string(),
            ));
        }
        if drive == self.cfg.drive {
            return Ok(());
        }
        let cfg = Config { drive, ..self.cfg };
        self.reconfigure(Operation::SetDrive, cfg, None)
    }

    fn inverted(&self) -> Result<bool> {
        self.req(Operation::Inverted)?;
        Ok(self.cfg.inverted)
    }

    fn set_inverted(&mut self, inverted: bool) -> Result<()> {
        self.req(Operation::SetInverted)?;
        if inverted == self.cfg.inverted {
            return Ok(());
        }
        let cfg = Config {
            inverted,
            ..self.cfg
        };
        self.reconfigure(Operation::SetInverted, cfg, None)
    }

    fn fd(&self) -> Result<RawFd> {
        Ok(self.req(Operation::Fd)?.as_raw_fd())
    }

    fn line(&self) -> Result<Offset> {
        self.req(Operation::Line)?;
        Ok(self.offset)
    }

    fn path(&self) -> Result<&Path> {
        self.req(Operation::Path)?;
        Ok(&self.chip)
    }

    fn name(&self) -> Result<String> {
        Ok(lossy(&self.names(Operation::Name)?.0))
    }

    fn label(&self) -> Result<String> {
        Ok(lossy(&self.names(Operation::Label)?.1))
    }

    fn chip_name(&self) -> Result<String> {
        Ok(lossy(&self.chip_info(Operation::ChipName)?.name))
    }

    fn chip_label(&self) -> Result<String> {
        Ok(lossy(&self.chip_info(Operation::ChipLabel)?.label))
    }

    fn wait_source(&self, op: Operation) -> Result<(RawFd, i16)> {
        let req = self.req(op)?;
        if self.cfg.edge == Edge::None {
            return Err(Error::unsupported(op, "edge detection is disabled"));
        }
        Ok((req.as_raw_fd(), libc::POLLIN))
    }
}

impl fmt::Debug for CdevGpio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CdevGpio")
            .field("chip", &self.chip)
            .field("offset", &self.offset)
            .field("label", &self.label)
            .field("abiv", &self.abiv)
            .field("cfg", &self.cfg)
            .field("fd", &self.req.as_ref().map(|f| f.as_raw_fd()))
            .finish()
    }
}

impl fmt::Display for CdevGpio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GPIO {} (name=\"{}\", label=\"{}\", device={:?}, fd={}, direction={}, edge={}, \
             bias={}, drive={}, inverted={}, chip_name=\"{}\", chip_label=\"{}\", type=cdev)",
            self.offset,
            prop(self.name()),
            prop(self.label()),
            self.chip,
            prop(self.fd()),
            prop(self.direction()),
            prop(self.edge()),
            prop(self.bias()),
            prop(self.drive()),
            prop(self.inverted()),
            prop(self.chip_name()),
            prop(self.chip_label()),
        )
    }
}

impl Drop for CdevGpio {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("closing line {} on {:?}: {e}", self.offset, self.chip);
        }
    }
}
