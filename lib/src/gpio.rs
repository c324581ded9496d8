// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::line::{Bias, Direction, Drive, Edge, EdgeEvent, LineId, Offset, Options};
use crate::{poll, AbiVersion, CdevGpio, Error, Operation, Result, RetryPolicy, SysfsGpio};
use std::fmt;
use std::os::unix::io::RawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The operations available on an open line, whichever backend provides it.
///
/// Every operation on a closed line fails with [`Error::Closed`].
///
/// Timeouts are `Option<Duration>`, where `None` waits indefinitely and
/// `Some(Duration::ZERO)` checks without waiting.  An expired timeout is not
/// an error.
pub trait GpioLine: fmt::Debug + fmt::Display + Send {
    /// Read the logical value of the line.
    fn read(&self) -> Result<bool>;

    /// Set the logical value of an output line.
    fn write(&self, value: bool) -> Result<()>;

    /// Wait for an edge event on the line.
    ///
    /// Requires edge detection to be enabled.
    ///
    /// Returns true if an event is available.
    fn poll(&self, timeout: Option<Duration>) -> Result<bool> {
        let (fd, events) = self.wait_source(Operation::Poll)?;
        let ready = match poll::wait_fd(fd, events, timeout) {
            Ok(ready) => ready,
            Err(e) => return Err(Error::io(Operation::Poll, self.path()?, e)),
        };
        if ready {
            self.acknowledge()?;
        }
        Ok(ready)
    }

    /// Wait for and return the next edge event on the line.
    ///
    /// Requires edge detection to be enabled.
    ///
    /// Returns None if the timeout expires before an event is available.
    fn read_event(&self, timeout: Option<Duration>) -> Result<Option<EdgeEvent>>;

    /// Release the line.
    ///
    /// Closing an already closed line does nothing.
    fn close(&mut self) -> Result<()>;

    /// Check if the line has been closed.
    fn is_closed(&self) -> bool;

    /// The direction of the line, either [`Direction::In`] or [`Direction::Out`].
    fn direction(&self) -> Result<Direction>;

    /// Change the direction of the line.
    ///
    /// [`Direction::High`] and [`Direction::Low`] also set the output value.
    /// Changing direction disables edge detection.
    fn set_direction(&mut self, direction: Direction) -> Result<()>;

    /// The edges that generate events.
    fn edge(&self) -> Result<Edge>;

    /// Change the edges that generate events.
    ///
    /// Only available on inputs.
    fn set_edge(&mut self, edge: Edge) -> Result<()>;

    /// The bias applied to the line.
    fn bias(&self) -> Result<Bias>;

    /// Change the bias applied to the line.
    fn set_bias(&mut self, bias: Bias) -> Result<()>;

    /// The drive policy of the line.
    fn drive(&self) -> Result<Drive>;

    /// Change the drive policy of the line.
    ///
    /// Only available on outputs.
    fn set_drive(&mut self, drive: Drive) -> Result<()>;

    /// Check if the line is active low.
    fn inverted(&self) -> Result<bool>;

    /// Change whether the line is active low.
    fn set_inverted(&mut self, inverted: bool) -> Result<()>;

    /// The file descriptor used to access the line.
    ///
    /// Suitable for adding to an external poller.
    fn fd(&self) -> Result<RawFd>;

    /// The line offset on the chip, or the global line number for sysfs.
    fn line(&self) -> Result<Offset>;

    /// The chip device, or the line directory for sysfs.
    fn path(&self) -> Result<&Path>;

    /// The name of the line.
    fn name(&self) -> Result<String>;

    /// The consumer label of the line.
    fn label(&self) -> Result<String>;

    /// The name of the chip containing the line.
    fn chip_name(&self) -> Result<String>;

    /// The label of the chip containing the line.
    fn chip_label(&self) -> Result<String>;

    /// The descriptor and poll events that signal an edge event.
    #[doc(hidden)]
    fn wait_source(&self, op: Operation) -> Result<(RawFd, i16)>;

    /// Called once the descriptor has been reported ready.
    #[doc(hidden)]
    fn acknowledge(&self) -> Result<()> {
        Ok(())
    }
}

/// A GPIO line, accessed through whichever backend matched the arguments
/// used to open it.
///
/// ```no_run
/// # use gpioline::Result;
/// use gpioline::{Direction, Gpio, GpioLine, Options};
/// use std::path::Path;
///
/// # fn main() -> Result<()> {
/// let led = Gpio::open(
///     Some(Path::new("/dev/gpiochip0")),
///     12,
///     Direction::Low,
///     &Options::default(),
/// )?;
/// led.write(true)?;
/// # Ok(())
/// # }
/// ```
pub struct Gpio(Box<dyn GpioLine>);

impl Gpio {
    /// Start building a line with chained mutators.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Open a line.
    ///
    /// The backend is selected by the arguments:
    ///  - with a chip the line is requested from the character device.
    ///  - without a chip the line is identified by its global number and
    ///    accessed via sysfs, which supports neither bias, drive nor label.
    ///
    /// * `chip` - The path to the GPIO character device.
    /// * `line` - The offset or name of the line.
    /// * `direction` - The requested direction, with initial value for outputs.
    /// * `options` - The remaining configuration.
    pub fn open<L: Into<LineId>>(
        chip: Option<&Path>,
        line: L,
        direction: Direction,
        options: &Options,
    ) -> Result<Gpio> {
        let line = line.into();
        Ok(match (chip, line) {
            (Some(chip), line) => Gpio(Box::new(CdevGpio::open(chip, line, direction, options)?)),
            (None, LineId::Offset(offset)) => {
                Gpio(Box::new(SysfsGpio::open(offset, direction, options)?))
            }
            (None, LineId::Name(name)) => {
                return Err(Error::InvalidArgument(format!(
                    "line {name:?} identified by name requires a chip"
                )))
            }
        })
    }

    /// Wrap a line opened directly from a backend.
    pub fn from_line<G: GpioLine + 'static>(line: G) -> Gpio {
        Gpio(Box::new(line))
    }
}

impl GpioLine for Gpio {
    fn read(&self) -> Result<bool> {
        self.0.read()
    }
    fn write(&self, value: bool) -> Result<()> {
        self.0.write(value)
    }
    fn poll(&self, timeout: Option<Duration>) -> Result<bool> {
        self.0.poll(timeout)
    }
    fn read_event(&self, timeout: Option<Duration>) -> Result<Option<EdgeEvent>> {
        self.0.read_event(timeout)
    }
    fn close(&mut self) -> Result<()> {
        self.0.close()
    }
    fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
    fn direction(&self) -> Result<Direction> {
        self.0.direction()
    }
    fn set_direction(&mut self, direction: Direction) -> Result<()> {
        self.0.set_direction(direction)
    }
    fn edge(&self) -> Result<Edge> {
        self.0.edge()
    }
    fn set_edge(&mut self, edge: Edge) -> Result<()> {
        self.0.set_edge(edge)
    }
    fn bias(&self) -> Result<Bias> {
        self.0.bias()
    }
    fn set_bias(&mut self, bias: Bias) -> Result<()> {
        self.0.set_bias(bias)
    }
    fn drive(&self) -> Result<Drive> {
        self.0.drive()
    }
    fn set_drive(&mut self, drive: Drive) -> Result<()> {
        self.0.set_drive(drive)
    }
    fn inverted(&self) -> Result<bool> {
        self.0.inverted()
    }
    fn set_inverted(&mut self, inverted: bool) -> Result<()> {
        self.0.set_inverted(inverted)
    }
    fn fd(&self) -> Result<RawFd> {
        self.0.fd()
    }
    fn line(&self) -> Result<Offset> {
        self.0.line()
    }
    fn path(&self) -> Result<&Path> {
        self.0.path()
    }
    fn name(&self) -> Result<String> {
        self.0.name()
    }
    fn label(&self) -> Result<String> {
        self.0.label()
    }
    fn chip_name(&self) -> Result<String> {
        self.0.chip_name()
    }
    fn chip_label(&self) -> Result<String> {
        self.0.chip_label()
    }
    fn wait_source(&self, op: Operation) -> Result<(RawFd, i16)> {
        self.0.wait_source(op)
    }
    fn acknowledge(&self) -> Result<()> {
        self.0.acknowledge()
    }
}

impl fmt::Debug for Gpio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Gpio").field(&self.0).finish()
    }
}

impl fmt::Display for Gpio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Render a property for display, or `<error>` if it cannot be read.
pub(crate) fn prop<T: fmt::Display>(res: Result<T>) -> String {
    match res {
        Ok(v) => v.to_string(),
        Err(_) => "<error>".to_string(),
    }
}

/// A builder of [`Gpio`] lines.
///
/// Gathers the chip, line, direction and options, then opens the line with
/// [`open`].
///
/// The chip is optional.  Without it the line is accessed via sysfs.
///
/// [`open`]: Builder::open
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Builder {
    chip: Option<PathBuf>,
    line: Option<LineId>,
    direction: Direction,
    options: Options,
}

impl Builder {
    /// Open the line described by the builder.
    pub fn open(&mut self) -> Result<Gpio> {
        let line = self
            .line
            .clone()
            .ok_or_else(|| Error::InvalidArgument("no line specified".to_string()))?;
        Gpio::open(self.chip.as_deref(), line, self.direction, &self.options)
    }

    /// Select the chip containing the line.
    pub fn on_chip<P: Into<PathBuf>>(&mut self, path: P) -> &mut Self {
        self.chip = Some(path.into());
        self
    }

    /// Select the line by offset, or by global number for sysfs.
    pub fn with_line(&mut self, offset: Offset) -> &mut Self {
        self.line = Some(LineId::Offset(offset));
        self
    }

    /// Select the line by name.
    ///
    /// Requires a chip.
    pub fn with_name<N: Into<String>>(&mut self, name: N) -> &mut Self {
        self.line = Some(LineId::Name(name.into()));
        self
    }

    /// Set the direction of the line.
    pub fn with_direction(&mut self, direction: Direction) -> &mut Self {
        self.direction = direction;
        self
    }

    /// Set the line as an input.
    pub fn as_input(&mut self) -> &mut Self {
        self.with_direction(Direction::In)
    }

    /// Set the line as an output initially driven to the given physical level.
    pub fn as_output(&mut self, value: bool) -> &mut Self {
        self.with_direction(if value {
            Direction::High
        } else {
            Direction::Low
        })
    }

    /// Replace the options with those provided.
    pub fn with_options(&mut self, options: Options) -> &mut Self {
        self.options = options;
        self
    }

    /// Set the edges that generate events.
    pub fn with_edge(&mut self, edge: Edge) -> &mut Self {
        self.options.with_edge(edge);
        self
    }

    /// Set the bias of the line.
    pub fn with_bias(&mut self, bias: Bias) -> &mut Self {
        self.options.with_bias(bias);
        self
    }

    /// Set the drive policy of an output line.
    pub fn with_drive(&mut self, drive: Drive) -> &mut Self {
        self.options.with_drive(drive);
        self
    }

    /// Set the line as active low.
    pub fn as_active_low(&mut self) -> &mut Self {
        self.options.as_active_low();
        self
    }

    /// Set the consumer label.
    pub fn with_label<N: Into<String>>(&mut self, label: N) -> &mut Self {
        self.options.with_label(label);
        self
    }

    /// Select the character device ABI rather than detecting it.
    pub fn using_abi_version(&mut self, abiv: AbiVersion) -> &mut Self {
        self.options.using_abi_version(abiv);
        self
    }

    /// Set the retry policy for the sysfs backend.
    pub fn with_retry(&mut self, retry: RetryPolicy) -> &mut Self {
        self.options.with_retry(retry);
        self
    }

    /// Set the root of the sysfs GPIO class.
    pub fn with_sysfs_root<P: Into<PathBuf>>(&mut self, root: P) -> &mut Self {
        self.options.with_sysfs_root(root);
        self
    }

    /// The options gathered so far.
    pub fn options(&self) -> &Options {
        &self.options
    }
}
