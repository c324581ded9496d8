// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{Error, GpioLine, Operation, Result};
use gpioline_uapi as uapi;
use libc::pollfd;
use log::warn;
use std::os::unix::io::RawFd;
use std::path::Path;
use std::time::{Duration, Instant};

/// Wait until at least one of the descriptors reports one of its requested
/// events, or the timeout expires.
///
/// Interrupted and spurious wakeups are waited out against the original
/// deadline, so the total wait never exceeds the timeout.
pub(crate) fn wait(fds: &mut [pollfd], timeout: Option<Duration>) -> uapi::Result<bool> {
    let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
    loop {
        let remaining = match (timeout, deadline) {
            (Some(_), Some(d)) => Some(d.saturating_duration_since(Instant::now())),
            // a timeout too large to represent is as good as forever
            _ => None,
        };
        for pfd in fds.iter_mut() {
            pfd.revents = 0;
        }
        match uapi::wait_fds(fds, remaining) {
            Ok(0) => return Ok(false),
            Ok(_) => {
                if fds.iter().any(|pfd| pfd.revents & libc::POLLNVAL != 0) {
                    return Err(uapi::Error::Os(uapi::Errno(libc::EBADF)));
                }
                if fds.iter().any(is_ready) {
                    return Ok(true);
                }
            }
            Err(e) if e.errno() == Some(libc::EINTR) => {}
            Err(e) => return Err(e),
        }
        if remaining == Some(Duration::ZERO) {
            return Ok(false);
        }
    }
}

/// Check if the descriptor reported a requested event, or a condition
/// that the next access will report as an error.
fn is_ready(pfd: &pollfd) -> bool {
    pfd.revents & (pfd.events | libc::POLLERR | libc::POLLHUP) != 0
}

/// Wait for a single descriptor.
pub(crate) fn wait_fd(fd: RawFd, events: i16, timeout: Option<Duration>) -> uapi::Result<bool> {
    let mut pfd = [pollfd {
        fd,
        events,
        revents: 0,
    }];
    wait(&mut pfd, timeout)
}

/// Wait for edge events on any of a set of lines.
///
/// The lines may be drawn from either backend, and all are waited on
/// together, so the wait is bounded by `timeout` however many lines are
/// provided.
///
/// * `timeout` - The maximum time to wait.  `None` waits indefinitely and
///   `Some(Duration::ZERO)` returns immediately.
///
/// Returns the lines with events pending, which is empty if the timeout
/// expired.
///
/// Every line must have edge detection enabled.
///
/// Every ready line is acknowledged before returning, and if any of those
/// fail the first failure is returned.
///
/// ```no_run
/// # use gpioline::Result;
/// use gpioline::{poll_multiple, Edge, Gpio};
/// use std::time::Duration;
///
/// # fn main() -> Result<()> {
/// let button = Gpio::builder()
///     .on_chip("/dev/gpiochip0")
///     .with_line(5)
///     .with_edge(Edge::Both)
///     .open()?;
/// let door = Gpio::builder()
///     .with_line(42)
///     .with_edge(Edge::Rising)
///     .open()?;
/// for line in poll_multiple(&[&button, &door], Some(Duration::from_secs(5)))? {
///     println!("{line}");
/// }
/// # Ok(())
/// # }
/// ```
pub fn poll_multiple<'a, L>(lines: &[&'a L], timeout: Option<Duration>) -> Result<Vec<&'a L>>
where
    L: GpioLine + ?Sized,
{
    let mut pfds = Vec::with_capacity(lines.len());
    for line in lines {
        let (fd, events) = line.wait_source(Operation::Poll)?;
        pfds.push(pollfd {
            fd,
            events,
            revents: 0,
        });
    }
    if !wait(&mut pfds, timeout).map_err(|e| Error::io(Operation::Poll, Path::new(""), e))? {
        return Ok(Vec::new());
    }
    let ready: Vec<&'a L> = lines
        .iter()
        .zip(pfds.iter())
        .filter(|(_, pfd)| is_ready(pfd))
        .map(|(line, _)| *line)
        .collect();
    let mut res = Ok(());
    for line in &ready {
        if let Err(e) = line.acknowledge() {
            if res.is_ok() {
                res = Err(e);
            } else {
                warn!("acknowledging {line}: {e}");
            }
        }
    }
    res.map(|_| ready)
}
