// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::line::EdgeEvent;
use crate::{Error, Gpio, GpioLine, Operation, Result};
use futures::stream::{self, Stream};
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;

// The descriptor is captured when registered, as the line cannot be
// reconfigured while wrapped.
struct Registered {
    line: Gpio,
    fd: RawFd,
}

impl AsRawFd for Registered {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

/// Async wrapper around a [`Gpio`] for the tokio reactor.
///
/// The line must have edge detection enabled.
///
/// Only waiting for edges is async.  Other operations are available via
/// [`as_ref`](AsRef::as_ref), though reconfiguring the line requires
/// unwrapping it with [`into_inner`](AsyncGpio::into_inner).
pub struct AsyncGpio {
    inner: AsyncFd<Registered>,
    interest: Interest,
    path: PathBuf,
}

impl AsyncGpio {
    /// Create a Tokio wrapper for a line.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(line: Gpio) -> Result<Self> {
        let (fd, events) = line.wait_source(Operation::Poll)?;
        let path = line.path()?.to_path_buf();
        // sysfs signals edges as priority data, the character device as readable
        let interest = if events & libc::POLLPRI != 0 {
            Interest::PRIORITY
        } else {
            Interest::READABLE
        };
        let inner = AsyncFd::with_interest(Registered { line, fd }, interest)
            .map_err(|e| Error::io(Operation::Poll, &path, e))?;
        Ok(AsyncGpio {
            inner,
            interest,
            path,
        })
    }

    /// Async form of [`GpioLine::poll`].
    ///
    /// Waits until an edge event is available.
    pub async fn poll(&self) -> Result<()> {
        loop {
            let mut guard = self
                .inner
                .ready(self.interest)
                .await
                .map_err(|e| Error::io(Operation::Poll, &self.path, e))?;
            if self.as_ref().poll(Some(Duration::ZERO))? {
                return Ok(());
            }
            guard.clear_ready();
        }
    }

    /// Async form of [`GpioLine::read_event`].
    pub async fn read_event(&self) -> Result<EdgeEvent> {
        loop {
            let mut guard = self
                .inner
                .ready(self.interest)
                .await
                .map_err(|e| Error::io(Operation::ReadEvent, &self.path, e))?;
            if let Some(evt) = self.as_ref().read_event(Some(Duration::ZERO))? {
                return Ok(evt);
            }
            guard.clear_ready();
        }
    }

    /// A stream of the edge events on the line.
    ///
    /// The stream never ends, though it may return errors.
    pub fn edge_events(&self) -> impl Stream<Item = Result<EdgeEvent>> + '_ {
        stream::unfold(self, |line| async move { Some((line.read_event().await, line)) })
    }

    /// Remove the line from the reactor.
    pub fn into_inner(self) -> Gpio {
        self.inner.into_inner().line
    }
}

impl AsRef<Gpio> for AsyncGpio {
    fn as_ref(&self) -> &Gpio {
        &self.inner.get_ref().line
    }
}
