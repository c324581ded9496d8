// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{Error, Operation, Result};
use log::debug;
#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::thread;
use std::time::Duration;

/// The bounds on retrying sysfs accesses that fail with permission denied.
///
/// After a line is exported the udev rules that grant userspace access to the
/// line's attribute files are applied asynchronously, so accesses made
/// immediately after an export may be denied for a short period.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RetryPolicy {
    /// The maximum number of attempts, including the first.
    ///
    /// Zero is treated as one.
    pub attempts: u32,

    /// The delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 10,
            delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given bounds.
    pub fn new(attempts: u32, delay: Duration) -> Self {
        RetryPolicy { attempts, delay }
    }

    /// A policy that makes a single attempt.
    pub fn once() -> Self {
        RetryPolicy {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// The number of attempts to make.
    pub(crate) fn budget(&self) -> u32 {
        self.attempts.max(1)
    }

    /// The maximum time spent sleeping between attempts.
    pub fn span(&self) -> Duration {
        self.delay * (self.budget() - 1)
    }
}

/// Call `f` until it succeeds, fails with something other than EACCES, or
/// the budget is exhausted.
pub(crate) fn with_retry<T, F>(policy: &RetryPolicy, op: Operation, path: &Path, mut f: F) -> Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    let budget = policy.budget();
    let mut attempt = 1;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) if e.raw_os_error() == Some(libc::EACCES) => {
                if attempt >= budget {
                    return Err(Error::PermissionDenied {
                        op,
                        path: path.to_path_buf(),
                        attempts: budget,
                    });
                }
                debug!("{op} {path:?} denied, attempt {attempt} of {budget}");
                thread::sleep(policy.delay);
                attempt += 1;
            }
            Err(e) => return Err(Error::io(op, path, e)),
        }
    }
}
