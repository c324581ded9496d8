// SPDX-FileCopyrightText: 2023 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use gpioline_uapi::wait_fds;
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

// max time to wait for an event - expected or not
pub const EVENT_WAIT_TIMEOUT: Duration = Duration::from_millis(25);

// max time to allow events to propagate from the sim to cdev
const PROPAGATION_DELAY: Duration = Duration::from_millis(10);

pub fn wait_propagation_delay() {
    std::thread::sleep(PROPAGATION_DELAY);
}

// check if a request has an event waiting to be read
pub fn event_ready(f: &File, timeout: Duration) -> bool {
    let mut pfd = [libc::pollfd {
        fd: f.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    }];
    wait_fds(&mut pfd, Some(timeout)).unwrap() > 0
}
