// SPDX-FileCopyrightText: 2023 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

// Example of watching for edge events on a line via the legacy sysfs interface.

use anyhow::Context;
use gpioline::{Edge, Gpio, GpioLine, RetryPolicy};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // without a chip the line number is global and the line is exported via sysfs
    let line = Gpio::builder()
        .with_line(17)
        .with_edge(Edge::Rising)
        // allow udev a little longer to fix the permissions on the exported line
        .with_retry(RetryPolicy::new(20, Duration::from_millis(100)))
        .open()
        .context("Failed to export line")?;
    println!("{line}");

    loop {
        match line.read_event(Some(Duration::from_secs(5)))? {
            Some(event) => println!("{event:?}"),
            None => println!("waiting..."),
        }
    }
}
