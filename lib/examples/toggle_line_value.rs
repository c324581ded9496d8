// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

// Basic example of toggling a single line.

use anyhow::Context;
use gpioline::{Gpio, GpioLine};
use std::result::Result;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let offset = 22;
    let mut value = true;

    let line = Gpio::builder()
        .on_chip("/dev/gpiochip0")
        .with_label("toggle-line-value")
        .with_line(offset)
        .as_output(value)
        .open()
        .context("Failed to open line")?;

    loop {
        println!("{offset}={value}");
        thread::sleep(Duration::from_millis(500));
        value = !value;
        line.write(value).context("Failed to set value")?;
    }
}
