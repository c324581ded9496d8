// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

// Basic example of watching for edge events on a single line.

use anyhow::Context;
use gpioline::{Edge, Gpio, GpioLine};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // open the line with edge detection to receive events
    let line = Gpio::builder()
        .on_chip("/dev/gpiochip0")
        .with_label("watch-line-value")
        .with_line(23)
        .with_edge(Edge::Both)
        .open()
        .context("Failed to open line")?;

    // then wait for events...
    loop {
        if let Some(event) = line.read_event(None)? {
            println!("{event:?}");
        }
    }
}
