// SPDX-FileCopyrightText: 2023 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

// Basic example of watching for edge events on multiple lines.

use anyhow::Context;
use gpioline::{poll_multiple, Edge, Gpio, GpioLine};
use std::result::Result;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let offsets = [23, 12];

    let lines = offsets
        .iter()
        .map(|&offset| {
            Gpio::builder()
                .on_chip("/dev/gpiochip0")
                .with_label("watch-multiple-lines")
                .with_line(offset)
                .with_edge(Edge::Both)
                .open()
                .context("Failed to open line")
        })
        .collect::<Result<Vec<_>, _>>()?;
    let refs: Vec<&Gpio> = lines.iter().collect();

    loop {
        for line in poll_multiple(&refs, Some(Duration::from_secs(1)))? {
            if let Some(event) = line.read_event(Some(Duration::ZERO))? {
                println!("{}: {event:?}", line.line()?);
            }
        }
    }
}
