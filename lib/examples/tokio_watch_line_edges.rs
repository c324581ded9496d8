// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

// Example of asynchronously watching for edge events on a single line using tokio.

use anyhow::Context;
use gpioline::tokio::AsyncGpio;
use gpioline::{Bias, Edge, Gpio};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let line = AsyncGpio::new(
        Gpio::builder()
            .on_chip("/dev/gpiochip0")
            .with_label("tokio watcher")
            .with_line(22)
            .with_edge(Edge::Both)
            .with_bias(Bias::PullUp)
            .open()
            .context("Failed to open line")?,
    )?;
    loop {
        let event = line.read_event().await;
        println!("{:?}", event?);
    }
}
