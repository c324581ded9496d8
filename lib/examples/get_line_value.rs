// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

// Basic example of reading a single line.

use gpioline::{Bias, Gpio, GpioLine};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let offset = 22;
    // open the line as an input
    let line = Gpio::builder()
        .on_chip("/dev/gpiochip0")
        .with_label("get-line-value")
        .with_line(offset)
        .as_input()
        .with_bias(Bias::PullUp) // optionally set a pull-up or other attribute
        .open()?;

    let value = line.read()?;
    println!("{offset}={value}");

    Ok(())
}
