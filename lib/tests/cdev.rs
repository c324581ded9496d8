// SPDX-FileCopyrightText: 2023 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

mod common;

use gpioline::{
    AbiVersion, Bias, CdevGpio, Direction, Drive, Edge, EdgeKind, Error, Gpio, GpioLine,
    Operation, Options, DEFAULT_LABEL,
};
use gpiosim::{Level, Simpleton};
use std::time::{Duration, Instant};

fn input(s: &Simpleton, offset: u32) -> CdevGpio {
    CdevGpio::open(s.dev_path(), offset, Direction::In, &Options::default()).unwrap()
}

fn edges(s: &Simpleton, offset: u32, edge: Edge) -> CdevGpio {
    let mut opts = Options::default();
    opts.with_edge(edge);
    CdevGpio::open(s.dev_path(), offset, Direction::In, &opts).unwrap()
}

mod open {
    use super::*;

    #[test]
    fn by_offset() {
        let s = Simpleton::new(4);
        let l = input(&s, 2);
        assert_eq!(l.line().unwrap(), 2);
        assert_eq!(l.path().unwrap(), s.dev_path().as_path());
        assert_eq!(l.direction().unwrap(), Direction::In);
        assert_eq!(l.edge().unwrap(), Edge::None);
        assert_eq!(l.bias().unwrap(), Bias::Default);
        assert_eq!(l.drive().unwrap(), Drive::Default);
        assert!(!l.inverted().unwrap());
        assert_eq!(l.label().unwrap(), DEFAULT_LABEL);
        assert!(!l.is_closed());
    }

    #[test]
    fn by_name() {
        let sim = gpiosim::builder()
            .with_bank(
                gpiosim::Bank::new(8, "left")
                    .name(3, "banana")
                    .name(5, "apple"),
            )
            .live()
            .unwrap();
        let sc = &sim.chips()[0];
        let l = CdevGpio::open(sc.dev_path(), "apple", Direction::In, &Options::default())
            .unwrap();
        assert_eq!(l.line().unwrap(), 5);
        assert_eq!(l.name().unwrap(), "apple");
        assert_eq!(l.chip_name().unwrap(), sc.chip_name);
        assert_eq!(l.chip_label().unwrap(), "left");

        let res = CdevGpio::open(sc.dev_path(), "kiwi", Direction::In, &Options::default());
        assert!(matches!(res, Err(Error::LineNotFound(_))));
    }

    #[test]
    fn offset_out_of_range() {
        let s = Simpleton::new(4);
        let res = CdevGpio::open(s.dev_path(), 4, Direction::In, &Options::default());
        assert!(matches!(res, Err(Error::LineNotFound(_))));
    }

    #[test]
    fn not_a_chip() {
        let res = CdevGpio::open("/dev/null", 0, Direction::In, &Options::default());
        assert!(matches!(
            res,
            Err(Error::Unsupported {
                op: Operation::Open,
                ..
            })
        ));
    }

    #[test]
    fn missing_chip() {
        let res = CdevGpio::open("/dev/gpiochip_nonexistent", 0, Direction::In, &Options::default());
        assert_eq!(res.unwrap_err().errno(), Some(libc::ENOENT));
    }

    #[test]
    fn busy() {
        let s = Simpleton::new(4);
        let _l = input(&s, 1);
        let res = CdevGpio::open(s.dev_path(), 1, Direction::In, &Options::default());
        assert_eq!(res.unwrap_err().errno(), Some(libc::EBUSY));
    }

    #[test]
    fn released_on_drop() {
        let s = Simpleton::new(4);
        drop(input(&s, 1));
        let l = input(&s, 1);
        assert_eq!(l.line().unwrap(), 1);
    }

    #[test]
    fn with_label() {
        let s = Simpleton::new(4);
        let mut opts = Options::default();
        opts.with_label("doorbell");
        let l = CdevGpio::open(s.dev_path(), 0, Direction::In, &opts).unwrap();
        assert_eq!(l.label().unwrap(), "doorbell");
    }

    #[test]
    fn output_high() {
        let s = Simpleton::new(4);
        let l = CdevGpio::open(s.dev_path(), 3, Direction::High, &Options::default()).unwrap();
        assert_eq!(s.get_level(3).unwrap(), Level::High);
        assert_eq!(l.direction().unwrap(), Direction::Out);
        assert!(l.read().unwrap());
    }

    #[test]
    fn output_low_inverted() {
        let s = Simpleton::new(4);
        let mut opts = Options::default();
        opts.as_active_low();
        let l = CdevGpio::open(s.dev_path(), 3, Direction::Low, &opts).unwrap();
        // low is the physical level, so the line is active
        assert_eq!(s.get_level(3).unwrap(), Level::Low);
        assert!(l.read().unwrap());
    }

    #[test]
    fn output_high_inverted() {
        let s = Simpleton::new(4);
        let mut opts = Options::default();
        opts.as_active_low();
        let l = CdevGpio::open(s.dev_path(), 1, Direction::High, &opts).unwrap();
        assert_eq!(s.get_level(1).unwrap(), Level::High);
        assert!(!l.read().unwrap());
    }

    #[test]
    fn detects_abi_version() {
        let s = Simpleton::new(4);
        let l = input(&s, 0);
        // any kernel with gpio-sim provides v2
        assert_eq!(l.abi_version(), AbiVersion::V2);
    }

    #[test]
    fn rejects_edge_on_output() {
        let s = Simpleton::new(4);
        let mut opts = Options::default();
        opts.with_edge(Edge::Both);
        let res = CdevGpio::open(s.dev_path(), 0, Direction::Out, &opts);
        assert!(matches!(res, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn rejects_drive_on_input() {
        let s = Simpleton::new(4);
        let mut opts = Options::default();
        opts.with_drive(Drive::OpenDrain);
        let res = CdevGpio::open(s.dev_path(), 0, Direction::In, &opts);
        assert!(matches!(res, Err(Error::InvalidArgument(_))));
    }
}

mod values {
    use super::*;

    #[test]
    fn read() {
        let s = Simpleton::new(4);
        let l = input(&s, 1);
        s.pullup(1).unwrap();
        common::wait_propagation_delay();
        assert!(l.read().unwrap());
        s.pulldown(1).unwrap();
        common::wait_propagation_delay();
        assert!(!l.read().unwrap());
    }

    #[test]
    fn read_inverted() {
        let s = Simpleton::new(4);
        let mut opts = Options::default();
        opts.as_active_low();
        let l = CdevGpio::open(s.dev_path(), 1, Direction::In, &opts).unwrap();
        s.pullup(1).unwrap();
        common::wait_propagation_delay();
        assert!(!l.read().unwrap());
    }

    #[test]
    fn write() {
        let s = Simpleton::new(4);
        let l = CdevGpio::open(s.dev_path(), 2, Direction::Out, &Options::default()).unwrap();
        assert_eq!(s.get_level(2).unwrap(), Level::Low);
        l.write(true).unwrap();
        assert_eq!(s.get_level(2).unwrap(), Level::High);
        assert!(l.read().unwrap());
        l.write(false).unwrap();
        assert_eq!(s.get_level(2).unwrap(), Level::Low);
    }

    #[test]
    fn write_to_input() {
        let s = Simpleton::new(4);
        let l = input(&s, 2);
        assert!(matches!(
            l.write(true),
            Err(Error::Unsupported {
                op: Operation::Write,
                ..
            })
        ));
    }

    #[test]
    fn loopback() {
        // an output wired to an input, with the sim standing in for the wire
        let s = Simpleton::new(16);
        let out = CdevGpio::open(s.dev_path(), 12, Direction::Out, &Options::default()).unwrap();
        let inp = input(&s, 10);
        for v in [true, false, true] {
            out.write(v).unwrap();
            s.set_pull(10, s.get_level(12).unwrap()).unwrap();
            common::wait_propagation_delay();
            assert_eq!(inp.read().unwrap(), v);
        }
    }
}

mod events {
    use super::*;

    #[test]
    fn rising() {
        let s = Simpleton::new(4);
        let l = edges(&s, 1, Edge::Rising);
        s.pullup(1).unwrap();
        let evt = l
            .read_event(Some(Duration::from_millis(500)))
            .unwrap()
            .unwrap();
        assert_eq!(evt.kind, EdgeKind::Rising);
        assert_ne!(evt.timestamp_ns, 0);

        // falling edges are not reported
        s.pulldown(1).unwrap();
        common::wait_propagation_delay();
        assert_eq!(l.read_event(Some(Duration::ZERO)).unwrap(), None);
    }

    #[test]
    fn both() {
        let s = Simpleton::new(4);
        let l = edges(&s, 2, Edge::Both);
        s.pullup(2).unwrap();
        common::wait_propagation_delay();
        s.pulldown(2).unwrap();
        let timeout = Some(Duration::from_millis(500));
        let e1 = l.read_event(timeout).unwrap().unwrap();
        let e2 = l.read_event(timeout).unwrap().unwrap();
        assert_eq!(e1.kind, EdgeKind::Rising);
        assert_eq!(e2.kind, EdgeKind::Falling);
        assert!(e2.timestamp_ns > e1.timestamp_ns);
    }

    #[test]
    fn idle_times_out() {
        let s = Simpleton::new(4);
        let l = edges(&s, 1, Edge::Rising);
        let start = Instant::now();
        assert_eq!(l.read_event(Some(Duration::from_millis(200))).unwrap(), None);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(400));
    }

    #[test]
    fn poll() {
        let s = Simpleton::new(4);
        let l = edges(&s, 1, Edge::Falling);

        let start = Instant::now();
        assert!(!l.poll(Some(Duration::ZERO)).unwrap());
        assert!(start.elapsed() < Duration::from_millis(50));

        s.pullup(1).unwrap();
        s.pulldown(1).unwrap();
        assert!(l.poll(Some(Duration::from_millis(500))).unwrap());
        // poll leaves the event for read_event
        let evt = l.read_event(Some(Duration::ZERO)).unwrap().unwrap();
        assert_eq!(evt.kind, EdgeKind::Falling);
    }

    #[test]
    fn without_edge_detection() {
        let s = Simpleton::new(4);
        let l = input(&s, 1);
        assert!(matches!(
            l.poll(Some(Duration::ZERO)),
            Err(Error::Unsupported {
                op: Operation::Poll,
                ..
            })
        ));
        assert!(matches!(
            l.read_event(Some(Duration::ZERO)),
            Err(Error::Unsupported {
                op: Operation::ReadEvent,
                ..
            })
        ));
    }
}

mod reconfigure {
    use super::*;

    #[test]
    fn direction() {
        let s = Simpleton::new(4);
        let mut l = edges(&s, 1, Edge::Both);

        l.set_direction(Direction::High).unwrap();
        assert_eq!(l.direction().unwrap(), Direction::Out);
        assert_eq!(l.edge().unwrap(), Edge::None);
        assert_eq!(s.get_level(1).unwrap(), Level::High);

        l.set_direction(Direction::Low).unwrap();
        assert_eq!(s.get_level(1).unwrap(), Level::Low);

        l.set_direction(Direction::In).unwrap();
        assert_eq!(l.direction().unwrap(), Direction::In);
        s.pullup(1).unwrap();
        common::wait_propagation_delay();
        assert!(l.read().unwrap());
    }

    #[test]
    fn direction_inverted() {
        let s = Simpleton::new(4);
        let mut opts = Options::default();
        opts.as_active_low();
        let mut l = CdevGpio::open(s.dev_path(), 1, Direction::In, &opts).unwrap();

        // high and low are physical levels, from input or output
        l.set_direction(Direction::High).unwrap();
        assert_eq!(s.get_level(1).unwrap(), Level::High);
        assert!(!l.read().unwrap());
        l.set_direction(Direction::Low).unwrap();
        assert_eq!(s.get_level(1).unwrap(), Level::Low);
        assert!(l.read().unwrap());
        l.set_direction(Direction::Out).unwrap();
        assert_eq!(s.get_level(1).unwrap(), Level::Low);
    }

    #[test]
    fn edge() {
        let s = Simpleton::new(4);
        let mut l = input(&s, 1);
        l.set_edge(Edge::Rising).unwrap();
        assert_eq!(l.edge().unwrap(), Edge::Rising);
        s.pullup(1).unwrap();
        let evt = l
            .read_event(Some(Duration::from_millis(500)))
            .unwrap()
            .unwrap();
        assert_eq!(evt.kind, EdgeKind::Rising);

        let mut o = CdevGpio::open(s.dev_path(), 2, Direction::Out, &Options::default()).unwrap();
        assert!(matches!(o.set_edge(Edge::Both), Err(Error::InvalidArgument(_))));
        assert_eq!(o.edge().unwrap(), Edge::None);
    }

    #[test]
    fn bias() {
        let s = Simpleton::new(4);
        let mut l = input(&s, 3);
        assert!(!l.read().unwrap());
        l.set_bias(Bias::PullUp).unwrap();
        assert_eq!(l.bias().unwrap(), Bias::PullUp);
        common::wait_propagation_delay();
        assert!(l.read().unwrap());
        l.set_bias(Bias::PullDown).unwrap();
        common::wait_propagation_delay();
        assert!(!l.read().unwrap());
    }

    #[test]
    fn drive() {
        let s = Simpleton::new(4);
        let mut i = input(&s, 0);
        assert!(matches!(
            i.set_drive(Drive::OpenSource),
            Err(Error::InvalidArgument(_))
        ));

        let mut l = CdevGpio::open(s.dev_path(), 1, Direction::High, &Options::default()).unwrap();
        l.set_drive(Drive::OpenSource).unwrap();
        assert_eq!(l.drive().unwrap(), Drive::OpenSource);
        assert_eq!(s.get_level(1).unwrap(), Level::High);
    }

    #[test]
    fn retains_output_value() {
        let s = Simpleton::new(4);
        let mut l = CdevGpio::open(s.dev_path(), 2, Direction::High, &Options::default()).unwrap();
        l.set_bias(Bias::PullDown).unwrap();
        assert_eq!(s.get_level(2).unwrap(), Level::High);
        assert!(l.read().unwrap());
    }

    #[test]
    fn inverted_retains_level() {
        let s = Simpleton::new(4);
        let mut l = CdevGpio::open(s.dev_path(), 2, Direction::High, &Options::default()).unwrap();
        l.set_inverted(true).unwrap();
        assert!(l.inverted().unwrap());
        assert_eq!(s.get_level(2).unwrap(), Level::High);
        assert!(!l.read().unwrap());
        l.write(true).unwrap();
        assert_eq!(s.get_level(2).unwrap(), Level::Low);
    }

    #[test]
    fn retains_label() {
        let s = Simpleton::new(4);
        let mut opts = Options::default();
        opts.with_label("relay");
        let mut l = CdevGpio::open(s.dev_path(), 2, Direction::In, &opts).unwrap();
        l.set_bias(Bias::PullUp).unwrap();
        assert_eq!(l.label().unwrap(), "relay");
    }
}

mod abi_v1 {
    use super::*;

    fn v1_options() -> Options {
        let mut opts = Options::default();
        opts.using_abi_version(AbiVersion::V1);
        opts
    }

    #[test]
    fn input() {
        let s = Simpleton::new(4);
        let l = CdevGpio::open(s.dev_path(), 2, Direction::In, &v1_options()).unwrap();
        assert_eq!(l.abi_version(), AbiVersion::V1);
        assert_eq!(l.label().unwrap(), DEFAULT_LABEL);
        assert!(!l.read().unwrap());
        s.pullup(2).unwrap();
        common::wait_propagation_delay();
        assert!(l.read().unwrap());
    }

    #[test]
    fn output() {
        let s = Simpleton::new(4);
        let mut opts = v1_options();
        opts.as_active_low();
        let l = CdevGpio::open(s.dev_path(), 3, Direction::High, &opts).unwrap();
        assert_eq!(s.get_level(3).unwrap(), Level::High);
        assert!(!l.read().unwrap());
        l.write(true).unwrap();
        assert_eq!(s.get_level(3).unwrap(), Level::Low);
    }

    #[test]
    fn by_name() {
        let sim = gpiosim::builder()
            .with_bank(gpiosim::Bank::new(8, "left").name(6, "LED1"))
            .live()
            .unwrap();
        let chip = &sim.chips()[0];
        let l = CdevGpio::open(chip.dev_path(), "LED1", Direction::In, &v1_options()).unwrap();
        assert_eq!(l.line().unwrap(), 6);
        assert_eq!(l.name().unwrap(), "LED1");
    }

    #[test]
    fn edges() {
        let s = Simpleton::new(4);
        let mut opts = v1_options();
        opts.with_edge(Edge::Both);
        let l = CdevGpio::open(s.dev_path(), 1, Direction::In, &opts).unwrap();
        assert!(l
            .read_event(Some(Duration::from_millis(20)))
            .unwrap()
            .is_none());

        s.pullup(1).unwrap();
        common::wait_propagation_delay();
        s.pulldown(1).unwrap();
        common::wait_propagation_delay();
        // queued events are returned one at a time
        let evt = l.read_event(Some(Duration::ZERO)).unwrap().unwrap();
        assert_eq!(evt.kind, EdgeKind::Rising);
        let evt2 = l.read_event(Some(Duration::ZERO)).unwrap().unwrap();
        assert_eq!(evt2.kind, EdgeKind::Falling);
        assert!(evt2.timestamp_ns > evt.timestamp_ns);
        assert!(!l.read().unwrap());
    }

    #[test]
    fn reconfigure() {
        let s = Simpleton::new(4);
        let mut l = CdevGpio::open(s.dev_path(), 0, Direction::In, &v1_options()).unwrap();
        l.set_edge(Edge::Rising).unwrap();
        s.pullup(0).unwrap();
        let evt = l
            .read_event(Some(Duration::from_millis(500)))
            .unwrap()
            .unwrap();
        assert_eq!(evt.kind, EdgeKind::Rising);

        l.set_direction(Direction::High).unwrap();
        assert_eq!(l.edge().unwrap(), Edge::None);
        l.set_bias(Bias::PullDown).unwrap();
        assert_eq!(s.get_level(0).unwrap(), Level::High);
        l.set_inverted(true).unwrap();
        assert_eq!(s.get_level(0).unwrap(), Level::High);
        assert!(!l.read().unwrap());
    }
}

mod close {
    use super::*;

    #[test]
    fn twice() {
        let s = Simpleton::new(4);
        let mut l = input(&s, 1);
        l.close().unwrap();
        assert!(l.is_closed());
        l.close().unwrap();
        assert!(l.is_closed());
        // released for others
        let _l2 = input(&s, 1);
    }

    #[test]
    fn rejects_operations() {
        let s = Simpleton::new(4);
        let mut l = edges(&s, 1, Edge::Rising);
        l.close().unwrap();

        assert_eq!(l.read(), Err(Error::Closed(Operation::Read)));
        assert_eq!(l.write(true), Err(Error::Closed(Operation::Write)));
        assert_eq!(
            l.poll(Some(Duration::ZERO)),
            Err(Error::Closed(Operation::Poll))
        );
        assert_eq!(
            l.read_event(Some(Duration::ZERO)),
            Err(Error::Closed(Operation::ReadEvent))
        );
        assert_eq!(l.direction(), Err(Error::Closed(Operation::Direction)));
        assert_eq!(
            l.set_direction(Direction::Out),
            Err(Error::Closed(Operation::SetDirection))
        );
        assert_eq!(l.edge(), Err(Error::Closed(Operation::Edge)));
        assert_eq!(
            l.set_edge(Edge::None),
            Err(Error::Closed(Operation::SetEdge))
        );
        assert_eq!(l.bias(), Err(Error::Closed(Operation::Bias)));
        assert_eq!(
            l.set_bias(Bias::PullUp),
            Err(Error::Closed(Operation::SetBias))
        );
        assert_eq!(l.drive(), Err(Error::Closed(Operation::Drive)));
        assert_eq!(
            l.set_drive(Drive::Default),
            Err(Error::Closed(Operation::SetDrive))
        );
        assert_eq!(l.inverted(), Err(Error::Closed(Operation::Inverted)));
        assert_eq!(
            l.set_inverted(true),
            Err(Error::Closed(Operation::SetInverted))
        );
        assert_eq!(l.fd(), Err(Error::Closed(Operation::Fd)));
        assert_eq!(l.line(), Err(Error::Closed(Operation::Line)));
        assert!(matches!(l.path(), Err(Error::Closed(Operation::Path))));
        assert_eq!(l.name(), Err(Error::Closed(Operation::Name)));
        assert_eq!(l.label(), Err(Error::Closed(Operation::Label)));
        assert_eq!(l.chip_name(), Err(Error::Closed(Operation::ChipName)));
        assert_eq!(l.chip_label(), Err(Error::Closed(Operation::ChipLabel)));
    }
}

mod facade {
    use super::*;

    #[test]
    fn dispatches_to_cdev() {
        let s = Simpleton::new(4);
        let mut l = Gpio::open(
            Some(s.dev_path().as_path()),
            2,
            Direction::Out,
            &Options::default(),
        )
        .unwrap();
        l.write(true).unwrap();
        assert_eq!(s.get_level(2).unwrap(), Level::High);
        assert!(l.to_string().contains("type=cdev"));
        l.close().unwrap();
        assert!(l.is_closed());
    }

    #[test]
    fn builder() {
        let s = Simpleton::new(4);
        let l = Gpio::builder()
            .on_chip(s.dev_path())
            .with_line(1)
            .as_input()
            .with_edge(Edge::Both)
            .with_bias(Bias::PullUp)
            .with_label("button")
            .open()
            .unwrap();
        assert_eq!(l.edge().unwrap(), Edge::Both);
        assert_eq!(l.bias().unwrap(), Bias::PullUp);
        assert_eq!(l.label().unwrap(), "button");
        common::wait_propagation_delay();
        assert!(l.read().unwrap());
    }

    #[test]
    fn display() {
        let s = Simpleton::new(4);
        let mut l = input(&s, 3);
        let text = l.to_string();
        assert!(text.starts_with("GPIO 3 "));
        assert!(text.contains("direction=in"));
        assert!(text.contains("type=cdev"));
        l.close().unwrap();
        // properties of a closed line are placeholders
        assert!(l.to_string().contains("direction=<error>"));
    }
}
