// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{Bias, Direction, Drive, Edge};
use crate::{AbiVersion, Error, Result, RetryPolicy};
use gpioline_uapi::sysfs;
#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use std::path::PathBuf;

/// The consumer label applied to lines unless another is provided.
pub const DEFAULT_LABEL: &str = "gpioline";

/// The configuration applied to a line when it is opened.
///
/// Options are built up using the chained mutators:
/// ```
/// use gpioline::{Bias, Edge, Options};
///
/// let mut opts = Options::default();
/// opts.with_edge(Edge::Both)
///     .with_bias(Bias::PullUp)
///     .with_label("doorbell");
/// assert_eq!(opts.label, "doorbell");
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Options {
    /// The edges that generate events.
    pub edge: Edge,

    /// The bias applied to the line.
    pub bias: Bias,

    /// The drive policy of an output line.
    pub drive: Drive,

    /// Whether the line is active low.
    pub inverted: bool,

    /// The consumer label reported by the character device.
    pub label: String,

    /// The character device ABI to use, or None to use the newest the
    /// kernel provides.
    pub abi_version: Option<AbiVersion>,

    /// The retry policy masking the sysfs export permission race.
    pub retry: RetryPolicy,

    /// The root of the sysfs GPIO class.
    pub sysfs_root: PathBuf,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            edge: Edge::default(),
            bias: Bias::default(),
            drive: Drive::default(),
            inverted: false,
            label: DEFAULT_LABEL.to_string(),
            abi_version: None,
            retry: RetryPolicy::default(),
            sysfs_root: PathBuf::from(sysfs::ROOT),
        }
    }
}

impl Options {
    /// Set the edges that generate events.
    pub fn with_edge(&mut self, edge: Edge) -> &mut Self {
        self.edge = edge;
        self
    }

    /// Set the bias of the line.
    pub fn with_bias(&mut self, bias: Bias) -> &mut Self {
        self.bias = bias;
        self
    }

    /// Set the drive policy of an output line.
    pub fn with_drive(&mut self, drive: Drive) -> &mut Self {
        self.drive = drive;
        self
    }

    /// Set the line as active low.
    pub fn as_active_low(&mut self) -> &mut Self {
        self.inverted = true;
        self
    }

    /// Set the line as active high.
    pub fn as_active_high(&mut self) -> &mut Self {
        self.inverted = false;
        self
    }

    /// Set the consumer label.
    ///
    /// Labels longer than 31 bytes are truncated by the kernel ABI.
    pub fn with_label<N: Into<String>>(&mut self, label: N) -> &mut Self {
        self.label = label.into();
        self
    }

    /// Select the character device ABI rather than detecting it.
    pub fn using_abi_version(&mut self, abiv: AbiVersion) -> &mut Self {
        self.abi_version = Some(abiv);
        self
    }

    /// Set the retry policy for the sysfs backend.
    pub fn with_retry(&mut self, retry: RetryPolicy) -> &mut Self {
        self.retry = retry;
        self
    }

    /// Set the root of the sysfs GPIO class.
    pub fn with_sysfs_root<P: Into<PathBuf>>(&mut self, root: P) -> &mut Self {
        self.sysfs_root = root.into();
        self
    }

    /// Check the options are consistent with the direction of the line.
    pub(crate) fn validate(&self, direction: Direction) -> Result<()> {
        if direction.is_output() && self.edge != Edge::None {
            return Err(Error::InvalidArgument(
                "edge detection is only available on inputs".to_string(),
            ));
        }
        if !direction.is_output() && self.drive != Drive::Default {
            return Err(Error::InvalidArgument(
                "drive is only available on outputs".to_string(),
            ));
        }
        Ok(())
    }

    /// Check the options are limited to what the sysfs interface can provide.
    pub(crate) fn validate_sysfs(&self) -> Result<()> {
        if self.bias != Bias::Default {
            return Err(Error::InvalidArgument(
                "bias is not available via sysfs".to_string(),
            ));
        }
        if self.drive != Drive::Default {
            return Err(Error::InvalidArgument(
                "drive is not available via sysfs".to_string(),
            ));
        }
        if self.label != DEFAULT_LABEL {
            return Err(Error::InvalidArgument(
                "label is not available via sysfs".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default() {
        let o = Options::default();
        assert_eq!(o.edge, Edge::None);
        assert_eq!(o.bias, Bias::Default);
        assert_eq!(o.drive, Drive::Default);
        assert!(!o.inverted);
        assert_eq!(o.label, "gpioline");
        assert_eq!(o.abi_version, None);
        assert_eq!(o.retry, RetryPolicy::default());
        assert_eq!(o.sysfs_root, PathBuf::from("/sys/class/gpio"));
    }

    #[test]
    fn mutators() {
        let mut o = Options::default();
        o.with_edge(Edge::Rising)
            .with_bias(Bias::PullDown)
            .with_drive(Drive::OpenDrain)
            .as_active_low()
            .with_label("relay")
            .using_abi_version(AbiVersion::V1)
            .with_retry(RetryPolicy::new(3, Duration::from_millis(5)))
            .with_sysfs_root("/tmp/gpio");
        assert_eq!(o.edge, Edge::Rising);
        assert_eq!(o.bias, Bias::PullDown);
        assert_eq!(o.drive, Drive::OpenDrain);
        assert!(o.inverted);
        assert_eq!(o.label, "relay");
        assert_eq!(o.abi_version, Some(AbiVersion::V1));
        assert_eq!(o.retry.attempts, 3);
        assert_eq!(o.sysfs_root, PathBuf::from("/tmp/gpio"));
        o.as_active_high();
        assert!(!o.inverted);
    }

    #[test]
    fn validate() {
        let mut o = Options::default();
        assert!(o.validate(Direction::In).is_ok());
        assert!(o.validate(Direction::High).is_ok());

        o.with_edge(Edge::Both);
        assert!(o.validate(Direction::In).is_ok());
        assert!(matches!(
            o.validate(Direction::Out),
            Err(Error::InvalidArgument(_))
        ));

        o.with_edge(Edge::None).with_drive(Drive::OpenSource);
        assert!(o.validate(Direction::Low).is_ok());
        assert!(matches!(
            o.validate(Direction::In),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn validate_sysfs() {
        let mut o = Options::default();
        o.with_edge(Edge::Falling).as_active_low();
        assert!(o.validate_sysfs().is_ok());

        let mut o = Options::default();
        o.with_bias(Bias::PullUp);
        assert!(matches!(
            o.validate_sysfs(),
            Err(Error::InvalidArgument(_))
        ));

        let mut o = Options::default();
        o.with_drive(Drive::OpenDrain);
        assert!(o.validate_sysfs().is_err());

        let mut o = Options::default();
        o.with_label("mine");
        assert!(o.validate_sysfs().is_err());
    }
}
