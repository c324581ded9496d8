// SPDX-FileCopyrightText: 2023 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![allow(dead_code)]

use gpioline::{Options, RetryPolicy};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

// max time to allow events to propagate from the sim to cdev
const PROPAGATION_DELAY: Duration = Duration::from_millis(10);

pub fn wait_propagation_delay() {
    std::thread::sleep(PROPAGATION_DELAY);
}

// how often the fake kernel checks the control files
const KERNEL_TICK: Duration = Duration::from_millis(2);

pub const CHIP_NAME: &str = "gpiochip0";
pub const CHIP_LABEL: &str = "fake-chip";

#[derive(Default)]
struct Log {
    exports: Vec<u32>,
    unexports: Vec<u32>,
}

/// A fake sysfs GPIO class in a temporary directory.
///
/// A worker thread stands in for the kernel, creating the line directory
/// when a line number is written to `export` and removing it when written
/// to `unexport`.
pub struct FakeSysfs {
    dir: tempfile::TempDir,
    log: Arc<Mutex<Log>>,
    stop: Arc<AtomicBool>,
    kernel: Option<JoinHandle<()>>,
}

impl FakeSysfs {
    pub fn new() -> FakeSysfs {
        let mut fs = FakeSysfs::without_kernel();
        let root = fs.root().to_path_buf();
        let log = fs.log.clone();
        let stop = fs.stop.clone();
        fs.kernel = Some(thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                for line in drain(&root.join("export")) {
                    create_line(&root, line);
                    log.lock().unwrap().exports.push(line);
                }
                for line in drain(&root.join("unexport")) {
                    _ = fs::remove_dir_all(line_dir(&root, line));
                    log.lock().unwrap().unexports.push(line);
                }
                thread::sleep(KERNEL_TICK);
            }
        }));
        fs
    }

    /// A fake with control files but nothing acting on them.
    pub fn without_kernel() -> FakeSysfs {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("export"), "").unwrap();
        fs::write(dir.path().join("unexport"), "").unwrap();
        let chip = dir.path().join(CHIP_NAME);
        fs::create_dir(&chip).unwrap();
        fs::write(chip.join("label"), format!("{CHIP_LABEL}\n")).unwrap();
        FakeSysfs {
            dir,
            log: Default::default(),
            stop: Arc::new(AtomicBool::new(false)),
            kernel: None,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Options directing lines to the fake, with a quick retry policy.
    pub fn options(&self) -> Options {
        let mut opts = Options::default();
        opts.with_sysfs_root(self.root())
            .with_retry(RetryPolicy::new(50, Duration::from_millis(5)));
        opts
    }

    /// Export a line as if by another process.
    pub fn pre_export(&self, line: u32) {
        create_line(self.root(), line);
    }

    pub fn line_dir(&self, line: u32) -> PathBuf {
        line_dir(self.root(), line)
    }

    pub fn exports(&self) -> Vec<u32> {
        self.log.lock().unwrap().exports.clone()
    }

    pub fn unexports(&self) -> Vec<u32> {
        self.log.lock().unwrap().unexports.clone()
    }

    /// The raw content of a control file.
    pub fn control(&self, name: &str) -> String {
        fs::read_to_string(self.root().join(name)).unwrap()
    }

    pub fn attr(&self, line: u32, attr: &str) -> String {
        fs::read_to_string(self.line_dir(line).join(attr))
            .unwrap()
            .trim()
            .to_string()
    }

    pub fn set_attr(&self, line: u32, attr: &str, value: &str) {
        fs::write(self.line_dir(line).join(attr), format!("{value}\n")).unwrap();
    }

    pub fn remove_attr(&self, line: u32, attr: &str) {
        fs::remove_file(self.line_dir(line).join(attr)).unwrap();
    }
}

impl Drop for FakeSysfs {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(k) = self.kernel.take() {
            _ = k.join();
        }
    }
}

fn line_dir(root: &Path, line: u32) -> PathBuf {
    root.join(format!("gpio{line}"))
}

// Take the line numbers written to a control file.
fn drain(path: &Path) -> Vec<u32> {
    let content = match fs::read_to_string(path) {
        Ok(c) if !c.is_empty() => c,
        _ => return Vec::new(),
    };
    _ = fs::write(path, "");
    content
        .split_whitespace()
        .filter_map(|s| s.parse().ok())
        .collect()
}

// Build the line directory aside and move it into place so it never
// appears partially populated.
fn create_line(root: &Path, line: u32) {
    let staging = root.join(format!(".gpio{line}"));
    fs::create_dir_all(&staging).unwrap();
    for (attr, value) in [
        ("direction", "in"),
        ("value", "0"),
        ("edge", "none"),
        ("active_low", "0"),
    ] {
        fs::write(staging.join(attr), format!("{value}\n")).unwrap();
    }
    std::os::unix::fs::symlink(root.join(CHIP_NAME), staging.join("device")).unwrap();
    fs::rename(&staging, line_dir(root, line)).unwrap();
}

pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions.
    unsafe { libc::geteuid() == 0 }
}
