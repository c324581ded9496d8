// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

/// Wrappers around the Tokio reactor.
#[cfg(feature = "async_tokio")]
pub mod tokio;
