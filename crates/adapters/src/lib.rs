// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pba-adapters: Outside-world integrations: the control-plane HTTP
//! client, the subprocess engine, and archiver invocation.

pub mod api;
pub mod borg;
pub mod subprocess;

pub use api::{ApiClient, ApiError};
pub use subprocess::{ExecError, ExecResult, ExecSpec};
