// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pba-wire: JSON bodies exchanged with the control plane

mod envelope;
mod types;

pub use envelope::{Envelope, ErrorBody};
pub use types::{
    CertificateIssue, CompleteRequest, FailRequest, HeartbeatAck, HeartbeatRequest,
    ProgressReport, TaskPage, TaskStatus, UpdateCheck,
};
