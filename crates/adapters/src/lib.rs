// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters to the outside world: the cloud provider and the SSH transport.

pub mod cloud;
mod env;
pub mod subprocess;
pub mod transport;

pub use cloud::{
    classify, Advice, AwsCliAdapter, CloudAdapter, CloudError, CreateVm, FileFakeCloudAdapter,
    Progress, VmInfo, VmState,
};
pub use transport::{ExecOutput, SshTransport, Transport, TransportError};

#[cfg(any(test, feature = "test-support"))]
pub use cloud::{CloudCall, FakeCloudAdapter};
#[cfg(any(test, feature = "test-support"))]
pub use transport::{FakeTransport, TransportCall};
