// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cloud error classification.
//!
//! Maps raw provider error text onto a short explanation and a suggested
//! fix. Unrecognized errors return `None` and the caller surfaces the raw
//! text unchanged.

/// A user-facing explanation of a known cloud failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advice {
    pub message: String,
    pub fix: String,
}

impl Advice {
    fn new(message: &str, fix: &str) -> Self {
        Self {
            message: message.to_string(),
            fix: fix.to_string(),
        }
    }
}

/// Classify raw cloud error text.
pub fn classify(raw: &str) -> Option<Advice> {
    let rule = RULES
        .iter()
        .find(|(needles, _, _)| needles.iter().any(|n| raw.contains(n)))?;
    Some(Advice::new(rule.1, rule.2))
}

/// Substring needles, message, fix. Ordered most-specific first: expiry is
/// matched before the generic credential patterns.
const RULES: &[(&[&str], &str, &str)] = &[
    (
        &["ExpiredToken", "RequestExpired", "token included in the request is expired"],
        "your cloud credentials have expired",
        "refresh your session (e.g. `aws sso login`) and retry",
    ),
    (
        &["Unable to locate credentials", "NoCredentialProviders", "no valid credential sources"],
        "no cloud credentials were found",
        "run `aws configure` or set AWS_PROFILE, then retry",
    ),
    (
        &["InvalidClientTokenId", "AuthFailure", "SignatureDoesNotMatch"],
        "your cloud credentials were rejected",
        "check AWS_PROFILE / access keys with `aws sts get-caller-identity`",
    ),
    (
        &["UnauthorizedOperation", "AccessDenied", "is not authorized to perform"],
        "your cloud user lacks permission for this operation",
        "ask your administrator for EC2 and S3 access in this account",
    ),
    (
        &["InsufficientInstanceCapacity"],
        "the cloud region is out of capacity for this instance type",
        "retry shortly, or pick a different size in yeager.toml",
    ),
    (
        &["RequestLimitExceeded", "Throttling", "TooManyRequestsException"],
        "the cloud API is throttling requests",
        "wait a moment and retry",
    ),
    (
        &["InstanceLimitExceeded", "VcpuLimitExceeded", "LimitExceeded"],
        "your account hit an instance quota",
        "request a quota increase or terminate unused instances",
    ),
    (
        &[
            "Could not connect to the endpoint URL",
            "Network is unreachable",
            "Temporary failure in name resolution",
            "connection timed out",
            "EndpointConnectionError",
        ],
        "the cloud endpoint is unreachable",
        "check your network connection (VPN, proxy) and retry",
    ),
    (
        &["InvalidAMIID"],
        "the machine image for this region was not found",
        "check that the region in your credentials supports Yeager images",
    ),
    (
        &["InvalidSubnetID", "InvalidSubnet"],
        "the default subnet for this region was not found",
        "create a default VPC (`aws ec2 create-default-vpc`) and retry",
    ),
    (
        &["OptInRequired"],
        "this region requires opt-in before use",
        "enable the region in your cloud account settings or pick another",
    ),
];

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
