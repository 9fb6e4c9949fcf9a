// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Errors produced while reconciling a security group rule

use std::fmt;

/// Kinds of remote resources that can be missing or ambiguous
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    SecurityGroup,
    ScalingGroup,
    Instance,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::SecurityGroup => "security group",
            ResourceKind::ScalingGroup => "scaling group",
            ResourceKind::Instance => "instance",
        };
        f.write_str(s)
    }
}

/// Every failure a run can hit.
///
/// All of these are fatal: callers are expected to stop at the first one.
/// Payloads are plain strings so that backends built on unrelated client
/// libraries can all produce them.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Invalid operator input, or a setting that could not be resolved
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("{kind} not found: {name}")]
    NotFound { kind: ResourceKind, name: String },

    #[error("expected exactly one {kind} named {name:?}, found {count}")]
    AmbiguousResult { kind: ResourceKind, name: String, count: usize },

    /// A remote system handed back something we cannot interpret
    #[error("malformed data from {origin}: {message}")]
    MalformedData { origin: &'static str, message: String },

    #[error("{what} unavailable: {message}")]
    Unavailable { what: &'static str, message: String },

    #[error("{operation} failed: {message}")]
    RemoteOperation { operation: &'static str, message: String },

    #[error(
        "invalid protocol {0:?}: expected \"tcp\", \"udp\", \"icmp\" \
         (in any case) or a protocol number"
    )]
    InvalidProtocol(String),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Error {
        Error::Configuration { message: message.into() }
    }

    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Error {
        Error::NotFound { kind, name: name.into() }
    }

    pub fn malformed_data(
        origin: &'static str,
        message: impl Into<String>,
    ) -> Error {
        Error::MalformedData { origin, message: message.into() }
    }

    pub fn unavailable(what: &'static str, message: impl Into<String>) -> Error {
        Error::Unavailable { what, message: message.into() }
    }

    pub fn remote_operation(
        operation: &'static str,
        message: impl Into<String>,
    ) -> Error {
        Error::RemoteOperation { operation, message: message.into() }
    }
}
