// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! IP protocol identifiers in canonical (numeric) form

use crate::Error;
use std::fmt;

/// An IP protocol, always held as its IANA protocol number.
///
/// Rule stores report protocols either by name ("tcp", "UDP", ...) or by
/// number ("6", "17", ...), and operators supply them by name. Both sides are
/// run through [`Protocol::normalize`] so that they can be compared.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Protocol(String);

impl Protocol {
    pub const TCP: &'static str = "6";
    pub const UDP: &'static str = "17";
    pub const ICMP: &'static str = "1";

    /// Map a case-insensitive protocol name, or a protocol number, to its
    /// canonical numeric form.
    ///
    /// Numbers are passed through unchanged (they are not re-formatted, so
    /// "06" stays "06").
    pub fn normalize(token: &str) -> Result<Protocol, Error> {
        let canonical = if token.eq_ignore_ascii_case("tcp") {
            Protocol::TCP
        } else if token.eq_ignore_ascii_case("udp") {
            Protocol::UDP
        } else if token.eq_ignore_ascii_case("icmp") {
            Protocol::ICMP
        } else if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
        {
            token
        } else {
            return Err(Error::InvalidProtocol(token.to_string()));
        };
        Ok(Protocol(canonical.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_icmp(&self) -> bool {
        self.0 == Protocol::ICMP
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
