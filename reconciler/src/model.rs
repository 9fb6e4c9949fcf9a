// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types describing security groups, scaling groups and instances

use crate::Error;
use crate::Protocol;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// A single permitted source address (the address part of a `/32`).
///
/// Ordering is plain string ordering: "10.0.0.10" sorts before "10.0.0.9".
/// Plans and reports are sorted this way so that they are stable, not so
/// that they are pleasant to read.
#[derive(
    Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct HostIp(String);

impl HostIp {
    pub fn new(address: impl Into<String>) -> HostIp {
        HostIp(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The single-host range used when granting or revoking this address
    pub fn to_host_cidr(&self) -> String {
        format!("{}/32", self.0)
    }
}

impl From<&str> for HostIp {
    fn from(s: &str) -> Self {
        HostIp::new(s)
    }
}

impl From<Ipv4Addr> for HostIp {
    fn from(ip: Ipv4Addr) -> Self {
        HostIp(ip.to_string())
    }
}

impl fmt::Display for HostIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of an existing security group, e.g. `sg-0a1b2c3d`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecurityGroupId(String);

impl SecurityGroupId {
    const PREFIX: &'static str = "sg-";

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for SecurityGroupId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.strip_prefix(SecurityGroupId::PREFIX).is_some_and(|id| {
            // Both the legacy short form and the current long form.
            (id.len() == 8 || id.len() == 17)
                && id
                    .bytes()
                    .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
        });
        if valid {
            Ok(SecurityGroupId(s.to_string()))
        } else {
            Err(Error::configuration(format!(
                "{s:?} is not a security group id (expected \"sg-\" followed \
                 by 8 or 17 lowercase letters or digits, e.g. sg-asdf1234)"
            )))
        }
    }
}

impl TryFrom<String> for SecurityGroupId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SecurityGroupId> for String {
    fn from(id: SecurityGroupId) -> Self {
        id.0
    }
}

impl fmt::Display for SecurityGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies the one ingress rule under management.
///
/// For TCP and UDP the bounds are port numbers; for ICMP they are ICMP types.
/// Every other rule on the security group is left alone.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RuleMatchKey {
    pub protocol: Protocol,
    pub from_port: i32,
    pub to_port: i32,
}

impl RuleMatchKey {
    pub fn new(protocol: Protocol, from_port: i32, to_port: i32) -> Self {
        RuleMatchKey { protocol, from_port, to_port }
    }

    /// Build a key from operator input, enforcing the bounds of the chosen
    /// protocol: 1-65535 for tcp and udp ports, 0-255 for icmp types.
    ///
    /// Only the three protocol names are accepted here, even though rule
    /// stores may report other protocols.
    pub fn from_user_input(
        protocol: &str,
        from: i64,
        to: i64,
    ) -> Result<RuleMatchKey, Error> {
        let is_named = ["tcp", "udp", "icmp"]
            .iter()
            .any(|name| protocol.eq_ignore_ascii_case(name));
        if !is_named {
            return Err(Error::configuration(format!(
                "protocol must be one of \"tcp\", \"udp\" or \"icmp\" \
                 (got {protocol:?})"
            )));
        }
        let protocol = Protocol::normalize(protocol)?;

        let (what, min, max) = if protocol.is_icmp() {
            ("an ICMP type", 0, 255)
        } else {
            ("a port number", 1, 65535)
        };
        let check = |bound: &str, value: i64| -> Result<i32, Error> {
            if value < min || value > max {
                return Err(Error::configuration(format!(
                    "{bound} must be {what} between {min} and {max} \
                     (got {value})"
                )));
            }
            // In range by construction.
            Ok(value as i32)
        };
        let from_port = check("from", from)?;
        let to_port = check("to", to)?;

        Ok(RuleMatchKey { protocol, from_port, to_port })
    }
}

impl fmt::Display for RuleMatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bounds = if self.protocol.is_icmp() { "types" } else { "ports" };
        write!(
            f,
            "protocol {} {} {}-{}",
            self.protocol, bounds, self.from_port, self.to_port
        )
    }
}

/// One source address range on an ingress entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRange {
    pub cidr_ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AddressRange {
    pub fn new(cidr_ip: impl Into<String>) -> AddressRange {
        AddressRange { cidr_ip: cidr_ip.into(), description: None }
    }
}

/// One ingress permission as reported by the rule store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressEntry {
    /// Protocol as the rule store reports it: a name, a number, or "-1" for
    /// all traffic
    pub protocol: String,
    /// Absent for entries that span all ports
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_port: Option<i32>,
    #[serde(default)]
    pub ipv4_ranges: Vec<AddressRange>,
}

impl IngressEntry {
    /// The key this entry would be managed under, if it has one.
    ///
    /// Entries with an unrecognized protocol or without bounds have no key
    /// and so never match a [`RuleMatchKey`].
    pub fn match_key(&self) -> Option<RuleMatchKey> {
        let protocol = Protocol::normalize(&self.protocol).ok()?;
        Some(RuleMatchKey::new(protocol, self.from_port?, self.to_port?))
    }

    pub fn matches(&self, key: &RuleMatchKey) -> bool {
        self.match_key().as_ref() == Some(key)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub group_id: SecurityGroupId,
    #[serde(default)]
    pub ingress: Vec<IngressEntry>,
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub enum HealthStatus {
    #[default]
    Healthy,
    Unhealthy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingGroupMember {
    pub instance_id: String,
    #[serde(default)]
    pub health_status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_state: Option<String>,
}

/// A named, dynamically sized collection of instances
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingGroup {
    pub name: String,
    #[serde(default)]
    pub members: Vec<ScalingGroupMember>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    /// Externally routable address, if one is assigned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_group_id() {
        for valid in ["sg-asdf1234", "sg-4321zasd", "sg-0123456789abcdef0"] {
            let id: SecurityGroupId = valid.parse().unwrap();
            assert_eq!(id.as_str(), valid);
        }
        for invalid in [
            "",
            "sg-",
            "asdf1234",
            "sg-asdf123",
            "sg-ASDF1234",
            "sg-asdf12345",
            "sg_asdf1234",
            "sg-asdf-234",
        ] {
            let error = invalid.parse::<SecurityGroupId>().unwrap_err();
            assert!(
                matches!(error, Error::Configuration { .. }),
                "{invalid:?} produced {error:?}"
            );
        }
    }

    #[test]
    fn test_rule_match_key_from_user_input() {
        let key = RuleMatchKey::from_user_input("tcp", 80, 85).unwrap();
        assert_eq!(key.protocol.as_str(), "6");
        assert_eq!((key.from_port, key.to_port), (80, 85));
        assert_eq!(key.to_string(), "protocol 6 ports 80-85");

        let key = RuleMatchKey::from_user_input("UDP", 1, 65535).unwrap();
        assert_eq!(key.protocol.as_str(), "17");

        let key = RuleMatchKey::from_user_input("icmp", 0, 255).unwrap();
        assert_eq!(key.protocol.as_str(), "1");
        assert_eq!(key.to_string(), "protocol 1 types 0-255");
    }

    #[test]
    fn test_rule_match_key_bounds() {
        for (protocol, from, to) in [
            ("tcp", 0, 1),
            ("tcp", 1, 65536),
            ("udp", -1, 10),
            ("icmp", -1, 0),
            ("icmp", 0, 256),
        ] {
            let error =
                RuleMatchKey::from_user_input(protocol, from, to).unwrap_err();
            assert!(
                matches!(error, Error::Configuration { .. }),
                "{protocol} {from}-{to} produced {error:?}"
            );
        }

        let error = RuleMatchKey::from_user_input("tcp", 1, 70000).unwrap_err();
        assert_eq!(
            error.to_string(),
            "configuration error: to must be a port number between 1 and \
             65535 (got 70000)"
        );
    }

    #[test]
    fn test_rule_match_key_named_protocols_only() {
        for protocol in ["6", "esp", "", "-1"] {
            let error =
                RuleMatchKey::from_user_input(protocol, 1, 1).unwrap_err();
            assert!(matches!(error, Error::Configuration { .. }));
        }
    }

    #[test]
    fn test_ingress_entry_match_key() {
        let key = RuleMatchKey::from_user_input("tcp", 22, 22).unwrap();
        let entry = |protocol: &str, from, to| IngressEntry {
            protocol: protocol.to_string(),
            from_port: from,
            to_port: to,
            ipv4_ranges: vec![],
        };

        assert!(entry("tcp", Some(22), Some(22)).matches(&key));
        assert!(entry("6", Some(22), Some(22)).matches(&key));
        assert!(entry("TCP", Some(22), Some(22)).matches(&key));
        assert!(!entry("udp", Some(22), Some(22)).matches(&key));
        assert!(!entry("tcp", Some(22), Some(23)).matches(&key));
        assert!(!entry("tcp", Some(21), Some(22)).matches(&key));
        assert!(!entry("-1", None, None).matches(&key));
        assert!(!entry("tcp", None, Some(22)).matches(&key));
    }

    #[test]
    fn test_host_ip_ordering_is_lexicographic() {
        let mut hosts: Vec<HostIp> = ["10.0.0.9", "10.0.0.10", "9.1.1.1"]
            .into_iter()
            .map(HostIp::from)
            .collect();
        hosts.sort();
        let hosts: Vec<&str> = hosts.iter().map(HostIp::as_str).collect();
        assert_eq!(hosts, ["10.0.0.10", "10.0.0.9", "9.1.1.1"]);
    }
}
