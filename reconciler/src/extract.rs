// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Extraction of the hosts currently allowed through the managed rule

use crate::Error;
use crate::HostIp;
use crate::RuleMatchKey;
use crate::SecurityGroup;
use slog::Logger;
use slog::info;
use slog::warn;

/// Return the address of every range on the security group's ingress entries
/// that exactly match `key`.
///
/// Ranges on other entries are skipped and logged; they are never an error.
/// The result is unordered and may contain duplicates.
///
/// Every contributing range must look like `ADDRESS/PREFIX`. A prefix other
/// than 32 is accepted with a warning and its address is still returned,
/// which means a wider range on the managed rule is treated as the single
/// host at its base address.
pub fn matching_host_ips(
    log: &Logger,
    group: &SecurityGroup,
    key: &RuleMatchKey,
) -> Result<Vec<HostIp>, Error> {
    let mut hosts = Vec::new();
    for entry in &group.ingress {
        let matches = entry.matches(key);
        for range in &entry.ipv4_ranges {
            if !matches {
                info!(
                    log,
                    "excluding address range on unrelated rule";
                    "cidr" => &range.cidr_ip,
                    "protocol" => &entry.protocol,
                    "from_port" => ?entry.from_port,
                    "to_port" => ?entry.to_port,
                );
                continue;
            }
            hosts.push(host_from_cidr(log, group, &range.cidr_ip)?);
        }
    }
    Ok(hosts)
}

fn host_from_cidr(
    log: &Logger,
    group: &SecurityGroup,
    cidr: &str,
) -> Result<HostIp, Error> {
    match cidr.split('/').collect::<Vec<_>>().as_slice() {
        [address, prefix] => {
            if *prefix != "32" {
                warn!(
                    log,
                    "address range on managed rule is not a single host; \
                     treating it as its base address";
                    "cidr" => cidr,
                    "security_group" => %group.group_id,
                );
            }
            Ok(HostIp::new(*address))
        }
        _ => Err(Error::malformed_data(
            "security group description",
            format!(
                "invalid address range {cidr:?} on security group {}",
                group.group_id
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AddressRange;
    use crate::IngressEntry;

    fn log() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    fn entry(protocol: &str, from: i32, to: i32, cidrs: &[&str]) -> IngressEntry {
        IngressEntry {
            protocol: protocol.to_string(),
            from_port: Some(from),
            to_port: Some(to),
            ipv4_ranges: cidrs.iter().copied().map(AddressRange::new).collect(),
        }
    }

    fn group(ingress: Vec<IngressEntry>) -> SecurityGroup {
        SecurityGroup { group_id: "sg-asdf1234".parse().unwrap(), ingress }
    }

    fn strs(hosts: &[HostIp]) -> Vec<&str> {
        hosts.iter().map(HostIp::as_str).collect()
    }

    #[test]
    fn test_only_matching_entries_contribute() {
        let key = RuleMatchKey::from_user_input("tcp", 443, 443).unwrap();
        let group = group(vec![
            entry("tcp", 443, 443, &["198.51.100.1/32", "198.51.100.2/32"]),
            // Same ports, different protocol.
            entry("udp", 443, 443, &["203.0.113.1/32"]),
            // Same protocol, different range.
            entry("tcp", 443, 444, &["203.0.113.2/32"]),
            entry("tcp", 22, 22, &["not even an address"]),
            // Same rule, reported by number.
            entry("6", 443, 443, &["198.51.100.3/32"]),
            IngressEntry {
                protocol: String::from("-1"),
                from_port: None,
                to_port: None,
                ipv4_ranges: vec![AddressRange::new("0.0.0.0/0")],
            },
        ]);

        let hosts = matching_host_ips(&log(), &group, &key).unwrap();
        assert_eq!(
            strs(&hosts),
            ["198.51.100.1", "198.51.100.2", "198.51.100.3"]
        );
    }

    #[test]
    fn test_duplicates_are_kept() {
        let key = RuleMatchKey::from_user_input("udp", 53, 53).unwrap();
        let group = group(vec![
            entry("udp", 53, 53, &["192.0.2.1/32"]),
            entry("UDP", 53, 53, &["192.0.2.1/32"]),
        ]);
        let hosts = matching_host_ips(&log(), &group, &key).unwrap();
        assert_eq!(strs(&hosts), ["192.0.2.1", "192.0.2.1"]);
    }

    #[test]
    fn test_wider_ranges_yield_their_address() {
        let key = RuleMatchKey::from_user_input("icmp", 8, 0).unwrap();
        let group = group(vec![entry(
            "icmp",
            8,
            0,
            &["10.1.0.0/16", "10.2.0.7/32"],
        )]);
        let hosts = matching_host_ips(&log(), &group, &key).unwrap();
        assert_eq!(strs(&hosts), ["10.1.0.0", "10.2.0.7"]);
    }

    #[test]
    fn test_malformed_range_is_an_error() {
        let key = RuleMatchKey::from_user_input("tcp", 22, 22).unwrap();
        for cidr in ["192.0.2.1", "192.0.2.1/32/1"] {
            let group = group(vec![entry("tcp", 22, 22, &[cidr])]);
            let error = matching_host_ips(&log(), &group, &key).unwrap_err();
            assert!(
                matches!(error, Error::MalformedData { .. }),
                "{cidr:?} produced {error:?}"
            );
            assert!(error.to_string().contains(cidr));
        }
    }

    #[test]
    fn test_empty_group() {
        let key = RuleMatchKey::from_user_input("tcp", 22, 22).unwrap();
        let hosts = matching_host_ips(&log(), &group(vec![]), &key).unwrap();
        assert!(hosts.is_empty());
    }
}
