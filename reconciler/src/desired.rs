// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Collection of the hosts that should be allowed through the managed rule

use crate::Error;
use crate::HostIp;
use crate::ResourceKind;
use crate::RunConfig;
use crate::inventory::ComputeInventory;
use crate::inventory::ScalingGroupInventory;
use crate::inventory::SelfMetadata;
use crate::inventory::fetch_all_pages;
use slog::Logger;
use slog::debug;
use slog::info;
use slog::warn;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;

/// Assemble the desired host set for `config`: the public addresses of the
/// configured scaling group's members, plus this host's own public address
/// if requested.
///
/// The result is free of duplicates. Any lookup failure aborts collection.
pub async fn collect_desired_hosts(
    log: &Logger,
    config: &RunConfig,
    scaling_groups: &dyn ScalingGroupInventory,
    compute: &dyn ComputeInventory,
    metadata: &dyn SelfMetadata,
) -> Result<Vec<HostIp>, Error> {
    let mut desired = BTreeSet::new();

    if let Some(name) = config.scaling_group() {
        info!(
            log,
            "fetching public addresses of scaling group members";
            "scaling_group" => name,
        );
        desired.extend(
            scaling_group_public_ips(log, scaling_groups, compute, name)
                .await?,
        );
    }

    if config.include_self {
        info!(log, "fetching the public address of this host");
        desired.insert(own_public_ip(metadata).await?);
    }

    if desired.is_empty() {
        warn!(
            log,
            "no hosts are wanted; every host on the managed rule will be \
             revoked"
        );
    }
    Ok(desired.into_iter().collect())
}

/// Public addresses of every member of the scaling group called `name`.
///
/// Members are included whatever their health or lifecycle state: an
/// unhealthy instance still needs to be reachable to recover. Members without
/// a public address are skipped.
pub async fn scaling_group_public_ips(
    log: &Logger,
    scaling_groups: &dyn ScalingGroupInventory,
    compute: &dyn ComputeInventory,
    name: &str,
) -> Result<Vec<HostIp>, Error> {
    let mut groups = fetch_all_pages(move |page| {
        scaling_groups.scaling_groups_named(name, page)
    })
    .await?;
    if groups.len() > 1 {
        return Err(Error::AmbiguousResult {
            kind: ResourceKind::ScalingGroup,
            name: name.to_string(),
            count: groups.len(),
        });
    }
    let Some(group) = groups.pop() else {
        return Err(Error::not_found(ResourceKind::ScalingGroup, name));
    };

    if group.members.is_empty() {
        info!(log, "scaling group has no instances"; "scaling_group" => name);
        return Ok(Vec::new());
    }

    for member in &group.members {
        debug!(
            log,
            "proposing scaling group member";
            "instance_id" => &member.instance_id,
            "health_status" => ?member.health_status,
            "lifecycle_state" => ?member.lifecycle_state,
        );
    }
    let instance_ids: Vec<String> =
        group.members.into_iter().map(|m| m.instance_id).collect();

    let ids = &instance_ids;
    let instances =
        fetch_all_pages(move |page| compute.instances(ids, page)).await?;
    if instances.is_empty() {
        // The scaling group says these exist but the compute inventory
        // doesn't know any of them.
        return Err(Error::not_found(
            ResourceKind::Instance,
            instance_ids.join(", "),
        ));
    }

    let mut hosts = Vec::with_capacity(instances.len());
    for instance in instances {
        match instance.public_ip {
            Some(ip) if !ip.is_empty() => hosts.push(HostIp::new(ip)),
            _ => {
                debug!(
                    log,
                    "skipping instance without a public address";
                    "instance_id" => &instance.instance_id,
                );
            }
        }
    }
    Ok(hosts)
}

/// This host's own public address, which must be an IPv4 address.
pub async fn own_public_ip(
    metadata: &dyn SelfMetadata,
) -> Result<HostIp, Error> {
    let address = metadata.own_public_address().await?;
    let ip: Ipv4Addr = address.trim().parse().map_err(|_| {
        Error::malformed_data(
            "instance metadata",
            format!("own public address {address:?} is not an IPv4 address"),
        )
    })?;
    Ok(HostIp::from(ip))
}
