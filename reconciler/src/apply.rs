// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Applying a [`ReconcilePlan`] to the rule store

use crate::Error;
use crate::HostIp;
use crate::ReconcilePlan;
use crate::RuleMatchKey;
use crate::SecurityGroupId;
use crate::inventory::NetworkAclService;
use slog::Logger;
use slog::info;

/// Grant `hosts` on the managed rule in a single request.
pub async fn add_hosts(
    log: &Logger,
    acl: &dyn NetworkAclService,
    group_id: &SecurityGroupId,
    key: &RuleMatchKey,
    hosts: &[HostIp],
) -> Result<(), Error> {
    acl.authorize_ingress(group_id, key, hosts).await?;
    info!(
        log,
        "added ingress hosts";
        "security_group" => %group_id,
        "rule" => %key,
        "hosts" => join(hosts),
    );
    Ok(())
}

/// Revoke `hosts` from the managed rule in a single request.
pub async fn remove_hosts(
    log: &Logger,
    acl: &dyn NetworkAclService,
    group_id: &SecurityGroupId,
    key: &RuleMatchKey,
    hosts: &[HostIp],
) -> Result<(), Error> {
    acl.revoke_ingress(group_id, key, hosts).await?;
    info!(
        log,
        "removed ingress hosts";
        "security_group" => %group_id,
        "rule" => %key,
        "hosts" => join(hosts),
    );
    Ok(())
}

/// Apply `plan`: additions first, then removals.
///
/// An empty half issues no request. If the additions fail, the removals are
/// not attempted. Nothing is retried or rolled back: a failure in the second
/// half leaves the first half applied, and the next run will plan only what
/// is still outstanding.
pub async fn apply_plan(
    log: &Logger,
    acl: &dyn NetworkAclService,
    group_id: &SecurityGroupId,
    key: &RuleMatchKey,
    plan: &ReconcilePlan,
) -> Result<(), Error> {
    if !plan.to_add.is_empty() {
        add_hosts(log, acl, group_id, key, &plan.to_add).await?;
    }
    if !plan.to_remove.is_empty() {
        remove_hosts(log, acl, group_id, key, &plan.to_remove).await?;
    }
    Ok(())
}

pub(crate) fn join(hosts: &[HostIp]) -> String {
    hosts.iter().map(HostIp::as_str).collect::<Vec<_>>().join(", ")
}
