// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One complete reconciliation run

use crate::Error;
use crate::HostIp;
use crate::RunConfig;
use crate::SecurityGroupId;
use crate::apply::apply_plan;
use crate::apply::join;
use crate::desired::collect_desired_hosts;
use crate::extract::matching_host_ips;
use crate::inventory::ComputeInventory;
use crate::inventory::NetworkAclService;
use crate::inventory::ScalingGroupInventory;
use crate::inventory::SelfMetadata;
use crate::plan::reconcile;
use slog::Logger;
use slog::info;
use slog::o;
use std::fmt;

/// The remote systems a run talks to
#[derive(Clone, Copy)]
pub struct Backends<'a> {
    pub scaling_groups: &'a dyn ScalingGroupInventory,
    pub compute: &'a dyn ComputeInventory,
    pub metadata: &'a dyn SelfMetadata,
    pub acl: &'a dyn NetworkAclService,
}

/// What a run changed (or, for a dry run, would have changed)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub security_group_id: SecurityGroupId,
    pub added: Vec<HostIp>,
    pub removed: Vec<HostIp>,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_noop() {
            return write!(f, "no changes to {}", self.security_group_id);
        }
        let (add, remove) = if self.dry_run {
            ("would add", "would remove")
        } else {
            ("added", "removed")
        };
        let mut lines = Vec::new();
        if !self.added.is_empty() {
            lines.push(format!(
                "{add} ingress hosts {} to {}",
                join(&self.added),
                self.security_group_id
            ));
        }
        if !self.removed.is_empty() {
            lines.push(format!(
                "{remove} ingress hosts {} from {}",
                join(&self.removed),
                self.security_group_id
            ));
        }
        f.write_str(&lines.join("\n"))
    }
}

/// Bring the managed rule of `config.security_group_id` in line with the
/// desired host set.
///
/// Steps run strictly one after another and the first error ends the run.
/// The rule is read once and written afterwards without any concurrency
/// control: a change made by someone else in between is not detected.
pub async fn reconcile_security_group(
    log: &Logger,
    config: &RunConfig,
    backends: Backends<'_>,
) -> Result<RunSummary, Error> {
    let log = log.new(o!(
        "security_group" => config.security_group_id.to_string(),
        "rule" => config.rule.to_string(),
    ));

    let desired = collect_desired_hosts(
        &log,
        config,
        backends.scaling_groups,
        backends.compute,
        backends.metadata,
    )
    .await?;

    info!(log, "fetching the hosts currently allowed by the security group");
    let group =
        backends.acl.describe_security_group(&config.security_group_id).await?;
    let current = matching_host_ips(&log, &group, &config.rule)?;

    let plan = reconcile(&current, &desired);
    info!(
        log,
        "computed plan";
        "desired" => desired.len(),
        "current" => current.len(),
        "to_add" => plan.to_add.len(),
        "to_remove" => plan.to_remove.len(),
    );

    if config.dry_run {
        info!(log, "dry run: not changing the security group");
    } else {
        apply_plan(
            &log,
            backends.acl,
            &config.security_group_id,
            &config.rule,
            &plan,
        )
        .await?;
    }

    Ok(RunSummary {
        security_group_id: config.security_group_id.clone(),
        added: plan.to_add,
        removed: plan.to_remove,
        dry_run: config.dry_run,
    })
}
