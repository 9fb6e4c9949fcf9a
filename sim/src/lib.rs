// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Simulated cloud backend
//!
//! [`SimCloud`] serves the scaling group, compute and security group
//! inventories out of a [`SimState`]. When loaded from a file, every
//! successful mutation is written back, so consecutive runs against the
//! same file observe each other's changes.

mod config;

pub use config::SimError;
pub use config::SimOperation;
pub use config::SimState;

use async_trait::async_trait;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use sg_reconciler::AddressRange;
use sg_reconciler::Error;
use sg_reconciler::HostIp;
use sg_reconciler::IngressEntry;
use sg_reconciler::Instance;
use sg_reconciler::ResourceKind;
use sg_reconciler::RuleMatchKey;
use sg_reconciler::ScalingGroup;
use sg_reconciler::SecurityGroup;
use sg_reconciler::SecurityGroupId;
use sg_reconciler::inventory::ComputeInventory;
use sg_reconciler::inventory::NetworkAclService;
use sg_reconciler::inventory::Page;
use sg_reconciler::inventory::PageToken;
use sg_reconciler::inventory::ScalingGroupInventory;
use slog::Logger;
use slog::debug;
use slog::info;
use slog::o;
use std::num::NonZeroUsize;
use std::sync::Mutex;

pub struct SimCloud {
    log: Logger,
    state: Mutex<SimState>,
    path: Option<Utf8PathBuf>,
}

impl SimCloud {
    /// A simulated cloud that lives only in memory
    pub fn new(log: &Logger, state: SimState) -> SimCloud {
        let log = log.new(o!("component" => "SimCloud"));
        SimCloud { log, state: Mutex::new(state), path: None }
    }

    /// Load a simulated cloud from `path`, which must serve `region`.
    pub fn from_file(
        log: &Logger,
        path: &Utf8Path,
        region: &str,
    ) -> Result<SimCloud, SimError> {
        let state = SimState::from_file(path)?;
        if state.region != region {
            return Err(SimError::RegionMismatch {
                served: state.region,
                requested: region.to_string(),
            });
        }
        let log = log.new(o!(
            "component" => "SimCloud",
            "path" => path.to_string(),
        ));
        info!(log, "loaded simulated cloud"; "region" => region);
        Ok(SimCloud {
            log,
            state: Mutex::new(state),
            path: Some(path.to_owned()),
        })
    }

    /// A snapshot of the current state
    pub fn state(&self) -> SimState {
        self.state.lock().unwrap().clone()
    }

    /// Make `operation` fail from now on.
    pub fn fail_operation(&self, operation: SimOperation) {
        self.state.lock().unwrap().fail_operations.insert(operation);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().fail_operations.clear();
    }

    fn describe<T, F>(
        &self,
        operation: SimOperation,
        page: Option<PageToken>,
        select: F,
    ) -> Result<Page<T>, Error>
    where
        F: FnOnce(&SimState) -> Vec<T>,
    {
        let state = self.state.lock().unwrap();
        check_failure(&state, operation)?;
        let items = select(&state);
        debug!(
            self.log,
            "{}", operation.name();
            "page" => ?page,
            "matched" => items.len(),
        );
        paginate(operation, items, page, state.page_size)
    }

    /// Apply `mutate` to a copy of the state, persist the copy, and only
    /// then make it current. A failure anywhere leaves the state untouched.
    fn mutate<F>(&self, operation: SimOperation, mutate: F) -> Result<(), Error>
    where
        F: FnOnce(&mut SimState) -> Result<(), Error>,
    {
        let mut state = self.state.lock().unwrap();
        check_failure(&state, operation)?;
        let mut next = state.clone();
        mutate(&mut next)?;
        if let Some(path) = &self.path {
            next.to_file(path).map_err(|error| {
                Error::remote_operation(
                    operation.name(),
                    format!("failed to persist simulated cloud: {error}"),
                )
            })?;
        }
        *state = next;
        Ok(())
    }
}

fn check_failure(
    state: &SimState,
    operation: SimOperation,
) -> Result<(), Error> {
    if state.fail_operations.contains(&operation) {
        Err(Error::remote_operation(operation.name(), "injected failure"))
    } else {
        Ok(())
    }
}

/// Cut one page out of `items`. Tokens are offsets into the listing.
fn paginate<T>(
    operation: SimOperation,
    mut items: Vec<T>,
    page: Option<PageToken>,
    page_size: Option<NonZeroUsize>,
) -> Result<Page<T>, Error> {
    let start = match page {
        None => 0,
        Some(token) => match token.parse::<usize>() {
            Ok(start) if start <= items.len() => start,
            _ => {
                return Err(Error::remote_operation(
                    operation.name(),
                    format!("invalid page token {token:?}"),
                ));
            }
        },
    };
    let end = match page_size {
        Some(size) => items.len().min(start + size.get()),
        None => items.len(),
    };
    let next_page = (end < items.len()).then(|| end.to_string());
    items.truncate(end);
    let items = items.split_off(start);
    Ok(Page { items, next_page })
}

fn group_mut<'a>(
    state: &'a mut SimState,
    group_id: &SecurityGroupId,
) -> Result<&'a mut SecurityGroup, Error> {
    state
        .security_groups
        .iter_mut()
        .find(|g| g.group_id == *group_id)
        .ok_or_else(|| {
            Error::not_found(ResourceKind::SecurityGroup, group_id.as_str())
        })
}

/// Whether any entry of `group` matching `key` carries `cidr`.
fn rule_allows(group: &SecurityGroup, key: &RuleMatchKey, cidr: &str) -> bool {
    group
        .ingress
        .iter()
        .filter(|e| e.matches(key))
        .flat_map(|e| &e.ipv4_ranges)
        .any(|r| r.cidr_ip == cidr)
}

#[async_trait]
impl ScalingGroupInventory for SimCloud {
    async fn scaling_groups_named(
        &self,
        name: &str,
        page: Option<PageToken>,
    ) -> Result<Page<ScalingGroup>, Error> {
        self.describe(SimOperation::DescribeScalingGroups, page, |state| {
            state
                .scaling_groups
                .iter()
                .filter(|g| g.name == name)
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl ComputeInventory for SimCloud {
    async fn instances(
        &self,
        instance_ids: &[String],
        page: Option<PageToken>,
    ) -> Result<Page<Instance>, Error> {
        self.describe(SimOperation::DescribeInstances, page, |state| {
            state
                .instances
                .iter()
                .filter(|i| instance_ids.contains(&i.instance_id))
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl NetworkAclService for SimCloud {
    async fn describe_security_group(
        &self,
        group_id: &SecurityGroupId,
    ) -> Result<SecurityGroup, Error> {
        let state = self.state.lock().unwrap();
        check_failure(&state, SimOperation::DescribeSecurityGroup)?;
        debug!(self.log, "describe security group"; "group_id" => %group_id);
        state.security_group(group_id.as_str()).cloned().ok_or_else(|| {
            Error::not_found(ResourceKind::SecurityGroup, group_id.as_str())
        })
    }

    async fn authorize_ingress(
        &self,
        group_id: &SecurityGroupId,
        key: &RuleMatchKey,
        hosts: &[HostIp],
    ) -> Result<(), Error> {
        let operation = SimOperation::AuthorizeIngress;
        self.mutate(operation, |state| {
            let group = group_mut(state, group_id)?;
            for host in hosts {
                let cidr = host.to_host_cidr();
                if rule_allows(group, key, &cidr) {
                    return Err(Error::remote_operation(
                        operation.name(),
                        format!("duplicate permission: {cidr} ({key})"),
                    ));
                }
            }
            let ranges =
                hosts.iter().map(|h| AddressRange::new(h.to_host_cidr()));
            match group.ingress.iter().position(|e| e.matches(key)) {
                Some(index) => group.ingress[index].ipv4_ranges.extend(ranges),
                None => group.ingress.push(IngressEntry {
                    protocol: key.protocol.as_str().to_string(),
                    from_port: Some(key.from_port),
                    to_port: Some(key.to_port),
                    ipv4_ranges: ranges.collect(),
                }),
            }
            Ok(())
        })?;
        info!(
            self.log,
            "authorized ingress";
            "group_id" => %group_id,
            "rule" => %key,
            "hosts" => hosts.len(),
        );
        Ok(())
    }

    async fn revoke_ingress(
        &self,
        group_id: &SecurityGroupId,
        key: &RuleMatchKey,
        hosts: &[HostIp],
    ) -> Result<(), Error> {
        let operation = SimOperation::RevokeIngress;
        self.mutate(operation, |state| {
            let group = group_mut(state, group_id)?;
            // The rule may be spread over several entries (e.g. "tcp" and
            // "6"); every host must be on one of them.
            for host in hosts {
                let cidr = host.to_host_cidr();
                if !rule_allows(group, key, &cidr) {
                    return Err(Error::remote_operation(
                        operation.name(),
                        format!("permission not found: {cidr} ({key})"),
                    ));
                }
            }
            let cidrs: Vec<String> =
                hosts.iter().map(HostIp::to_host_cidr).collect();
            for entry in group.ingress.iter_mut().filter(|e| e.matches(key)) {
                entry.ipv4_ranges.retain(|r| !cidrs.contains(&r.cidr_ip));
            }
            group
                .ingress
                .retain(|e| !(e.matches(key) && e.ipv4_ranges.is_empty()));
            Ok(())
        })?;
        info!(
            self.log,
            "revoked ingress";
            "group_id" => %group_id,
            "rule" => %key,
            "hosts" => hosts.len(),
        );
        Ok(())
    }
}
