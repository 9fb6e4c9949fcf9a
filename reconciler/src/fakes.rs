// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! An in-memory stand-in for every remote capability, for unit tests

use crate::AddressRange;
use crate::Error;
use crate::HealthStatus;
use crate::HostIp;
use crate::IngressEntry;
use crate::Instance;
use crate::ResourceKind;
use crate::RuleMatchKey;
use crate::ScalingGroup;
use crate::ScalingGroupMember;
use crate::SecurityGroup;
use crate::SecurityGroupId;
use crate::inventory::ComputeInventory;
use crate::inventory::NetworkAclService;
use crate::inventory::Page;
use crate::inventory::PageToken;
use crate::inventory::ScalingGroupInventory;
use crate::inventory::SelfMetadata;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

pub struct FakeCloud {
    inner: Mutex<FakeState>,
}

struct FakeState {
    scaling_groups: Vec<ScalingGroup>,
    instances: Vec<Instance>,
    security_groups: Vec<SecurityGroup>,
    own_address: Result<String, Error>,
    region: Result<String, Error>,
    page_size: usize,
    failures: BTreeMap<&'static str, Error>,
    calls: Vec<String>,
}

impl FakeCloud {
    pub fn new() -> FakeCloud {
        FakeCloud {
            inner: Mutex::new(FakeState {
                scaling_groups: Vec::new(),
                instances: Vec::new(),
                security_groups: Vec::new(),
                own_address: Err(Error::unavailable(
                    "instance metadata",
                    "no address configured",
                )),
                region: Err(Error::unavailable(
                    "instance metadata",
                    "no region configured",
                )),
                page_size: 100,
                failures: BTreeMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    pub fn add_scaling_group(
        &self,
        name: &str,
        members: &[(&str, HealthStatus)],
    ) {
        let members = members
            .iter()
            .map(|(id, health)| ScalingGroupMember {
                instance_id: id.to_string(),
                health_status: *health,
                lifecycle_state: Some(String::from("InService")),
            })
            .collect();
        self.inner
            .lock()
            .unwrap()
            .scaling_groups
            .push(ScalingGroup { name: name.to_string(), members });
    }

    pub fn add_instance(&self, instance_id: &str, public_ip: Option<&str>) {
        self.inner.lock().unwrap().instances.push(Instance {
            instance_id: instance_id.to_string(),
            public_ip: public_ip.map(String::from),
        });
    }

    pub fn add_security_group(&self, group: SecurityGroup) {
        self.inner.lock().unwrap().security_groups.push(group);
    }

    pub fn set_own_address(&self, address: Result<&str, Error>) {
        self.inner.lock().unwrap().own_address = address.map(String::from);
    }

    pub fn set_region(&self, region: Result<&str, Error>) {
        self.inner.lock().unwrap().region = region.map(String::from);
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.inner.lock().unwrap().page_size = page_size;
    }

    /// Make every later call to `operation` fail with `error`.
    pub fn fail(&self, operation: &'static str, error: Error) {
        self.inner.lock().unwrap().failures.insert(operation, error);
    }

    /// Names of the operations invoked so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn security_group(&self, group_id: &str) -> SecurityGroup {
        self.inner
            .lock()
            .unwrap()
            .security_groups
            .iter()
            .find(|g| g.group_id.as_str() == group_id)
            .cloned()
            .expect("no such security group")
    }
}

impl FakeState {
    fn record(&mut self, operation: &'static str) -> Result<(), Error> {
        self.calls.push(operation.to_string());
        match self.failures.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn paginate<T: Clone>(
        &self,
        items: Vec<T>,
        page: Option<PageToken>,
    ) -> Page<T> {
        let start: usize = page.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size).min(items.len());
        let next_page =
            if end < items.len() { Some(end.to_string()) } else { None };
        Page { items: items[start..end].to_vec(), next_page }
    }

    fn group_mut(
        &mut self,
        group_id: &SecurityGroupId,
    ) -> Result<&mut SecurityGroup, Error> {
        self.security_groups
            .iter_mut()
            .find(|g| g.group_id == *group_id)
            .ok_or_else(|| {
                Error::not_found(ResourceKind::SecurityGroup, group_id.as_str())
            })
    }
}

#[async_trait]
impl ScalingGroupInventory for FakeCloud {
    async fn scaling_groups_named(
        &self,
        name: &str,
        page: Option<PageToken>,
    ) -> Result<Page<ScalingGroup>, Error> {
        let mut state = self.inner.lock().unwrap();
        state.record("scaling_groups_named")?;
        let groups = state
            .scaling_groups
            .iter()
            .filter(|g| g.name == name)
            .cloned()
            .collect();
        Ok(state.paginate(groups, page))
    }
}

#[async_trait]
impl ComputeInventory for FakeCloud {
    async fn instances(
        &self,
        instance_ids: &[String],
        page: Option<PageToken>,
    ) -> Result<Page<Instance>, Error> {
        let mut state = self.inner.lock().unwrap();
        state.record("instances")?;
        let instances = state
            .instances
            .iter()
            .filter(|i| instance_ids.contains(&i.instance_id))
            .cloned()
            .collect();
        Ok(state.paginate(instances, page))
    }
}

#[async_trait]
impl SelfMetadata for FakeCloud {
    async fn own_public_address(&self) -> Result<String, Error> {
        let mut state = self.inner.lock().unwrap();
        state.record("own_public_address")?;
        state.own_address.clone()
    }

    async fn region(&self) -> Result<String, Error> {
        let mut state = self.inner.lock().unwrap();
        state.record("region")?;
        state.region.clone()
    }
}

#[async_trait]
impl NetworkAclService for FakeCloud {
    async fn describe_security_group(
        &self,
        group_id: &SecurityGroupId,
    ) -> Result<SecurityGroup, Error> {
        let mut state = self.inner.lock().unwrap();
        state.record("describe_security_group")?;
        state.group_mut(group_id).map(|g| g.clone())
    }

    async fn authorize_ingress(
        &self,
        group_id: &SecurityGroupId,
        key: &RuleMatchKey,
        hosts: &[HostIp],
    ) -> Result<(), Error> {
        let mut state = self.inner.lock().unwrap();
        state.record("authorize_ingress")?;
        let group = state.group_mut(group_id)?;
        let ranges = hosts.iter().map(|h| AddressRange::new(h.to_host_cidr()));
        match group.ingress.iter().position(|e| e.matches(key)) {
            Some(i) => group.ingress[i].ipv4_ranges.extend(ranges),
            None => group.ingress.push(IngressEntry {
                protocol: key.protocol.to_string(),
                from_port: Some(key.from_port),
                to_port: Some(key.to_port),
                ipv4_ranges: ranges.collect(),
            }),
        }
        Ok(())
    }

    async fn revoke_ingress(
        &self,
        group_id: &SecurityGroupId,
        key: &RuleMatchKey,
        hosts: &[HostIp],
    ) -> Result<(), Error> {
        let mut state = self.inner.lock().unwrap();
        state.record("revoke_ingress")?;
        let group = state.group_mut(group_id)?;
        let cidrs: Vec<String> = hosts.iter().map(HostIp::to_host_cidr).collect();
        for entry in group.ingress.iter_mut().filter(|e| e.matches(key)) {
            entry.ipv4_ranges.retain(|r| !cidrs.contains(&r.cidr_ip));
        }
        group.ingress.retain(|e| !e.ipv4_ranges.is_empty());
        Ok(())
    }
}
