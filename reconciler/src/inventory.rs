// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capabilities the reconciler consumes from the outside world
//!
//! Each trait corresponds to one remote system. Implementations own their
//! own credentials and sessions; nothing here knows how a request is
//! authenticated or transported.
//!
//! Listings are paginated. Callers must drain every page (see
//! [`fetch_all_pages`]) before acting on a listing: a reconciliation computed
//! against a truncated inventory would revoke hosts that are still wanted.

use crate::Error;
use crate::HostIp;
use crate::Instance;
use crate::RuleMatchKey;
use crate::ScalingGroup;
use crate::SecurityGroup;
use crate::SecurityGroupId;
use async_trait::async_trait;
use std::future::Future;

/// Opaque continuation token handed back by a paginated listing
pub type PageToken = String;

/// One page of a listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token for the next page; `None` once the listing is exhausted
    pub next_page: Option<PageToken>,
}

impl<T> Page<T> {
    /// A page that completes its listing
    pub fn last(items: Vec<T>) -> Page<T> {
        Page { items, next_page: None }
    }
}

#[async_trait]
pub trait ScalingGroupInventory: Send + Sync {
    /// List the scaling groups whose name is exactly `name`.
    ///
    /// A healthy inventory returns at most one group; callers decide what to
    /// do with zero or several.
    async fn scaling_groups_named(
        &self,
        name: &str,
        page: Option<PageToken>,
    ) -> Result<Page<ScalingGroup>, Error>;
}

#[async_trait]
pub trait ComputeInventory: Send + Sync {
    /// Describe the given instances, including their public addresses.
    async fn instances(
        &self,
        instance_ids: &[String],
        page: Option<PageToken>,
    ) -> Result<Page<Instance>, Error>;
}

/// What the invoking host can learn about itself
#[async_trait]
pub trait SelfMetadata: Send + Sync {
    /// This host's externally routable address
    async fn own_public_address(&self) -> Result<String, Error>;

    /// The region this host runs in
    async fn region(&self) -> Result<String, Error>;
}

#[async_trait]
pub trait NetworkAclService: Send + Sync {
    /// Fetch a security group with all of its ingress entries.
    async fn describe_security_group(
        &self,
        group_id: &SecurityGroupId,
    ) -> Result<SecurityGroup, Error>;

    /// Grant every host in `hosts` as a `/32` on the rule identified by
    /// `key`, in one all-or-nothing request.
    async fn authorize_ingress(
        &self,
        group_id: &SecurityGroupId,
        key: &RuleMatchKey,
        hosts: &[HostIp],
    ) -> Result<(), Error>;

    /// Revoke every host in `hosts` from the rule identified by `key`, in
    /// one all-or-nothing request.
    async fn revoke_ingress(
        &self,
        group_id: &SecurityGroupId,
        key: &RuleMatchKey,
        hosts: &[HostIp],
    ) -> Result<(), Error>;
}

/// Drain a paginated listing, returning every item in order.
///
/// `fetch` is called with `None` for the first page and then with each
/// continuation token in turn until a page comes back without one. The first
/// error aborts the listing.
pub async fn fetch_all_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, Error>
where
    F: FnMut(Option<PageToken>) -> Fut,
    Fut: Future<Output = Result<Page<T>, Error>>,
{
    let mut items = Vec::new();
    let mut token = None;
    loop {
        let page = fetch(token).await?;
        items.extend(page.items);
        match page.next_page {
            Some(next) => token = Some(next),
            None => return Ok(items),
        }
    }
}
