// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciliation of the host addresses allowed through one security group
//! ingress rule.
//!
//! A run proceeds in a fixed order:
//!
//! 1. The [desired state](desired) is collected from a scaling group's
//!    members and, optionally, the invoking host's own public address.
//! 2. The [current state](extract) is mined from the security group's
//!    ingress entries that exactly match the managed [`RuleMatchKey`].
//! 3. The two are [diffed](plan) into a [`ReconcilePlan`].
//! 4. The plan is [applied](apply) to the rule store.
//!
//! Every remote system is reached through one of the capability traits in
//! [`inventory`]; this crate never talks to the network itself.

pub mod apply;
pub mod config;
pub mod desired;
mod error;
pub mod extract;
pub mod inventory;
mod model;
pub mod plan;
mod protocol;
mod run;

#[cfg(test)]
mod fakes;

pub use config::RunConfig;
pub use error::Error;
pub use error::ResourceKind;
pub use model::AddressRange;
pub use model::HealthStatus;
pub use model::HostIp;
pub use model::IngressEntry;
pub use model::Instance;
pub use model::RuleMatchKey;
pub use model::ScalingGroup;
pub use model::ScalingGroupMember;
pub use model::SecurityGroup;
pub use model::SecurityGroupId;
pub use plan::ReconcilePlan;
pub use protocol::Protocol;
pub use run::Backends;
pub use run::RunSummary;
pub use run::reconcile_security_group;
