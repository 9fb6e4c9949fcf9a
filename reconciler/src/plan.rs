// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planning: diff the current hosts against the desired hosts
//!
//! The planner is pure. It takes snapshots of what the rule allows now and
//! what it should allow, and returns the additions and removals that turn
//! one into the other. It never talks to the rule store.

use crate::HostIp;
use std::collections::BTreeSet;

/// The changes needed to bring a rule to its desired state.
///
/// Both lists are sorted lexicographically (see [`HostIp`]) and free of
/// duplicates. `to_add` never contains a host that is already allowed,
/// `to_remove` only contains hosts that are, and the two never overlap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub to_add: Vec<HostIp>,
    pub to_remove: Vec<HostIp>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute the minimal plan moving `current` to `desired`.
///
/// Inputs are treated as sets: order and repetition do not matter.
pub fn reconcile(current: &[HostIp], desired: &[HostIp]) -> ReconcilePlan {
    let current: BTreeSet<&HostIp> = current.iter().collect();
    let desired: BTreeSet<&HostIp> = desired.iter().collect();

    // BTreeSet iterates in `HostIp` order, so both lists come out sorted.
    let to_add =
        desired.difference(&current).map(|&host| host.clone()).collect();
    let to_remove =
        current.difference(&desired).map(|&host| host.clone()).collect();

    ReconcilePlan { to_add, to_remove }
}
