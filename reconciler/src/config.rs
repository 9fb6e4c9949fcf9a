// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Run configuration

use crate::Error;
use crate::RuleMatchKey;
use crate::SecurityGroupId;
use crate::inventory::SelfMetadata;
use display_error_chain::DisplayErrorChain;
use slog::Logger;
use slog::debug;

/// Everything one reconciliation run needs to know, already validated
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    pub security_group_id: SecurityGroupId,
    pub rule: RuleMatchKey,
    /// Scaling group whose members' public addresses are wanted
    pub scaling_group_name: Option<String>,
    /// Whether the invoking host's own public address is wanted
    pub include_self: bool,
    /// Compute and report the plan without changing anything
    pub dry_run: bool,
}

impl RunConfig {
    pub fn new(security_group_id: SecurityGroupId, rule: RuleMatchKey) -> Self {
        RunConfig {
            security_group_id,
            rule,
            scaling_group_name: None,
            include_self: false,
            dry_run: false,
        }
    }

    /// The scaling group to consult, if any; an empty name counts as none.
    pub fn scaling_group(&self) -> Option<&str> {
        self.scaling_group_name.as_deref().filter(|name| !name.is_empty())
    }
}

/// Decide which region to operate in.
///
/// An explicitly requested region wins. Otherwise the host's own metadata is
/// asked; if that fails or comes back empty there is nothing to go on.
pub async fn resolve_region(
    log: &Logger,
    explicit: Option<&str>,
    metadata: &dyn SelfMetadata,
) -> Result<String, Error> {
    if let Some(region) = explicit.filter(|r| !r.is_empty()) {
        return Ok(region.to_string());
    }

    debug!(log, "no region specified; asking instance metadata");
    let discovered = metadata.region().await.map_err(|error| {
        Error::configuration(format!(
            "no region specified and it could not be discovered: {}",
            DisplayErrorChain::new(&error)
        ))
    })?;
    if discovered.is_empty() {
        return Err(Error::configuration(
            "no region specified and instance metadata reported none",
        ));
    }
    debug!(log, "discovered region"; "region" => &discovered);
    Ok(discovered)
}
