// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interfaces for parsing and writing simulated cloud state files

use camino::Utf8Path;
use camino::Utf8PathBuf;
use serde::Deserialize;
use serde::Serialize;
use sg_reconciler::Instance;
use sg_reconciler::ScalingGroup;
use sg_reconciler::SecurityGroup;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use thiserror::Error;

/// Operations of the simulated cloud that can be made to fail
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SimOperation {
    DescribeScalingGroups,
    DescribeInstances,
    DescribeSecurityGroup,
    AuthorizeIngress,
    RevokeIngress,
}

impl SimOperation {
    pub fn name(&self) -> &'static str {
        match self {
            SimOperation::DescribeScalingGroups => "describe scaling groups",
            SimOperation::DescribeInstances => "describe instances",
            SimOperation::DescribeSecurityGroup => "describe security group",
            SimOperation::AuthorizeIngress => "authorize security group ingress",
            SimOperation::RevokeIngress => "revoke security group ingress",
        }
    }
}

/// Everything the simulated cloud knows
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimState {
    /// The one region this cloud serves
    pub region: String,
    /// Maximum items per listing page; unset means a single page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<NonZeroUsize>,
    /// Operations that fail whenever they are invoked
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub fail_operations: BTreeSet<SimOperation>,
    #[serde(default)]
    pub scaling_groups: Vec<ScalingGroup>,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub security_groups: Vec<SecurityGroup>,
}

#[derive(Debug, Error)]
pub enum SimError {
    #[error("failed to read simulated cloud state from {path}")]
    Read {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error("failed to parse simulated cloud state in {path}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: toml::de::Error,
    },

    #[error("failed to serialize simulated cloud state")]
    Serialize(#[source] toml::ser::Error),

    #[error("failed to write simulated cloud state to {path}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },

    #[error(
        "simulated cloud serves region {served:?}, but region \
         {requested:?} was requested"
    )]
    RegionMismatch { served: String, requested: String },
}

impl SimState {
    /// Load state from a TOML file.
    pub fn from_file<P: AsRef<Utf8Path>>(path: P) -> Result<Self, SimError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|err| SimError::Read { path: path.to_owned(), err })?;
        toml::from_str(&contents)
            .map_err(|err| SimError::Parse { path: path.to_owned(), err })
    }

    /// Write state to a TOML file, replacing whatever was there.
    pub fn to_file<P: AsRef<Utf8Path>>(&self, path: P) -> Result<(), SimError> {
        let path = path.as_ref();
        let contents =
            toml::to_string_pretty(self).map_err(SimError::Serialize)?;
        std::fs::write(path, contents)
            .map_err(|err| SimError::Write { path: path.to_owned(), err })
    }

    pub fn security_group(&self, group_id: &str) -> Option<&SecurityGroup> {
        self.security_groups.iter().find(|g| g.group_id.as_str() == group_id)
    }
}
