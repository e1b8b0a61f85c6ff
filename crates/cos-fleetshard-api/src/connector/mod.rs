//!
//! # Managed Connector
//!
//! Desired deployment of a connector as assigned by the fleet manager,
//! plus the lifecycle conditions observed on the cluster.
//!
mod k8;
mod status;

pub use self::status::*;

use serde::{Deserialize, Serialize};

use crate::k8_types::K8Obj;

pub type ManagedConnector = K8Obj<ManagedConnectorSpec>;

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagedConnectorSpec {
    pub cluster_id: String,
    pub connector_id: String,
    pub connector_type_id: String,
    pub deployment_id: String,
    pub deployment: DeploymentSpec,
    pub operator_selector: OperatorSelector,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentSpec {
    pub connector_type_id: String,
    pub connector_resource_version: u64,
    /// revision of the deployment as known by the fleet manager
    pub deployment_resource_version: u64,
    pub desired_state: DesiredState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Ready,
    Stopped,
    Deleted,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorSelector {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub version: String,
}

impl ManagedConnectorSpec {
    pub fn deployment_resource_version(&self) -> u64 {
        self.deployment.deployment_resource_version
    }
}
