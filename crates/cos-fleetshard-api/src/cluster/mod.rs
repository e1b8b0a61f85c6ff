//!
//! # Managed Connector Cluster
//!
//! Registration of this cluster in its own connectors namespace.
//!
use serde::{Deserialize, Serialize};

use crate::k8_types::{Crd, CrdNames, Spec, Status, DefaultHeader, K8Obj};
use crate::{GROUP, V1ALPHA1};

pub type ManagedConnectorCluster = K8Obj<ManagedConnectorClusterSpec>;

/// prefix of generated registration names
pub const CONNECTOR_CLUSTER_PREFIX: &str = "mcc";

const MANAGED_CONNECTOR_CLUSTER_API: Crd = Crd {
    group: GROUP,
    version: V1ALPHA1,
    names: CrdNames {
        kind: "ManagedConnectorCluster",
        plural: "managedconnectorclusters",
        singular: "managedconnectorcluster",
    },
};

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagedConnectorClusterSpec {
    pub cluster_id: String,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagedConnectorClusterStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl Spec for ManagedConnectorClusterSpec {
    type Header = DefaultHeader;
    type Status = ManagedConnectorClusterStatus;
    fn metadata() -> &'static Crd {
        &MANAGED_CONNECTOR_CLUSTER_API
    }
}

impl Status for ManagedConnectorClusterStatus {}
