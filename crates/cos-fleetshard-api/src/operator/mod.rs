//!
//! # Managed Connector Operator
//!
//! Operators installed on the cluster that are able to run connectors.
//!
use serde::{Deserialize, Serialize};

use crate::k8_types::{Crd, CrdNames, Spec, Status, DefaultHeader, K8Obj};
use crate::{GROUP, V1ALPHA1};

pub type ManagedConnectorOperator = K8Obj<ManagedConnectorOperatorSpec>;

const MANAGED_CONNECTOR_OPERATOR_API: Crd = Crd {
    group: GROUP,
    version: V1ALPHA1,
    names: CrdNames {
        kind: "ManagedConnectorOperator",
        plural: "managedconnectoroperators",
        singular: "managedconnectoroperator",
    },
};

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagedConnectorOperatorSpec {
    #[serde(rename = "type")]
    pub type_: String,
    pub version: String,
    pub runtime: String,
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct ManagedConnectorOperatorStatus {}

impl Spec for ManagedConnectorOperatorSpec {
    type Header = DefaultHeader;
    type Status = ManagedConnectorOperatorStatus;
    fn metadata() -> &'static Crd {
        &MANAGED_CONNECTOR_OPERATOR_API
    }
}

impl Status for ManagedConnectorOperatorStatus {}

/// minimal operator descriptor reported back to the fleet manager
#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub version: String,
}

impl From<&ManagedConnectorOperator> for Operator {
    fn from(operator: &ManagedConnectorOperator) -> Self {
        Self {
            id: operator.metadata.name.clone(),
            type_: operator.spec.type_.clone(),
            version: operator.spec.version.clone(),
        }
    }
}
