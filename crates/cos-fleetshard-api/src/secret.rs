//!
//! # Connector Secret
//!
//! Opaque configuration and credentials of a single deployment.
//! Always written as a whole, never merged.
//!
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::k8_types::{Crd, CrdNames, Spec, Status, DefaultHeader, K8Obj};

pub type ConnectorSecret = K8Obj<ConnectorSecretSpec>;

const SECRET_API: Crd = Crd {
    group: "core",
    version: "v1",
    names: CrdNames {
        kind: "Secret",
        plural: "secrets",
        singular: "secret",
    },
};

#[derive(Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectorSecretSpec {
    #[serde(rename = "type")]
    pub type_: String,
    pub data: BTreeMap<String, String>,
}

impl fmt::Debug for ConnectorSecretSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorSecretSpec")
            .field("type_", &self.type_)
            .field("data", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct ConnectorSecretStatus {}

impl Spec for ConnectorSecretSpec {
    type Header = DefaultHeader;
    type Status = ConnectorSecretStatus;
    fn metadata() -> &'static Crd {
        &SECRET_API
    }
}

impl Status for ConnectorSecretStatus {}

impl ConnectorSecretSpec {
    pub const OPAQUE: &'static str = "Opaque";

    pub fn opaque(data: BTreeMap<String, String>) -> Self {
        Self {
            type_: Self::OPAQUE.to_owned(),
            data,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_secret_debug_hides_values() {
        let mut data = BTreeMap::new();
        data.insert("password".to_owned(), "hunter2".to_owned());
        let spec = ConnectorSecretSpec::opaque(data);

        let debug = format!("{spec:?}");
        assert!(debug.contains("password"));
        assert!(!debug.contains("hunter2"));
    }
}
