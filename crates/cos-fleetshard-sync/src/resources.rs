//!
//! # Resource naming and scoping
//!
//! Names of cluster objects are derived from fleet manager identifiers,
//! every connector is tagged with the identity of the cluster it belongs to.
//!
use std::collections::{BTreeMap, HashMap};

use cos_fleetshard_api::cluster::CONNECTOR_CLUSTER_PREFIX;
use cos_fleetshard_api::{
    ConnectorSecret, ConnectorSecretSpec, ManagedConnector, ManagedConnectorCluster,
    ManagedConnectorClusterSpec, ManagedConnectorSpec, LABEL_CLUSTER_ID, LABEL_CONNECTOR_ID,
    LABEL_DEPLOYMENT_ID,
};

use crate::k8_types::{LabelSelector, OwnerReferences};
use crate::{Result, SyncError};

pub const CONNECTOR_PREFIX: &str = "mctr";
pub const DEPLOYMENT_SUFFIX: &str = "deploy";

const MAX_NAME_LEN: usize = 253;

/// name of the connector object for a deployment
pub fn connector_id(deployment_id: &str) -> Result<String> {
    validate_id("deployment id", deployment_id)?;
    checked_name(format!("{CONNECTOR_PREFIX}-{deployment_id}"))
}

/// name of the secret holding a deployment's configuration
pub fn secret_name(deployment_id: &str) -> Result<String> {
    validate_id("deployment id", deployment_id)?;
    checked_name(format!("{CONNECTOR_PREFIX}-{deployment_id}-{DEPLOYMENT_SUFFIX}"))
}

pub fn cluster_selector(cluster_id: &str) -> LabelSelector {
    let mut match_labels = HashMap::new();
    match_labels.insert(LABEL_CLUSTER_ID.to_owned(), cluster_id.to_owned());
    LabelSelector { match_labels }
}

/// fresh name for a cluster registration
pub fn cluster_registration_name() -> String {
    format!("{CONNECTOR_CLUSTER_PREFIX}-{}", uuid::Uuid::new_v4())
}

/// true if every label of the selector is present with the same value
pub fn selector_matches(selector: &LabelSelector, labels: &HashMap<String, String>) -> bool {
    selector
        .match_labels
        .iter()
        .all(|(key, value)| labels.get(key) == Some(value))
}

/// Build a connector for `deployment_id` owned by `cluster_id`.
/// Identifiers in `spec` are overwritten with the ones given here.
pub fn new_connector(
    cluster_id: &str,
    namespace: &str,
    deployment_id: &str,
    mut spec: ManagedConnectorSpec,
) -> Result<ManagedConnector> {
    validate_id("cluster id", cluster_id)?;
    let name = connector_id(deployment_id)?;

    spec.cluster_id = cluster_id.to_owned();
    spec.deployment_id = deployment_id.to_owned();
    let connector_label = spec.connector_id.clone();

    let mut connector = ManagedConnector::new(name, spec);
    connector.metadata.namespace = namespace.to_owned();
    let labels = &mut connector.metadata.labels;
    labels.insert(LABEL_CLUSTER_ID.to_owned(), cluster_id.to_owned());
    labels.insert(LABEL_DEPLOYMENT_ID.to_owned(), deployment_id.to_owned());
    if !connector_label.is_empty() {
        labels.insert(LABEL_CONNECTOR_ID.to_owned(), connector_label);
    }
    Ok(connector)
}

pub fn new_connector_secret(
    namespace: &str,
    deployment_id: &str,
    data: BTreeMap<String, String>,
) -> Result<ConnectorSecret> {
    let name = secret_name(deployment_id)?;
    let mut secret = ConnectorSecret::new(name, ConnectorSecretSpec::opaque(data));
    secret.metadata.namespace = namespace.to_owned();
    secret
        .metadata
        .labels
        .insert(LABEL_DEPLOYMENT_ID.to_owned(), deployment_id.to_owned());
    Ok(secret)
}

pub fn new_cluster_registration(cluster_id: &str, namespace: &str) -> ManagedConnectorCluster {
    let mut cluster = ManagedConnectorCluster::new(
        cluster_registration_name(),
        ManagedConnectorClusterSpec {
            cluster_id: cluster_id.to_owned(),
        },
    );
    cluster.metadata.namespace = namespace.to_owned();
    cluster
        .metadata
        .labels
        .insert(LABEL_CLUSTER_ID.to_owned(), cluster_id.to_owned());
    cluster
}

/// reference binding a dependent object to the stored connector
pub fn connector_owner_reference(connector: &ManagedConnector) -> OwnerReferences {
    connector
        .metadata
        .make_owner_reference::<ManagedConnectorSpec>()
}

/// ids end up in object names, so they must be valid DNS-1123 subdomains
fn validate_id(what: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(SyncError::InvalidArgument(format!("{what} is empty")));
    }

    let valid_char = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if !id.chars().all(|c| valid_char(c) || c == '-' || c == '.') {
        return Err(SyncError::InvalidArgument(format!(
            "{what} '{id}' may only contain lower case alphanumerics, '-' and '.'"
        )));
    }
    if !id.starts_with(valid_char) || !id.ends_with(valid_char) {
        return Err(SyncError::InvalidArgument(format!(
            "{what} '{id}' must start and end with an alphanumeric character"
        )));
    }
    Ok(())
}

fn checked_name(name: String) -> Result<String> {
    if name.len() > MAX_NAME_LEN {
        return Err(SyncError::InvalidArgument(format!(
            "name '{name}' exceeds {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_derived_names() {
        assert_eq!(connector_id("c1a2b3").expect("id"), "mctr-c1a2b3");
        assert_eq!(secret_name("c1a2b3").expect("name"), "mctr-c1a2b3-deploy");
        assert_eq!(
            secret_name("c1a2b3").expect("name"),
            secret_name("c1a2b3").expect("name")
        );
    }

    #[test]
    fn test_secret_names_distinct() {
        let ids = [
            "a", "b", "ab", "a-b", "a.b", "a-deploy", "deploy", "0", "00", "cbm3l8r9a0",
            "cbm3l8r9a1",
        ];
        let names: HashSet<String> = ids
            .iter()
            .map(|id| secret_name(id).expect("valid id"))
            .collect();
        assert_eq!(names.len(), ids.len());
    }

    #[test]
    fn test_invalid_ids() {
        for id in ["", "UPPER", "under_score", "-leading", "trailing.", "sp ace", "ünï"] {
            let err = connector_id(id).expect_err(id);
            assert!(matches!(err, SyncError::InvalidArgument(_)), "{id}");
            assert!(secret_name(id).is_err(), "{id}");
        }

        let long = "a".repeat(MAX_NAME_LEN);
        assert!(connector_id(&long).is_err());
    }

    #[test]
    fn test_selector() {
        let selector = cluster_selector("c1");
        let mut labels = HashMap::new();
        assert!(!selector_matches(&selector, &labels));

        labels.insert(LABEL_CLUSTER_ID.to_owned(), "c2".to_owned());
        assert!(!selector_matches(&selector, &labels));

        labels.insert(LABEL_CLUSTER_ID.to_owned(), "c1".to_owned());
        labels.insert("other".to_owned(), "x".to_owned());
        assert!(selector_matches(&selector, &labels));

        let empty = LabelSelector {
            match_labels: HashMap::new(),
        };
        assert!(selector_matches(&empty, &HashMap::new()));
    }

    #[test]
    fn test_new_connector_is_labeled() {
        let spec = ManagedConnectorSpec {
            connector_id: "conn1".to_owned(),
            cluster_id: "ignored".to_owned(),
            ..Default::default()
        };
        let connector = new_connector("c1", "connectors", "d1", spec).expect("connector");

        assert_eq!(connector.metadata.name, "mctr-d1");
        assert_eq!(connector.metadata.namespace, "connectors");
        assert_eq!(connector.spec.cluster_id, "c1");
        assert_eq!(connector.spec.deployment_id, "d1");
        assert!(selector_matches(
            &cluster_selector("c1"),
            &connector.metadata.labels
        ));
        assert_eq!(
            connector.metadata.labels.get(LABEL_CONNECTOR_ID),
            Some(&"conn1".to_owned())
        );
    }

    #[test]
    fn test_registration_names_unique() {
        let first = new_cluster_registration("c1", "connectors");
        let second = new_cluster_registration("c1", "connectors");
        assert!(first.metadata.name.starts_with("mcc-"));
        assert_ne!(first.metadata.name, second.metadata.name);
        assert_eq!(first.spec.cluster_id, "c1");
    }

    #[test]
    fn test_owner_reference() {
        let mut connector =
            new_connector("c1", "connectors", "d1", ManagedConnectorSpec::default())
                .expect("connector");
        connector.metadata.uid = "uid-1".to_owned();

        let owner = connector_owner_reference(&connector);
        assert_eq!(owner.uid, "uid-1");
        assert_eq!(owner.name, "mctr-d1");
        assert_eq!(owner.kind, "ManagedConnector");

        let secret = new_connector_secret("connectors", "d1", BTreeMap::new()).expect("secret");
        assert_eq!(secret.metadata.name, "mctr-d1-deploy");
        assert_eq!(secret.spec.type_, ConnectorSecretSpec::OPAQUE);
    }
}
