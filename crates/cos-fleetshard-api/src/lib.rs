pub mod connector;
pub mod operator;
pub mod cluster;
pub mod secret;

pub use k8_types;

pub use self::connector::{ManagedConnector, ManagedConnectorSpec, ManagedConnectorStatus};
pub use self::operator::{ManagedConnectorOperator, ManagedConnectorOperatorSpec, Operator};
pub use self::cluster::{ManagedConnectorCluster, ManagedConnectorClusterSpec};
pub use self::secret::{ConnectorSecret, ConnectorSecretSpec};

/// api group of the connector custom resources
pub const GROUP: &str = "cos.bf2.org";
pub const V1ALPHA1: &str = "v1alpha1";

/// label carrying the cluster identity on every cluster-scoped resource
pub const LABEL_CLUSTER_ID: &str = "cos.bf2.org/cluster.id";
pub const LABEL_DEPLOYMENT_ID: &str = "cos.bf2.org/deployment.id";
pub const LABEL_CONNECTOR_ID: &str = "cos.bf2.org/connector.id";
