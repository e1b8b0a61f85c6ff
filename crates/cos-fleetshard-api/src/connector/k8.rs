use crate::k8_types::{Crd, CrdNames, Spec, Status, DefaultHeader};

use crate::{GROUP, V1ALPHA1};
use super::{ManagedConnectorSpec, ManagedConnectorStatus};

const MANAGED_CONNECTOR_API: Crd = Crd {
    group: GROUP,
    version: V1ALPHA1,
    names: CrdNames {
        kind: "ManagedConnector",
        plural: "managedconnectors",
        singular: "managedconnector",
    },
};

impl Spec for ManagedConnectorSpec {
    type Header = DefaultHeader;
    type Status = ManagedConnectorStatus;
    fn metadata() -> &'static Crd {
        &MANAGED_CONNECTOR_API
    }
}

impl Status for ManagedConnectorStatus {}

#[cfg(test)]
mod test_v1_spec {
    use std::{io::BufReader, fs::File};

    use crate::k8_types::K8Obj;
    use crate::LABEL_CLUSTER_ID;

    use super::ManagedConnectorSpec;
    use super::super::{ConditionType, DesiredState};

    type K8ManagedConnector = K8Obj<ManagedConnectorSpec>;

    #[test]
    fn read_k8_managed_connector_json() {
        let reader: BufReader<File> =
            BufReader::new(File::open("tests/k8_managed_connector_v1.json").expect("spec"));
        let connector: K8ManagedConnector =
            serde_json::from_reader(reader).expect("failed to parse connector");

        assert_eq!(connector.metadata.name, "mctr-c1a2b3");
        assert_eq!(
            connector.metadata.labels.get(LABEL_CLUSTER_ID),
            Some(&"cluster-1".to_owned())
        );
        assert_eq!(connector.spec.deployment_id, "c1a2b3");
        assert_eq!(connector.spec.deployment.deployment_resource_version, 7);
        assert_eq!(connector.spec.deployment.desired_state, DesiredState::Ready);
        assert_eq!(connector.spec.operator_selector.type_, "camel-connector-operator");
        assert_eq!(connector.status.phase(), Some(ConditionType::Running));
    }

    #[test]
    fn connector_kind_and_version() {
        use crate::k8_types::Spec;

        assert_eq!(ManagedConnectorSpec::kind(), "ManagedConnector");
        assert_eq!(ManagedConnectorSpec::api_version(), "cos.bf2.org/v1alpha1");
    }
}
