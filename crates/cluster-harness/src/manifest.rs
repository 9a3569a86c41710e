//! Typed manifests for the objects the harness creates.
//!
//! Objects are built from `k8s-openapi` structs and serialized, so names and
//! namespaces are data and never spliced into YAML text.

use std::collections::BTreeMap;

use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::core::v1::ServicePort;
use k8s_openapi::api::core::v1::ServiceSpec;
use k8s_openapi::api::rbac::v1::ClusterRoleBinding;
use k8s_openapi::api::rbac::v1::RoleRef;
use k8s_openapi::api::rbac::v1::Subject;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Serialize;

use crate::error::HarnessError;
use crate::error::HarnessResult;

/// App label carried by the object gateway pods.
pub const GATEWAY_APP: &str = "rook-ceph-rgw";

/// Port exposed by the external gateway service.
pub const GATEWAY_EXTERNAL_PORT: i32 = 53390;

/// Name of the cluster role binding granting anonymous access.
pub const ANON_BINDING_NAME: &str = "anon-user-access";

/// Name of the internal gateway service for `store`.
pub fn gateway_service_name(store: &str) -> String {
    format!("{GATEWAY_APP}-{store}")
}

/// Name of the NodePort service exposing the gateway for `store`.
pub fn external_gateway_service_name(store: &str) -> String {
    format!("rgw-external-{store}")
}

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// NodePort service reaching the object gateway of `store` from outside the cluster.
pub fn external_gateway_service(namespace: &str, store: &str) -> Service {
    let labels = BTreeMap::from([
        ("app".to_string(), GATEWAY_APP.to_string()),
        ("rook_cluster".to_string(), namespace.to_string()),
    ]);

    Service {
        metadata: ObjectMeta {
            name: Some(external_gateway_service_name(store)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some(GATEWAY_APP.to_string()),
                port: GATEWAY_EXTERNAL_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            selector: Some(labels),
            session_affinity: Some("None".to_string()),
            type_: Some("NodePort".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Binds `cluster-admin` to `system:anonymous`, as kubeadm test clusters need.
pub fn anonymous_cluster_binding() -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(ANON_BINDING_NAME.to_string()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: "cluster-admin".to_string(),
        },
        subjects: Some(vec![Subject {
            api_group: Some("rbac.authorization.k8s.io".to_string()),
            kind: "User".to_string(),
            name: "system:anonymous".to_string(),
            namespace: None,
        }]),
    }
}

/// Serializes a manifest for `kubectl ... -f -`.
pub fn to_yaml<T: Serialize>(manifest: &T) -> HarnessResult<String> {
    serde_yaml::to_string(manifest).change_context(HarnessError::Validation {
        message: "failed to serialize manifest".to_string(),
    })
}
