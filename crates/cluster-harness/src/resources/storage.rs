use error_stack::Report;
use k8s_openapi::api::core::v1::PersistentVolume;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::ListParams;
use kube::Api;
use tracing::error;
use tracing::info;

use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::error::KubeResultExt;
use crate::ClusterSession;

const DEFAULT_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";
const BETA_DEFAULT_CLASS_ANNOTATION: &str = "storageclass.beta.kubernetes.io/is-default-class";

/// Returns true if the storage class metadata marks it as the cluster default.
pub fn is_default_class(meta: &ObjectMeta) -> bool {
    let Some(annotations) = meta.annotations.as_ref() else {
        return false;
    };
    [DEFAULT_CLASS_ANNOTATION, BETA_DEFAULT_CLASS_ANNOTATION]
        .iter()
        .any(|key| annotations.get(*key).map(String::as_str) == Some("true"))
}

impl ClusterSession {
    /// Checks `kubectl get storageclass` output for `name`.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::NotFound`] if no storage class is called `name`
    pub async fn is_storage_class_present(&self, name: &str) -> HarnessResult<()> {
        let out = self
            .get_resource(&["storageclass", "-o", "jsonpath={.items[*].metadata.name}"])
            .await?;
        if out.split_whitespace().any(|class| class == name) {
            return Ok(());
        }
        Err(Report::new(HarnessError::not_found("storageclass", name)))
    }

    pub async fn is_default_storage_class_present(&self) -> HarnessResult<bool> {
        let api: Api<StorageClass> = Api::all(self.client().clone());
        let classes = api
            .list(&ListParams::default())
            .await
            .classify("storageclasses", "")?;
        Ok(classes.items.iter().any(|sc| is_default_class(&sc.metadata)))
    }

    pub async fn log_persistent_volumes(&self, detailed: bool) {
        let api: Api<PersistentVolume> = Api::all(self.client().clone());
        match api.list(&ListParams::default()).await {
            Ok(pvs) if detailed => {
                info!("Found {} PVs", pvs.items.len());
                for pv in &pvs.items {
                    info!("PV {:?}: {pv:?}", pv.metadata.name);
                }
            }
            Ok(pvs) => {
                let names: Vec<_> = pvs.items.iter().filter_map(|p| p.metadata.name.as_deref()).collect();
                info!("Found PVs: {names:?}");
            }
            Err(e) => error!("failed to list pvs. {e}"),
        }
    }

    pub async fn log_pvcs(&self, namespace: &str, detailed: bool) {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client().clone(), namespace);
        match api.list(&ListParams::default()).await {
            Ok(pvcs) if detailed => {
                info!("Found {} PVCs", pvcs.items.len());
                for pvc in &pvcs.items {
                    info!("PVC {:?}: {pvc:?}", pvc.metadata.name);
                }
            }
            Ok(pvcs) => {
                let names: Vec<_> = pvcs.items.iter().filter_map(|p| p.metadata.name.as_deref()).collect();
                info!("Found PVCs: {names:?}");
            }
            Err(e) => error!("failed to list pvcs in namespace {namespace}. {e}"),
        }
    }

    pub async fn log_storage_classes(&self, detailed: bool) {
        let api: Api<StorageClass> = Api::all(self.client().clone());
        match api.list(&ListParams::default()).await {
            Ok(classes) if detailed => {
                info!("Found {} StorageClasses", classes.items.len());
                for sc in &classes.items {
                    info!("StorageClass {:?}: {sc:?}", sc.metadata.name);
                }
            }
            Ok(classes) => {
                let names: Vec<_> = classes.items.iter().filter_map(|c| c.metadata.name.as_deref()).collect();
                info!("Found StorageClasses: {names:?}");
            }
            Err(e) => error!("failed to list StorageClasses: {e}"),
        }
    }
}
