use k8s_openapi::api::core::v1::Event;
use k8s_openapi::api::core::v1::Pod;
use kube::api::DeleteParams;
use kube::api::ListParams;
use kube::Api;
use tracing::error;
use tracing::info;

use super::app_selector;
use super::invalid;
use crate::error::HarnessError;
use crate::error::HarnessResult;
use crate::error::KubeResultExt;
use crate::ClusterSession;

pub const POD_RUNNING: &str = "Running";

const NO_RESOURCES_FOUND: &str = "No resources found";

fn pod_phase(pod: &Pod) -> Option<&str> {
    pod.status.as_ref().and_then(|s| s.phase.as_deref())
}

impl ClusterSession {
    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client().clone(), namespace)
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> HarnessResult<Vec<Pod>> {
        let pods = self
            .pods(namespace)
            .list(&ListParams::default().labels(selector))
            .await
            .classify("pods", selector)?;
        Ok(pods.items)
    }

    /// Number of pods matching `label`; a missing namespace has none.
    pub async fn count_pods_with_label(&self, label: &str, namespace: &str) -> HarnessResult<usize> {
        match self.list_pods(namespace, label).await {
            Ok(pods) => Ok(pods.len()),
            Err(report) if report.current_context().is_not_found() => Ok(0),
            Err(report) => Err(report),
        }
    }

    pub async fn is_pod_with_label_present(
        &self,
        label: &str,
        namespace: &str,
    ) -> HarnessResult<bool> {
        Ok(self.count_pods_with_label(label, namespace).await? > 0)
    }

    /// Waits until exactly `count` pods match `label`.
    pub async fn wait_for_pod_count(
        &self,
        label: &str,
        namespace: &str,
        count: usize,
    ) -> HarnessResult<()> {
        self.wait_policy()
            .wait_until(
                &format!("{count} pods with label {label} in namespace {namespace}"),
                move || async move {
                    let found = self.list_pods(namespace, label).await?.len();
                    info!(label, namespace, count, found, "counting pods");
                    Ok(found == count)
                },
            )
            .await
    }

    /// Waits until at least one pod matching `label` is running.
    pub async fn wait_for_labeled_pod_to_run(
        &self,
        label: &str,
        namespace: &str,
    ) -> HarnessResult<()> {
        self.wait_policy()
            .wait_until(
                &format!("pod with label {label} in namespace {namespace} to be running"),
                move || async move {
                    let pods = self.list_pods(namespace, label).await?;
                    Ok(pods.iter().any(|p| pod_phase(p) == Some(POD_RUNNING)))
                },
            )
            .await
    }

    /// Waits until no pod matches `label`.
    pub async fn wait_until_pod_with_label_deleted(
        &self,
        label: &str,
        namespace: &str,
    ) -> HarnessResult<()> {
        self.wait_policy()
            .wait_until(
                &format!("pod with label {label} in namespace {namespace} to be deleted"),
                move || async move {
                    match self.list_pods(namespace, label).await {
                        Ok(pods) => Ok(pods.is_empty()),
                        Err(report) if report.current_context().is_not_found() => Ok(true),
                        Err(report) => Err(report),
                    }
                },
            )
            .await
    }

    /// Waits until the pod `name` reports the Running phase.
    pub async fn wait_for_pod_running(&self, name: &str, namespace: &str) -> HarnessResult<()> {
        let api = self.pods(namespace);
        let api = &api;
        self.wait_policy()
            .wait_until(
                &format!("pod {name} in namespace {namespace} to be running"),
                move || async move {
                    let pod = api.get_opt(name).await.classify("pod", name)?;
                    Ok(pod.as_ref().and_then(pod_phase) == Some(POD_RUNNING))
                },
            )
            .await
    }

    /// Waits until the pod `name` can no longer be fetched.
    pub async fn wait_for_pod_terminated(&self, name: &str, namespace: &str) -> HarnessResult<()> {
        self.wait_for_pod_gone(name, namespace, "terminate").await
    }

    /// Waits until the pod `name` is gone.
    ///
    /// Same check as [`wait_for_pod_terminated`](Self::wait_for_pod_terminated).
    pub async fn wait_until_pod_deleted(&self, name: &str, namespace: &str) -> HarnessResult<()> {
        self.wait_for_pod_gone(name, namespace, "be deleted").await
    }

    async fn wait_for_pod_gone(&self, name: &str, namespace: &str, verb: &str) -> HarnessResult<()> {
        let api = self.pods(namespace);
        let api = &api;
        self.wait_policy()
            .wait_until(
                &format!("pod {name} in namespace {namespace} to {verb}"),
                move || async move {
                    match api.get_opt(name).await.classify("pod", name)? {
                        None => Ok(true),
                        Some(pod) => {
                            info!(name, namespace, phase = ?pod_phase(&pod), "pod still present");
                            Ok(false)
                        }
                    }
                },
            )
            .await
    }

    pub async fn delete_pod(&self, name: &str, namespace: &str) -> HarnessResult<()> {
        match self
            .pods(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .classify("pod", name)
        {
            Ok(_) => Ok(()),
            Err(report) if report.current_context().is_not_found() => Ok(()),
            Err(report) => Err(report),
        }
    }

    /// Names of the pods labelled `app=<app>`.
    pub async fn pod_names_for_app(&self, app: &str, namespace: &str) -> HarnessResult<Vec<String>> {
        let pods = self.list_pods(namespace, &app_selector(app)).await?;
        Ok(pods.into_iter().filter_map(|p| p.metadata.name).collect())
    }

    /// `kubectl get pods -l app=<app> -o name`, trimmed.
    ///
    /// An empty `namespace` leaves the namespace to kubectl.
    ///
    /// # Errors
    ///
    /// - [`HarnessError::NotFound`] if no pod matches
    /// - the kubectl error, with the pattern attached, if the query fails
    pub async fn pod_details(&self, app: &str, namespace: &str) -> HarnessResult<String> {
        let selector = app_selector(app);
        let mut args = vec!["pods", "-l", selector.as_str(), "-o", "name"];
        if !namespace.is_empty() {
            args.extend_from_slice(&["-n", namespace]);
        }
        let out = self.get_resource(&args).await.map_err(|report| {
            report.attach_printable(format!(
                "cannot find pod with name like {app} in namespace {namespace}"
            ))
        })?;

        let out = out.trim();
        if out.is_empty() || out.contains(NO_RESOURCES_FOUND) {
            return Err(error_stack::Report::new(HarnessError::not_found(
                "pod",
                format!("{namespace}/{selector}"),
            )));
        }
        Ok(out.to_string())
    }

    /// Host IP of the first pod labelled `app=<app>`.
    pub async fn pod_host_ip(&self, app: &str, namespace: &str) -> HarnessResult<String> {
        let pods = self.list_pods(namespace, &app_selector(app)).await?;
        pods.into_iter()
            .next()
            .and_then(|p| p.status.and_then(|s| s.host_ip))
            .ok_or_else(|| {
                error!(app, namespace, "Cannot get hostIp");
                error_stack::Report::new(HarnessError::not_found(
                    "pod host ip",
                    format!("{namespace}/{}", app_selector(app)),
                ))
            })
    }

    /// Events whose involved object is the pod `name`.
    pub async fn pod_events(&self, name: &str, namespace: &str) -> HarnessResult<Vec<Event>> {
        let api: Api<Event> = Api::namespaced(self.client().clone(), namespace);
        let selector =
            format!("involvedObject.name={name},involvedObject.namespace={namespace}");
        let events = api
            .list(&ListParams::default().fields(&selector))
            .await
            .classify("events", name)?;
        Ok(events.items)
    }

    /// Waits for an event on `name` with `reason` whose message contains `message`.
    pub async fn wait_for_pod_error(
        &self,
        name: &str,
        namespace: &str,
        reason: &str,
        message: &str,
    ) -> HarnessResult<()> {
        self.wait_policy()
            .wait_until(
                &format!("pod {name} in namespace {namespace} to error with reason {reason}"),
                move || async move {
                    let events = self.pod_events(name, namespace).await?;
                    Ok(events.iter().any(|e| {
                        e.reason.as_deref() == Some(reason)
                            && e.message.as_deref().is_some_and(|m| m.contains(message))
                    }))
                },
            )
            .await
    }

    /// Waits until the first pod of `app` reports `phase`.
    pub async fn wait_for_pod_in_phase(
        &self,
        app: &str,
        namespace: &str,
        phase: &str,
    ) -> HarnessResult<()> {
        let selector = app_selector(app);
        let selector = selector.as_str();
        self.wait_policy()
            .wait_until(
                &format!("pod {app} in namespace {namespace} to be {phase}"),
                move || async move {
                    let pods = self.list_pods(namespace, selector).await?;
                    Ok(pods.first().and_then(pod_phase) == Some(phase))
                },
            )
            .await
    }

    /// Waits for at least `min_expected` pods of `app`, then for all of them to
    /// reach `phase`.
    pub async fn check_pod_count_and_phase(
        &self,
        app: &str,
        namespace: &str,
        min_expected: usize,
        phase: &str,
    ) -> HarnessResult<()> {
        if phase.is_empty() {
            return Err(invalid("expected pod phase must not be empty"));
        }
        let selector = app_selector(app);
        let selector = selector.as_str();

        self.wait_policy()
            .wait_until(
                &format!("{min_expected} pods with label {selector}"),
                move || async move {
                    let found = self.list_pods(namespace, selector).await?.len();
                    info!(selector, min_expected, found, "waiting for pods");
                    Ok(found >= min_expected)
                },
            )
            .await?;

        self.wait_policy()
            .wait_until(
                &format!("all pods with label {selector} to be {phase}"),
                move || async move {
                    let pods = self.list_pods(namespace, selector).await?;
                    let pending: Vec<_> = pods
                        .iter()
                        .filter(|p| pod_phase(p) != Some(phase))
                        .filter_map(|p| p.metadata.name.as_deref())
                        .collect();
                    if !pending.is_empty() {
                        info!(?pending, phase, "pods not in expected phase");
                    }
                    Ok(pending.is_empty())
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use similar_asserts::assert_eq;
    use tempfile::TempDir;
    use test_log::test;

    use crate::error::HarnessError;
    use crate::resources::testing::json_response;
    use crate::resources::testing::kubectl_session;
    use crate::resources::testing::list;
    use crate::resources::testing::mock_session;
    use crate::resources::testing::not_found;
    use crate::resources::testing::pod;
    use crate::resources::testing::serve;

    #[test(tokio::test)]
    async fn missing_namespace_counts_zero_pods() {
        let (session, handle) = mock_session(3);
        let server = serve(
            handle,
            vec![("GET", "/api/v1/namespaces/gone/pods", not_found("namespaces", "gone"))],
        );

        let count = session
            .count_pods_with_label("app=rook-ceph-osd", "gone")
            .await
            .expect("not found is zero");
        assert_eq!(count, 0);
        server.await.expect("server task");
    }

    #[test(tokio::test(start_paused = true))]
    async fn pod_count_converges() {
        let (session, handle) = mock_session(5);
        let server = serve(
            handle,
            vec![
                ("GET", "/api/v1/namespaces/rook/pods", list("PodList", vec![pod("mon-a", "Pending")])),
                (
                    "GET",
                    "/api/v1/namespaces/rook/pods",
                    list(
                        "PodList",
                        vec![pod("mon-a", "Running"), pod("mon-b", "Pending")],
                    ),
                ),
            ],
        );

        session
            .wait_for_pod_count("app=rook-ceph-mon", "rook", 2)
            .await
            .expect("count reached");
        server.await.expect("server task");
    }

    #[test(tokio::test(start_paused = true))]
    async fn pod_count_times_out() {
        let (session, handle) = mock_session(2);
        let server = serve(
            handle,
            vec![
                ("GET", "/api/v1/namespaces/rook/pods", list("PodList", vec![])),
                ("GET", "/api/v1/namespaces/rook/pods", list("PodList", vec![])),
            ],
        );

        let report = session
            .wait_for_pod_count("app=rook-ceph-mon", "rook", 1)
            .await
            .expect_err("no pods appear");
        assert!(matches!(
            report.current_context(),
            HarnessError::Timeout { attempts: 2, .. }
        ));
        server.await.expect("server task");
    }

    #[test(tokio::test)]
    async fn deleting_missing_pod_succeeds() {
        let (session, handle) = mock_session(3);
        let server = serve(
            handle,
            vec![("DELETE", "/api/v1/namespaces/rook/pods/osd-0", not_found("pods", "osd-0"))],
        );

        session.delete_pod("osd-0", "rook").await.expect("idempotent delete");
        server.await.expect("server task");
    }

    #[test(tokio::test(start_paused = true))]
    async fn pod_deletion_observed_through_not_found() {
        let (session, handle) = mock_session(5);
        let server = serve(
            handle,
            vec![
                (
                    "GET",
                    "/api/v1/namespaces/rook/pods/osd-0",
                    json_response(200, &pod("osd-0", "Running")),
                ),
                ("GET", "/api/v1/namespaces/rook/pods/osd-0", not_found("pods", "osd-0")),
            ],
        );

        session
            .wait_until_pod_deleted("osd-0", "rook")
            .await
            .expect("pod goes away");
        server.await.expect("server task");
    }

    #[test(tokio::test)]
    async fn host_ip_of_first_pod() {
        let (session, handle) = mock_session(3);
        let server = serve(
            handle,
            vec![(
                "GET",
                "/api/v1/namespaces/rook/pods",
                list("PodList", vec![pod("rgw-0", "Running")]),
            )],
        );

        let ip = session
            .pod_host_ip("rook-ceph-rgw", "rook")
            .await
            .expect("host ip");
        assert_eq!(ip, "192.168.1.20");
        server.await.expect("server task");
    }

    #[test(tokio::test)]
    async fn empty_phase_is_rejected_before_polling() {
        let (session, _handle) = mock_session(3);
        let report = session
            .check_pod_count_and_phase("rook-ceph-osd", "rook", 3, "")
            .await
            .expect_err("validation");
        assert!(matches!(
            report.current_context(),
            HarnessError::Validation { .. }
        ));
    }

    fn event(reason: &str, message: &str) -> serde_json::Value {
        json!({
            "apiVersion": "v1",
            "kind": "Event",
            "metadata": {"name": "osd-0.17a", "namespace": "rook"},
            "involvedObject": {"kind": "Pod", "name": "osd-0", "namespace": "rook"},
            "reason": reason,
            "message": message
        })
    }

    #[test(tokio::test(start_paused = true))]
    async fn named_pod_reaches_running() {
        let (session, handle) = mock_session(5);
        let server = serve(
            handle,
            vec![
                ("GET", "/api/v1/namespaces/rook/pods/osd-0", not_found("pods", "osd-0")),
                ("GET", "/api/v1/namespaces/rook/pods/osd-0", json_response(200, &pod("osd-0", "Pending"))),
                ("GET", "/api/v1/namespaces/rook/pods/osd-0", json_response(200, &pod("osd-0", "Running"))),
            ],
        );

        session
            .wait_for_pod_running("osd-0", "rook")
            .await
            .expect("pod runs");
        server.await.expect("server task");
    }

    #[test(tokio::test(start_paused = true))]
    async fn pod_termination_observed_through_not_found() {
        let (session, handle) = mock_session(5);
        let server = serve(
            handle,
            vec![
                ("GET", "/api/v1/namespaces/rook/pods/osd-0", json_response(200, &pod("osd-0", "Running"))),
                ("GET", "/api/v1/namespaces/rook/pods/osd-0", json_response(200, &pod("osd-0", "Succeeded"))),
                ("GET", "/api/v1/namespaces/rook/pods/osd-0", not_found("pods", "osd-0")),
            ],
        );

        session
            .wait_for_pod_terminated("osd-0", "rook")
            .await
            .expect("pod terminates");
        server.await.expect("server task");
    }

    #[test(tokio::test(start_paused = true))]
    async fn labeled_pod_runs_once_any_pod_is_running() {
        let (session, handle) = mock_session(5);
        let server = serve(
            handle,
            vec![
                ("GET", "/api/v1/namespaces/rook/pods", list("PodList", vec![])),
                ("GET", "/api/v1/namespaces/rook/pods", list("PodList", vec![pod("mgr-a", "Pending")])),
                (
                    "GET",
                    "/api/v1/namespaces/rook/pods",
                    list("PodList", vec![pod("mgr-a", "Pending"), pod("mgr-b", "Running")]),
                ),
            ],
        );

        session
            .wait_for_labeled_pod_to_run("app=rook-ceph-mgr", "rook")
            .await
            .expect("a pod runs");
        server.await.expect("server task");
    }

    #[test(tokio::test(start_paused = true))]
    async fn labeled_pods_drain_to_empty() {
        let (session, handle) = mock_session(5);
        let server = serve(
            handle,
            vec![
                ("GET", "/api/v1/namespaces/rook/pods", list("PodList", vec![pod("mgr-a", "Running")])),
                ("GET", "/api/v1/namespaces/rook/pods", list("PodList", vec![])),
            ],
        );

        session
            .wait_until_pod_with_label_deleted("app=rook-ceph-mgr", "rook")
            .await
            .expect("pods gone");
        server.await.expect("server task");
    }

    #[test(tokio::test(start_paused = true))]
    async fn labeled_pods_gone_with_their_namespace() {
        let (session, handle) = mock_session(5);
        let server = serve(
            handle,
            vec![("GET", "/api/v1/namespaces/gone/pods", not_found("namespaces", "gone"))],
        );

        session
            .wait_until_pod_with_label_deleted("app=rook-ceph-mgr", "gone")
            .await
            .expect("not found counts as deleted");
        server.await.expect("server task");
    }

    #[test(tokio::test(start_paused = true))]
    async fn pod_error_matches_reason_and_message() {
        let (session, handle) = mock_session(5);
        let server = serve(
            handle,
            vec![
                (
                    "GET",
                    "/api/v1/namespaces/rook/events",
                    list("EventList", vec![event("Scheduled", "assigned rook/osd-0")]),
                ),
                (
                    "GET",
                    "/api/v1/namespaces/rook/events",
                    list(
                        "EventList",
                        vec![
                            event("Scheduled", "assigned rook/osd-0"),
                            event("FailedMount", "MountVolume.SetUp failed for volume \"pvc-1\""),
                        ],
                    ),
                ),
            ],
        );

        session
            .wait_for_pod_error("osd-0", "rook", "FailedMount", "MountVolume.SetUp failed")
            .await
            .expect("error event seen");
        server.await.expect("server task");
    }

    #[test(tokio::test(start_paused = true))]
    async fn first_app_pod_reaches_phase() {
        let (session, handle) = mock_session(5);
        let server = serve(
            handle,
            vec![
                ("GET", "/api/v1/namespaces/rook/pods", list("PodList", vec![pod("rgw-0", "Pending")])),
                ("GET", "/api/v1/namespaces/rook/pods", list("PodList", vec![pod("rgw-0", "Failed")])),
            ],
        );

        session
            .wait_for_pod_in_phase("rook-ceph-rgw", "rook", "Failed")
            .await
            .expect("phase reached");
        server.await.expect("server task");
    }

    #[test(tokio::test)]
    async fn pod_details_lists_matching_names() {
        let dir = TempDir::new().expect("tempdir");
        let calls = dir.path().join("calls");
        let script = format!(
            r#"echo "$@" > {calls}; printf 'pod/mon-a\npod/mon-b\n'"#,
            calls = calls.display()
        );
        let (session, _handle) = kubectl_session(dir.path(), &script, 3);

        let details = session
            .pod_details("rook-ceph-mon", "rook")
            .await
            .expect("pods found");
        assert_eq!(details, "pod/mon-a\npod/mon-b");
        assert_eq!(
            fs::read_to_string(&calls).expect("calls recorded").trim(),
            "get pods -l app=rook-ceph-mon -o name -n rook"
        );
    }

    #[test(tokio::test)]
    async fn pod_details_without_matches_is_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let (session, _handle) =
            kubectl_session(dir.path(), "echo 'No resources found in rook namespace.'", 3);

        let report = session
            .pod_details("rook-ceph-mon", "rook")
            .await
            .expect_err("no pods");
        assert!(report.current_context().is_not_found());
    }

    #[test(tokio::test)]
    async fn pod_details_keeps_kubectl_failure() {
        let dir = TempDir::new().expect("tempdir");
        let (session, _handle) = kubectl_session(
            dir.path(),
            "echo 'Unable to connect to the server' >&2; exit 1",
            3,
        );

        let report = session
            .pod_details("rook-ceph-mon", "")
            .await
            .expect_err("kubectl fails");
        assert!(matches!(
            report.current_context(),
            HarnessError::Command { .. }
        ));
    }
}
