use std::time::Duration;

use cluster_harness::kubectl::Kubectl;
use cluster_harness::ClusterSession;
use cluster_harness::HarnessError;
use cluster_harness::WaitPolicy;
use http::Request;
use http::Response;
use hyper::Body;
use kube::Client;
use serde_json::json;
use serde_json::Value;
use similar_asserts::assert_eq;
use test_log::test;
use tokio::time::Instant;
use tower_test::mock;

fn respond(status: u16, body: Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::from(body.to_string()))
        .expect("response")
}

fn pod_list(count: usize) -> Value {
    let items: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": {"name": format!("osd-{i}"), "namespace": "rook"},
                "status": {"phase": "Running"}
            })
        })
        .collect();
    json!({"kind": "PodList", "apiVersion": "v1", "metadata": {}, "items": items})
}

fn session(attempts: u32) -> (ClusterSession, mock::Handle<Request<Body>, Response<Body>>) {
    let (service, handle) = mock::pair::<Request<Body>, Response<Body>>();
    let wait = WaitPolicy::new(attempts, Duration::from_secs(5)).expect("valid policy");
    let session = ClusterSession::from_parts(
        Client::new(service, "default"),
        Kubectl::new("kubectl"),
        wait,
    );
    (session, handle)
}

#[test(tokio::test(start_paused = true))]
async fn pod_count_converges_after_scale_up() {
    let (session, mut handle) = session(10);
    let server = tokio::spawn(async move {
        for count in [1, 2, 3] {
            let (request, send) = handle.next_request().await.expect("list request");
            assert!(request
                .uri()
                .to_string()
                .starts_with("/api/v1/namespaces/rook/pods?"));
            send.send_response(respond(200, pod_list(count)));
        }
    });

    let started = Instant::now();
    session
        .wait_for_pod_count("app=rook-ceph-osd", "rook", 3)
        .await
        .expect("three pods");
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    server.await.expect("server task");
}

#[test(tokio::test(start_paused = true))]
async fn pod_count_times_out_after_budget() {
    let (session, mut handle) = session(3);
    let server = tokio::spawn(async move {
        for _ in 0..3 {
            let (_, send) = handle.next_request().await.expect("list request");
            send.send_response(respond(200, pod_list(1)));
        }
    });

    let started = Instant::now();
    let report = session
        .wait_for_pod_count("app=rook-ceph-osd", "rook", 3)
        .await
        .expect_err("never converges");
    assert!(matches!(
        report.current_context(),
        HarnessError::Timeout { attempts: 3, .. }
    ));
    assert_eq!(started.elapsed(), session.wait_policy().budget());
    server.await.expect("server task");
}

#[test(tokio::test)]
async fn server_version_reads_git_version() {
    let (session, mut handle) = session(3);
    let server = tokio::spawn(async move {
        let (request, send) = handle.next_request().await.expect("version request");
        assert_eq!(request.uri().path(), "/version");
        send.send_response(respond(
            200,
            json!({
                "major": "1",
                "minor": "28",
                "gitVersion": "v1.28.3",
                "gitCommit": "a8a1abc25cad87333840cd7d54be2efaf31a3177",
                "gitTreeState": "clean",
                "buildDate": "2023-10-18T11:33:18Z",
                "goVersion": "go1.20.10",
                "compiler": "gc",
                "platform": "linux/amd64"
            }),
        ));
    });

    assert_eq!(session.server_version().await.expect("version"), "v1.28.3");
    server.await.expect("server task");
}
