//! End-to-end delivery flows against a mock HTTP backend
//!
//! These tests exercise the full pipeline: registry -> dispatcher -> poller
//! -> HTTP client -> file on disk, including restart survival and FIFO
//! ordering across tasks.

use artifact_dl::{
    AlwaysActive, Config, DownloadDispatcher, DownloadTask, HttpJobsApi, Notification,
    NotificationKind, NotificationSink, TaskRegistry,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

struct Harness {
    dispatcher: DownloadDispatcher,
    registry: TaskRegistry,
    sink: Arc<RecordingSink>,
    temp: tempfile::TempDir,
}

fn harness(server: &MockServer) -> Harness {
    let temp = tempfile::tempdir().unwrap();
    harness_at(server, temp)
}

fn harness_at(server: &MockServer, temp: tempfile::TempDir) -> Harness {
    let mut config = Config::default();
    config.api.base_url = server.uri();
    config.polling.interval = POLL_INTERVAL;
    config.delivery.download_dir = temp.path().join("downloads");
    config.persistence.registry_path = temp.path().join("tasks.json");

    let registry = TaskRegistry::open(&config.persistence.registry_path).unwrap();
    let api = Arc::new(HttpJobsApi::new(&config.api).unwrap());
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = DownloadDispatcher::new(
        config,
        registry.clone(),
        api,
        sink.clone(),
        Arc::new(AlwaysActive),
    );

    Harness {
        dispatcher,
        registry,
        sink,
        temp,
    }
}

async fn wait_until_empty(registry: &TaskRegistry) {
    let result = tokio::time::timeout(TEST_TIMEOUT, async {
        while !registry.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "registry did not drain in time");
}

fn status_body(status: &str) -> serde_json::Value {
    serde_json::json!({"status": status})
}

#[tokio::test]
async fn progress_then_success_delivers_the_labeled_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/t1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("PROGRESS")))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/t1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("SUCCESS")))
        .mount(&server)
        .await;
    // No Content-Disposition header: the filename must come from the label.
    // Exactly one fetch is allowed — verified when the server drops.
    Mock::given(method("GET"))
        .and(path("/downloads/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04archive".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let hx = harness(&server);
    hx.registry
        .enqueue(DownloadTask::new("t1", "l1", "Lote Enero"))
        .unwrap();

    let handle = hx.dispatcher.start();
    wait_until_empty(&hx.registry).await;
    hx.dispatcher.shutdown();
    handle.await.unwrap();

    let delivered = hx.temp.path().join("downloads/Lote Enero.zip");
    assert!(delivered.exists(), "artifact must be saved as 'Lote Enero.zip'");
    assert_eq!(std::fs::read(&delivered).unwrap(), b"PK\x03\x04archive");

    let notifications = hx.sink.all();
    assert_eq!(notifications.len(), 1, "one notification for one resolution");
    assert_eq!(notifications[0].kind, NotificationKind::Success);
    assert!(notifications[0].message.contains("Lote Enero"));
}

#[tokio::test]
async fn disposition_filename_overrides_the_label() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/t1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("SUCCESS")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/downloads/t1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"data".to_vec())
                .insert_header("Content-Disposition", "attachment; filename=\"reporte.zip\""),
        )
        .mount(&server)
        .await;

    let hx = harness(&server);
    hx.registry
        .enqueue(DownloadTask::new("t1", "l1", "Lote Enero"))
        .unwrap();

    let handle = hx.dispatcher.start();
    wait_until_empty(&hx.registry).await;
    hx.dispatcher.shutdown();
    handle.await.unwrap();

    assert!(hx.temp.path().join("downloads/reporte.zip").exists());
}

#[tokio::test]
async fn not_found_task_survives_a_restart_and_is_delivered_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/t2/status"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    // First session: the job never materializes; the task must stay queued
    let hx = harness(&server);
    hx.registry
        .enqueue(DownloadTask::new("t2", "l2", "Lote Febrero"))
        .unwrap();

    let handle = hx.dispatcher.start();
    tokio::time::sleep(POLL_INTERVAL * 5).await;
    hx.dispatcher.shutdown();
    handle.await.unwrap();

    assert_eq!(hx.registry.len(), 1, "not-found ticks must not drop the task");
    assert!(
        hx.sink.all().is_empty(),
        "not-found ticks must not notify the user"
    );

    // Simulated reload: a fresh registry and dispatcher over the same
    // snapshot file, now against a server that knows the job
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/jobs/t2/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("SUCCESS")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/downloads/t2"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zip".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let hx2 = harness_at(&server, hx.temp);
    assert_eq!(
        hx2.registry.len(),
        1,
        "the reloaded registry must still track the task"
    );

    let handle = hx2.dispatcher.start();
    wait_until_empty(&hx2.registry).await;
    hx2.dispatcher.shutdown();
    handle.await.unwrap();

    assert!(hx2.temp.path().join("downloads/Lote Febrero.zip").exists());
    let notifications = hx2.sink.all();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Success);
}

#[tokio::test]
async fn failed_head_is_reported_before_the_next_task_is_polled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/t3/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "FAILURE", "error": "SMTP timeout"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/t4/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("SUCCESS")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/downloads/t4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zip".to_vec()))
        .mount(&server)
        .await;
    // t3 failed — its artifact must never be requested
    Mock::given(method("GET"))
        .and(path("/downloads/t3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"zip".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let hx = harness(&server);
    hx.registry
        .enqueue(DownloadTask::new("t3", "l3", "Bulk emails"))
        .unwrap();
    hx.registry
        .enqueue(DownloadTask::new("t4", "l4", "Lote Abril"))
        .unwrap();

    let handle = hx.dispatcher.start();
    wait_until_empty(&hx.registry).await;
    hx.dispatcher.shutdown();
    handle.await.unwrap();

    // One error for t3 (carrying the server message), then one success for t4
    let notifications = hx.sink.all();
    assert_eq!(notifications.len(), 2, "exactly one notification per resolution");
    assert_eq!(notifications[0].kind, NotificationKind::Error);
    assert!(notifications[0].message.contains("SMTP timeout"));
    assert_eq!(notifications[1].kind, NotificationKind::Success);

    // FIFO: t4's status was never queried before t3 was resolved
    let requests = server.received_requests().await.unwrap();
    let status_order: Vec<_> = requests
        .iter()
        .map(|r| r.url.path().to_string())
        .filter(|p| p.starts_with("/jobs/"))
        .collect();
    let last_t3 = status_order.iter().rposition(|p| p == "/jobs/t3/status").unwrap();
    let first_t4 = status_order.iter().position(|p| p == "/jobs/t4/status").unwrap();
    assert!(
        last_t3 < first_t4,
        "t4 polled before t3 resolved; order: {status_order:?}"
    );

    assert!(hx.temp.path().join("downloads/Lote Abril.zip").exists());
}

#[tokio::test]
async fn clearing_the_registry_stops_further_polling_of_its_tasks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/t5/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("PROGRESS")))
        .mount(&server)
        .await;

    let hx = harness(&server);
    hx.registry
        .enqueue(DownloadTask::new("t5", "l5", "Lote Mayo"))
        .unwrap();

    let handle = hx.dispatcher.start();
    tokio::time::sleep(POLL_INTERVAL * 3).await;

    // Session end: the consumer clears its pending tasks
    hx.registry.clear().unwrap();
    tokio::time::sleep(POLL_INTERVAL * 2).await;
    let polls_at_clear = server.received_requests().await.unwrap().len();

    tokio::time::sleep(POLL_INTERVAL * 5).await;
    let polls_after = server.received_requests().await.unwrap().len();
    assert!(
        polls_after <= polls_at_clear + 1,
        "a cleared task must not keep being polled ({polls_at_clear} -> {polls_after})"
    );

    hx.dispatcher.shutdown();
    handle.await.unwrap();
}
