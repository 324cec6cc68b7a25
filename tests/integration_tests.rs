//! Integration tests for workflow coordination
//!
//! These tests drive full runs end-to-end using mock tools, a recording
//! object store and a recording metrics sink.

use async_trait::async_trait;
use opsflow_rs::kit::{OpsflowError, Result, Tool};
use opsflow_rs::opsflow::config::{CoordinatorConfig, NamedQuery};
use opsflow_rs::opsflow::metrics::MetricsSink;
use opsflow_rs::opsflow::scheduler::Scheduler;
use opsflow_rs::opsflow::tools::storage::{FilesystemStore, ObjectStorageTool, ObjectStore};
use opsflow_rs::opsflow::tools::Toolset;
use opsflow_rs::opsflow::workflow::{
    ExecutionMode, RunStatus, Step, StepStatus, WorkflowCoordinator, WorkflowEvent,
    WorkflowState,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

// ============================================================================
// Mock Components
// ============================================================================

/// Mock tool that returns a fixed output
struct FixedTool {
    name: String,
    output: String,
}

impl FixedTool {
    fn new(name: &str, output: Value) -> Self {
        Self {
            name: name.to_string(),
            output: output.to_string(),
        }
    }
}

#[async_trait]
impl Tool for FixedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Mock tool returning a fixed output"
    }

    async fn run(&self, _command: &str) -> Result<String> {
        Ok(self.output.clone())
    }
}

/// Mock tool that fails its first `failures` calls, then succeeds
struct FlakyTool {
    failures: AtomicU32,
    output: String,
    calls: AtomicU32,
}

impl FlakyTool {
    fn new(failures: u32, output: Value) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            output: output.to_string(),
            calls: AtomicU32::new(0),
        }
    }

    fn always_failing() -> Self {
        Self::new(u32::MAX, json!({}))
    }
}

#[async_trait]
impl Tool for FlakyTool {
    fn name(&self) -> &str {
        "flaky"
    }

    fn description(&self) -> &str {
        "Mock tool failing a fixed number of times"
    }

    async fn run(&self, _command: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(OpsflowError::api("prometheus", "connection refused"));
        }
        Ok(self.output.clone())
    }
}

/// Mock tool that panics
struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "panicking"
    }

    fn description(&self) -> &str {
        "Mock tool that panics"
    }

    async fn run(&self, _command: &str) -> Result<String> {
        panic!("log parser exploded");
    }
}

/// Mock tool that records how many calls overlap
struct SlowTool {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SlowTool {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn description(&self) -> &str {
        "Mock tool that sleeps"
    }

    async fn run(&self, _command: &str) -> Result<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(json!({"summary": {"total_errors": 0}}).to_string())
    }
}

/// Metrics sink that records every push
#[derive(Default)]
struct RecordingSink {
    pushes: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingSink {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn pushes(&self) -> Vec<(String, String)> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetricsSink for RecordingSink {
    async fn push(&self, job: &str, payload: &str) -> Result<()> {
        self.pushes
            .lock()
            .unwrap()
            .push((job.to_string(), payload.to_string()));
        if self.fail {
            return Err(OpsflowError::api("pushgateway", "503 Service Unavailable"));
        }
        Ok(())
    }
}

/// Object store that keeps uploads in memory
#[derive(Default)]
struct RecordingStore {
    objects: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl RecordingStore {
    fn objects(&self) -> Vec<(String, String, Vec<u8>)> {
        self.objects.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.objects
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string(), body));
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

const LOG_SUMMARY: &str = r#"{"summary":{"total_files":1,"total_lines":10,"total_errors":2,"total_warnings":1},"files":[]}"#;

fn log_summary() -> Value {
    serde_json::from_str(LOG_SUMMARY).unwrap()
}

fn up_response() -> Value {
    json!({"status": "success", "data": {"up": 1}})
}

struct Harness {
    coordinator: Arc<WorkflowCoordinator>,
    sink: Arc<RecordingSink>,
    store: Arc<RecordingStore>,
    dir: TempDir,
}

impl Harness {
    fn reports_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("reports")
    }

    fn analysis_files(&self) -> Vec<std::path::PathBuf> {
        match std::fs::read_dir(self.reports_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("analysis_"))
                })
                .collect(),
            Err(_) => vec![],
        }
    }
}

struct HarnessBuilder {
    mode: ExecutionMode,
    retry_failed_steps: bool,
    logs: Arc<dyn Tool>,
    prometheus: Arc<dyn Tool>,
    sink: Arc<RecordingSink>,
    bucket: Option<String>,
}

impl HarnessBuilder {
    fn new() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            retry_failed_steps: false,
            logs: Arc::new(FixedTool::new("logs", log_summary())),
            prometheus: Arc::new(FixedTool::new("prometheus", up_response())),
            sink: Arc::new(RecordingSink::default()),
            bucket: Some("ops-reports".to_string()),
        }
    }

    fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    fn retry_failed_steps(mut self) -> Self {
        self.retry_failed_steps = true;
        self
    }

    fn logs(mut self, tool: Arc<dyn Tool>) -> Self {
        self.logs = tool;
        self
    }

    fn prometheus(mut self, tool: Arc<dyn Tool>) -> Self {
        self.prometheus = tool;
        self
    }

    fn sink(mut self, sink: RecordingSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    fn no_bucket(mut self) -> Self {
        self.bucket = None;
        self
    }

    fn build(self) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let config = CoordinatorConfig {
            reports_dir: dir.path().join("reports"),
            s3_bucket: self.bucket,
            mode: self.mode,
            retry_failed_steps: self.retry_failed_steps,
            queries: vec![NamedQuery::new("up_status", "up")],
            ..CoordinatorConfig::default()
        };

        let store = Arc::new(RecordingStore::default());
        let tools = Toolset::new(
            self.logs,
            self.prometheus,
            Arc::new(ObjectStorageTool::new(store.clone())),
            self.sink.clone(),
        );

        Harness {
            coordinator: Arc::new(WorkflowCoordinator::new(config, tools)),
            sink: self.sink,
            store,
            dir,
        }
    }
}

// ============================================================================
// Sequential Mode
// ============================================================================

#[tokio::test]
async fn test_sequential_run_completes_all_steps() {
    let h = HarnessBuilder::new().build();

    let result = h.coordinator.run_workflow().await;

    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.error.is_none());
    for step in Step::PIPELINE {
        let sub = result.step(step).expect("sub-result present");
        assert_eq!(sub.status, StepStatus::Completed, "{} not completed", step);
    }
    assert_eq!(result.log_analysis.as_ref().unwrap().data, Some(log_summary()));
    assert_eq!(
        result.monitoring.as_ref().unwrap().data,
        Some(json!({"up_status": up_response()}))
    );

    let snapshot = h.coordinator.metrics().snapshot();
    assert_eq!(snapshot.total_executions, 1);
    assert_eq!(snapshot.failures_total, 0);
    assert!(snapshot.last_success_timestamp.is_some());
    assert!(snapshot.last_failure_timestamp.is_none());
    assert_eq!(snapshot.step_durations.len(), 4);

    let pushes = h.sink.pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].0, "workflow_coordinator");
    assert!(pushes[0].1.contains("workflow_total_executions 1"));
}

#[tokio::test]
async fn test_analysis_file_contains_upstream_data() {
    let h = HarnessBuilder::new().build();

    let result = h.coordinator.run_workflow().await;
    assert!(result.is_completed());

    let files = h.analysis_files();
    assert_eq!(files.len(), 1);
    let file_path = result.analytics.as_ref().unwrap().file_path.clone().unwrap();
    assert_eq!(std::path::PathBuf::from(&file_path), files[0]);

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert_eq!(written["log_analysis"], log_summary());
    assert_eq!(written["monitoring"]["up_status"], up_response());
    let stamp = written["timestamp"].as_str().unwrap();
    assert_eq!(stamp.len(), "20240101_120000".len());
    assert_eq!(
        files[0].file_name().unwrap().to_str().unwrap(),
        format!("analysis_{}.json", stamp)
    );
}

#[tokio::test]
async fn test_report_uploaded_with_analytics_content() {
    let h = HarnessBuilder::new().build();

    let result = h.coordinator.run_workflow().await;
    assert!(result.is_completed());

    let objects = h.store.objects();
    assert_eq!(objects.len(), 1);
    let (bucket, key, body) = &objects[0];
    assert_eq!(bucket, "ops-reports");
    assert!(key.starts_with("reports/report_"));
    assert!(key.ends_with(".json"));

    let uploaded: Value = serde_json::from_slice(body).unwrap();
    assert_eq!(
        Some(uploaded),
        result.analytics.as_ref().unwrap().data.clone()
    );
    assert_eq!(result.reporting.as_ref().unwrap().s3_path.as_deref(), Some(key.as_str()));
}

#[tokio::test]
async fn test_sequential_failure_aborts_remaining_steps() {
    let h = HarnessBuilder::new()
        .prometheus(Arc::new(FlakyTool::always_failing()))
        .build();

    let result = h.coordinator.run_workflow().await;

    assert_eq!(result.status, RunStatus::Failed);
    let error = result.error.clone().unwrap();
    assert!(error.contains("connection refused"));
    assert_eq!(result.log_analysis.as_ref().unwrap().status, StepStatus::Completed);
    assert!(result.monitoring.is_none());
    assert!(result.analytics.is_none());
    assert!(result.reporting.is_none());
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].step, Step::Monitoring);

    assert!(h.analysis_files().is_empty());
    assert!(h.store.objects().is_empty());

    let snapshot = h.coordinator.metrics().snapshot();
    assert_eq!(snapshot.total_executions, 1);
    assert_eq!(snapshot.failures_total, 1);
    assert_eq!(snapshot.step_failures.get(&Step::Monitoring), Some(&1));
    assert!(snapshot.last_failure_timestamp.is_some());
    assert_eq!(h.sink.pushes().len(), 1);
}

#[tokio::test]
async fn test_missing_bucket_fails_reporting() {
    let h = HarnessBuilder::new().no_bucket().build();

    let result = h.coordinator.run_workflow().await;

    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.error.unwrap().contains("Bucket name is required"));
    assert_eq!(result.errors[0].step, Step::Reporting);
    assert_eq!(h.analysis_files().len(), 1);
}

#[tokio::test]
async fn test_repeated_runs_are_equivalent() {
    let h = HarnessBuilder::new().build();

    let first = h.coordinator.run_workflow().await;
    let second = h.coordinator.run_workflow().await;

    assert_eq!(first.status, second.status);
    for step in Step::PIPELINE {
        assert_eq!(
            first.step(step).map(|r| r.status),
            second.step(step).map(|r| r.status)
        );
    }
    assert_eq!(first.log_analysis.unwrap().data, second.log_analysis.unwrap().data);
    assert_eq!(first.monitoring.unwrap().data, second.monitoring.unwrap().data);

    let first_analytics = first.analytics.unwrap().data.unwrap();
    let second_analytics = second.analytics.unwrap().data.unwrap();
    assert_eq!(first_analytics["log_analysis"], second_analytics["log_analysis"]);
    assert_eq!(first_analytics["monitoring"], second_analytics["monitoring"]);

    assert_eq!(h.coordinator.metrics().snapshot().total_executions, 2);
    assert_eq!(h.sink.pushes().len(), 2);
}

#[tokio::test]
async fn test_panic_in_step_becomes_failed_result() {
    let h = HarnessBuilder::new().logs(Arc::new(PanickingTool)).build();

    let result = h.coordinator.run_workflow().await;

    assert_eq!(result.status, RunStatus::Failed);
    let error = result.error.unwrap();
    assert!(error.contains("panicked"));
    assert!(error.contains("log parser exploded"));
    assert_eq!(result.errors[0].step, Step::LogAnalysis);

    let snapshot = h.coordinator.metrics().snapshot();
    assert_eq!(snapshot.failures_total, 1);
    assert_eq!(snapshot.step_failures.get(&Step::LogAnalysis), Some(&1));
    assert_eq!(snapshot.step_durations[&Step::LogAnalysis].count, 1);
    assert!(h.sink.pushes()[0]
        .1
        .contains("workflow_step_failures_total{step=\"log_analysis\"} 1"));
    assert_eq!(h.sink.pushes().len(), 1);
}

#[tokio::test]
async fn test_push_failure_does_not_fail_run() {
    let h = HarnessBuilder::new().sink(RecordingSink::failing()).build();

    let result = h.coordinator.run_workflow().await;

    assert!(result.is_completed());
    assert_eq!(h.sink.pushes().len(), 1);
}

// ============================================================================
// Graph Mode
// ============================================================================

#[tokio::test]
async fn test_graph_run_completes() {
    let h = HarnessBuilder::new().mode(ExecutionMode::Graph).build();

    let result = h.coordinator.run_workflow().await;

    assert!(result.is_completed());
    assert_eq!(result.mode, ExecutionMode::Graph);
    assert_eq!(result.retry_count, 0);
    for step in Step::PIPELINE {
        assert_eq!(result.step(step).unwrap().status, StepStatus::Completed);
    }
    assert_eq!(h.store.objects().len(), 1);
}

#[tokio::test]
async fn test_graph_error_handler_ends_run_by_default() {
    let prometheus = Arc::new(FlakyTool::new(1, up_response()));
    let h = HarnessBuilder::new()
        .mode(ExecutionMode::Graph)
        .prometheus(prometheus.clone())
        .build();

    let result = h.coordinator.run_workflow().await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.retry_count, 1);
    assert!(result.error.unwrap().contains("Component monitoring failed"));
    assert!(result.analytics.is_none());
    assert_eq!(prometheus.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_graph_retry_recovers_flaky_step() {
    let prometheus = Arc::new(FlakyTool::new(1, up_response()));
    let h = HarnessBuilder::new()
        .mode(ExecutionMode::Graph)
        .retry_failed_steps()
        .prometheus(prometheus.clone())
        .build();

    let result = h.coordinator.run_workflow().await;

    assert!(result.is_completed(), "unexpected error: {:?}", result.error);
    assert_eq!(result.retry_count, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.monitoring.unwrap().status, StepStatus::Completed);
    assert_eq!(prometheus.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.coordinator.metrics().snapshot().failures_total, 0);
}

#[tokio::test]
async fn test_graph_retry_ceiling() {
    let prometheus = Arc::new(FlakyTool::always_failing());
    let h = HarnessBuilder::new()
        .mode(ExecutionMode::Graph)
        .retry_failed_steps()
        .prometheus(prometheus.clone())
        .build();

    let result = h.coordinator.run_workflow().await;

    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.retry_count, 3);
    let error = result.error.unwrap();
    assert!(error.contains("failed after 3 retries"));
    assert!(error.contains("connection refused"));
    assert_eq!(prometheus.calls.load(Ordering::SeqCst), 3);

    let snapshot = h.coordinator.metrics().snapshot();
    assert_eq!(snapshot.failures_total, 1);
    assert_eq!(snapshot.step_failures.get(&Step::Monitoring), Some(&3));
    assert_eq!(h.sink.pushes().len(), 1);
}

#[tokio::test]
async fn test_handle_error_ceiling() {
    let h = HarnessBuilder::new().build();
    let mut state = WorkflowState::new();

    let verdicts: Vec<StepStatus> = (0..3)
        .map(|_| {
            state.record_error(Step::Analytics, "disk full");
            h.coordinator.handle_error(&mut state)
        })
        .collect();

    assert_eq!(
        verdicts,
        vec![StepStatus::Retry, StepStatus::Retry, StepStatus::Failed]
    );
    assert_eq!(
        state.final_error(),
        Some("Component analytics failed after 3 retries: disk full")
    );
}

// ============================================================================
// Events, Concurrency, Scheduling
// ============================================================================

#[tokio::test]
async fn test_events_cover_the_run() {
    let h = HarnessBuilder::new().build();
    let (tx, mut rx) = mpsc::channel(64);

    let result = h.coordinator.run_workflow_with_events(Some(tx)).await;
    assert!(result.is_completed());

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(events.first(), Some(WorkflowEvent::RunStarted { .. })));
    match events.last() {
        Some(WorkflowEvent::RunFinished { result }) => assert!(result.is_completed()),
        other => panic!("unexpected last event: {:?}", other),
    }
    let started: Vec<Step> = events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::StepStarted { step } => Some(*step),
            _ => None,
        })
        .collect();
    assert_eq!(started, Step::PIPELINE.to_vec());
}

#[tokio::test]
async fn test_concurrent_runs_are_serialized() {
    let slow = Arc::new(SlowTool::new());
    let h = HarnessBuilder::new().logs(slow.clone()).build();

    let a = h.coordinator.clone();
    let b = h.coordinator.clone();
    let (first, second) = tokio::join!(
        async move { a.run_workflow().await },
        async move { b.run_workflow().await }
    );

    assert!(first.is_completed());
    assert!(second.is_completed());
    assert_eq!(slow.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(h.coordinator.metrics().snapshot().total_executions, 2);
    assert!(h.coordinator.last_result().await.is_some());
}

#[tokio::test]
async fn test_scheduler_stops_on_shutdown() {
    let h = HarnessBuilder::new().build();
    let scheduler = Scheduler::new(h.coordinator.clone(), Duration::from_secs(3600));

    let cycles = scheduler
        .run(tokio::time::sleep(Duration::from_millis(50)))
        .await;

    assert_eq!(cycles, 1);
    assert_eq!(h.sink.pushes().len(), 1);
}

#[tokio::test]
async fn test_filesystem_store_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoordinatorConfig {
        reports_dir: dir.path().join("reports"),
        s3_bucket: Some("ops-reports".to_string()),
        queries: vec![NamedQuery::new("up_status", "up")],
        ..CoordinatorConfig::default()
    };
    let uploads = dir.path().join("uploads");
    let tools = Toolset::new(
        Arc::new(FixedTool::new("logs", log_summary())),
        Arc::new(FixedTool::new("prometheus", up_response())),
        Arc::new(ObjectStorageTool::new(Arc::new(FilesystemStore::new(&uploads)))),
        Arc::new(RecordingSink::default()),
    );
    let coordinator = WorkflowCoordinator::new(config, tools);

    let result = coordinator.run_workflow().await;
    assert!(result.is_completed());

    let key = result.reporting.unwrap().s3_path.unwrap();
    let stored = std::fs::read_to_string(uploads.join("ops-reports").join(&key)).unwrap();
    let stored: Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(stored["monitoring"]["up_status"], up_response());
}
