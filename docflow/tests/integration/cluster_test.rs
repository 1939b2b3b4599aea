use docflow::cluster::{Coordinator, MemoryCluster};
use docflow::concurrency::channel::LocalChannel;
use docflow::concurrency::shutdown::{ShutdownRx, create_shutdown_channel};
use docflow::concurrency::signal::Latch;
use docflow::error::ErrorKind;
use docflow::queue::{InputQueue, OutputQueue};
use docflow::test_utils::wait::{drain, within};
use docflow::workers::{CompletionBridge, FanOutStage, NoMoreOutput, StageOutcome, WorkerPool};
use docflow_config::shared::{BridgeConfig, ClusterConfig, QueueConfig};
use docflow_telemetry::tracing::init_test_tracing;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SCAN_OUTPUT: &str = "scan-output";
const SCAN_DONE: &str = "scan-done";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ScannedDocument {
    path: String,
}

impl ScannedDocument {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }
}

fn fast_polling() -> ClusterConfig {
    ClusterConfig {
        member_poll_interval_ms: 50,
        ..ClusterConfig::member()
    }
}

/// Scanner process: puts `paths` into the cluster queue and announces completion.
async fn run_scanner(coordinator: &Coordinator, paths: &[&str], producers: u64) {
    let channel = coordinator
        .channel::<ScannedDocument>(SCAN_OUTPUT)
        .await
        .unwrap();
    let scan_done = coordinator
        .cluster_latch_with_count(SCAN_DONE, producers)
        .await
        .unwrap();

    let output = OutputQueue::new(channel.into_ref(), ShutdownRx::never());
    for path in paths {
        output.put(ScannedDocument::new(path)).await.unwrap();
    }
    output.no_more_output().signal();

    let announce = CompletionBridge::announce(
        &output_stage(&output),
        scan_done,
        &BridgeConfig::default(),
        ShutdownRx::never(),
    );
    assert_eq!(within(announce.run()).await, StageOutcome::Success);
}

/// Exposes the completion latch of a producer as a stage latch.
struct ProducerStage(Latch);

impl NoMoreOutput for ProducerStage {
    fn no_more_output(&self) -> &Latch {
        &self.0
    }
}

fn output_stage<T>(output: &OutputQueue<T>) -> ProducerStage
where
    T: Clone + Send + 'static,
{
    ProducerStage(output.no_more_output().clone())
}

#[tokio::test(flavor = "multi_thread")]
async fn documents_cross_processes_and_completion_follows() {
    init_test_tracing();
    let cluster = MemoryCluster::new();
    let scanner = Coordinator::connect(&ClusterConfig::member(), &cluster)
        .await
        .unwrap();
    let indexer = Coordinator::connect(&ClusterConfig::member(), &cluster)
        .await
        .unwrap();
    scanner.set_local_member_role("SCAN").await.unwrap();
    indexer.set_local_member_role("INDEX").await.unwrap();

    // The indexer learns that scanning is over through a bridge into a local latch.
    let scan_finished = Latch::one_shot();
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let source = indexer
        .channel::<ScannedDocument>(SCAN_OUTPUT)
        .await
        .unwrap();
    let input = InputQueue::new(
        source.into_ref(),
        scan_finished.clone(),
        &QueueConfig::default(),
        shutdown_rx.clone(),
    );
    let stage = FanOutStage::new("index-fan-out", input, shutdown_rx.clone());
    let index_queue = LocalChannel::new("index-queue", 16);
    stage.add_output(index_queue.clone().into_ref());

    let release = CompletionBridge::cluster_to_local(
        indexer.cluster_latch(SCAN_DONE).await.unwrap(),
        scan_finished.clone(),
        &BridgeConfig::default(),
        shutdown_rx,
    );

    let mut pool = WorkerPool::new();
    pool.spawn(release);
    pool.spawn(stage);

    run_scanner(&scanner, &["/a", "/b", "/c"], 1).await;

    let report = within(pool.wait_all()).await.unwrap();
    assert!(report.all_succeeded());
    assert!(scan_finished.is_signalled());
    assert_eq!(
        drain(&index_queue).await,
        vec![
            ScannedDocument::new("/a"),
            ScannedDocument::new("/b"),
            ScannedDocument::new("/c"),
        ]
    );

    scanner.shutdown().await.unwrap();
    indexer.shutdown().await.unwrap();
    assert_eq!(cluster.member_count().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn peers_wait_for_each_other_by_role() {
    init_test_tracing();
    let cluster = MemoryCluster::new();
    let waiting = Coordinator::connect(&fast_polling(), &cluster)
        .await
        .unwrap();
    waiting.set_local_member_role("PARSE").await.unwrap();

    let joining = tokio::spawn({
        let cluster = cluster.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let coordinator = Coordinator::connect(&ClusterConfig::member(), &cluster)
                .await
                .unwrap();
            coordinator.set_local_member_role("INDEX").await.unwrap();
            coordinator
        }
    });

    let joined = waiting
        .await_member_joins("INDEX", Duration::from_secs(10), &ShutdownRx::never())
        .await;
    assert!(joined);

    let members = waiting.members().await.unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members.iter().filter(|member| member.local).count(), 1);

    joining.await.unwrap().shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn client_mode_needs_a_running_cluster() {
    init_test_tracing();
    let cluster = MemoryCluster::new();

    let err = Coordinator::connect(&ClusterConfig::client(), &cluster)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);

    let member = Coordinator::connect(&ClusterConfig::member(), &cluster)
        .await
        .unwrap();
    let client = Coordinator::connect(&ClusterConfig::client(), &cluster)
        .await
        .unwrap();

    // Clients can still use shared resources.
    let channel = client.channel::<ScannedDocument>(SCAN_OUTPUT).await.unwrap();
    let output = OutputQueue::new(channel.into_ref(), ShutdownRx::never());
    output.put(ScannedDocument::new("/a")).await.unwrap();
    let from_member = member.channel::<ScannedDocument>(SCAN_OUTPUT).await.unwrap();
    assert_eq!(from_member.len().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn crashed_member_loses_elements_but_consumers_still_terminate() {
    init_test_tracing();
    let cluster = MemoryCluster::new();
    let consumer = Coordinator::connect(&ClusterConfig::member(), &cluster)
        .await
        .unwrap();
    let survivor = Coordinator::connect(&ClusterConfig::member(), &cluster)
        .await
        .unwrap();
    let victim = Coordinator::connect(&ClusterConfig::member(), &cluster)
        .await
        .unwrap();
    let victim_id = victim
        .members()
        .await
        .unwrap()
        .into_iter()
        .find(|member| member.local)
        .map(|member| member.id)
        .unwrap();

    // Both producers finish and announce before anything is consumed.
    run_scanner(&survivor, &["/kept/1", "/kept/2"], 2).await;
    run_scanner(&victim, &["/lost/1"], 2).await;
    assert_eq!(cluster.crash_member(victim_id).await, 1);

    let scan_finished = Latch::one_shot();
    let release = CompletionBridge::cluster_to_local(
        consumer.cluster_latch(SCAN_DONE).await.unwrap(),
        scan_finished.clone(),
        &BridgeConfig::default(),
        ShutdownRx::never(),
    );
    assert_eq!(within(release.run()).await, StageOutcome::Success);

    let input = InputQueue::new(
        consumer
            .channel::<ScannedDocument>(SCAN_OUTPUT)
            .await
            .unwrap()
            .into_ref(),
        scan_finished,
        &QueueConfig::default(),
        ShutdownRx::never(),
    );
    let stage = FanOutStage::new("consumer", input, ShutdownRx::never());
    let sink = LocalChannel::new("sink", 16);
    stage.add_output(sink.clone().into_ref());

    assert_eq!(within(stage.run()).await, StageOutcome::Success);
    assert_eq!(
        drain(&sink).await,
        vec![
            ScannedDocument::new("/kept/1"),
            ScannedDocument::new("/kept/2"),
        ]
    );
}
