use docflow::concurrency::channel::{Channel, LocalChannel};
use docflow::concurrency::shutdown::{ShutdownResult, create_shutdown_channel};
use docflow::concurrency::signal::Latch;
use docflow::queue::{InputQueue, OutputQueue};
use docflow::test_utils::wait::{drain, within};
use docflow::workers::{FanOutStage, NoMoreOutput, StageOutcome, WorkerPool};
use docflow_config::shared::QueueConfig;
use docflow_telemetry::tracing::init_test_tracing;

fn paths(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn scanned_paths_reach_both_destinations_in_order() {
    init_test_tracing();
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let config = QueueConfig::default();

    let q1 = LocalChannel::new("Q1", config.capacity);
    let q2 = LocalChannel::new("Q2", config.capacity);
    let q3 = LocalChannel::new("Q3", config.capacity);

    let scanner = OutputQueue::new(q1.clone().into_ref(), shutdown_rx.clone());
    let input = InputQueue::consuming(&scanner, &config, shutdown_rx.clone());
    let stage = FanOutStage::new("fan-out", input, shutdown_rx);
    stage.add_output(q2.clone().into_ref());
    stage.add_output(q3.clone().into_ref());
    let stage_done = stage.no_more_output().clone();

    for path in ["/a", "/b", "/c"] {
        let result = scanner.put(path.to_string()).await.unwrap();
        assert_eq!(result, ShutdownResult::Ok(()));
    }
    scanner.no_more_output().signal();

    let mut pool = WorkerPool::new();
    pool.spawn(stage);
    let report = within(pool.wait_all()).await.unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.succeeded, vec!["fan-out".to_string()]);
    assert!(stage_done.is_signalled());
    assert_eq!(drain(&q2).await, paths(&["/a", "/b", "/c"]));
    assert_eq!(drain(&q3).await, paths(&["/a", "/b", "/c"]));
}

#[tokio::test(flavor = "multi_thread")]
async fn chained_stages_run_concurrently_in_a_pool() {
    init_test_tracing();
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let config = QueueConfig {
        capacity: 8,
        ..QueueConfig::default()
    };

    let source = LocalChannel::new("scan-output", config.capacity);
    let source_done = Latch::one_shot();
    let parse_input = LocalChannel::new("parse-input", 1_000);
    let index_input = LocalChannel::new("index-input", 1_000);

    let scan = FanOutStage::new(
        "scan",
        InputQueue::new(
            source.clone().into_ref(),
            source_done.clone(),
            &config,
            shutdown_rx.clone(),
        ),
        shutdown_rx.clone(),
    );
    let extract = FanOutStage::downstream_of(&scan, "extract", &config, shutdown_rx.clone());
    extract.add_output(parse_input.clone().into_ref());
    extract.add_output(index_input.clone().into_ref());
    let extract_done = extract.no_more_output().clone();

    let mut pool = WorkerPool::new();
    pool.spawn(scan);
    pool.spawn(extract);

    // The channels hold fewer elements than produced, so puts rely on the stages draining them.
    let expected: Vec<String> = (0..200).map(|i| format!("/docs/{i}.pdf")).collect();
    for path in &expected {
        source.put(path.clone()).await.unwrap();
    }
    source_done.signal();

    let report = within(pool.wait_all()).await.unwrap();
    assert_eq!(report.succeeded.len(), 2);
    assert!(extract_done.is_signalled());
    assert_eq!(drain(&parse_input).await, expected);
    assert_eq!(drain(&index_input).await, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_stops_every_stage_of_the_pool() {
    init_test_tracing();
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let config = QueueConfig::default();

    let mut pool = WorkerPool::new();
    let mut latches = Vec::new();
    for i in 0..3 {
        let input = InputQueue::new(
            LocalChannel::<String>::new(format!("source-{i}"), 4).into_ref(),
            Latch::one_shot(),
            &config,
            shutdown_rx.clone(),
        );
        let stage = FanOutStage::new(format!("stage-{i}"), input, shutdown_rx.clone());
        latches.push(stage.no_more_output().clone());
        pool.spawn(stage);
    }

    shutdown_tx.shutdown();
    let report = within(pool.wait_all()).await.unwrap();

    assert_eq!(report.failed.len(), 3);
    assert!(latches.iter().all(|latch| !latch.is_signalled()));
}
