use docflow::concurrency::channel::{Channel, LocalChannel};
use docflow::concurrency::shutdown::ShutdownRx;
use docflow::concurrency::signal::Latch;
use docflow::failpoints::FAN_OUT_BEFORE_PUT;
use docflow::queue::InputQueue;
use docflow::test_utils::wait::{drain, within};
use docflow::workers::{FanOutStage, StageOutcome};
use docflow_config::shared::QueueConfig;
use docflow_telemetry::tracing::init_test_tracing;
use fail::FailScenario;

fn paths(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

async fn fan_out(elements: &[&str], destinations: &[&LocalChannel<String>]) -> StageOutcome {
    let source = LocalChannel::new("source", 64);
    let done = Latch::one_shot();
    let input = InputQueue::new(
        source.clone().into_ref(),
        done.clone(),
        &QueueConfig::default(),
        ShutdownRx::never(),
    );
    let stage = FanOutStage::new("fan-out", input, ShutdownRx::never());
    for destination in destinations {
        stage.add_output((*destination).clone().into_ref());
    }

    for element in elements {
        source.put(element.to_string()).await.unwrap();
    }
    done.signal();

    within(stage.run()).await
}

#[tokio::test(flavor = "multi_thread")]
async fn injected_failure_skips_only_the_targeted_destination() {
    init_test_tracing();
    let scenario = FailScenario::setup();
    // The first evaluation happens for `flaky`, the first registered destination.
    fail::cfg(FAN_OUT_BEFORE_PUT, "1*return(flaky)").unwrap();

    let flaky = LocalChannel::new("flaky", 64);
    let healthy = LocalChannel::new("healthy", 64);

    let outcome = fan_out(&["/a", "/b", "/c"], &[&flaky, &healthy]).await;

    assert_eq!(outcome, StageOutcome::Success);
    assert_eq!(drain(&flaky).await, paths(&["/b", "/c"]));
    assert_eq!(drain(&healthy).await, paths(&["/a", "/b", "/c"]));

    scenario.teardown();
}

#[tokio::test(flavor = "multi_thread")]
async fn stage_completes_even_when_every_put_fails() {
    init_test_tracing();
    let scenario = FailScenario::setup();
    fail::cfg(FAN_OUT_BEFORE_PUT, "return").unwrap();

    let first = LocalChannel::new("first", 64);
    let second = LocalChannel::new("second", 64);

    let outcome = fan_out(&["/a", "/b"], &[&first, &second]).await;

    assert_eq!(outcome, StageOutcome::Success);
    assert!(first.is_empty());
    assert!(second.is_empty());

    scenario.teardown();
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_targeting_one_destination_spares_the_others() {
    init_test_tracing();
    let scenario = FailScenario::setup();
    fail::cfg(FAN_OUT_BEFORE_PUT, "return(index)").unwrap();

    let parse = LocalChannel::new("parse", 64);
    let index = LocalChannel::new("index", 64);
    let extract = LocalChannel::new("extract", 64);

    let outcome = fan_out(&["/a", "/b"], &[&parse, &index, &extract]).await;

    assert_eq!(outcome, StageOutcome::Success);
    assert_eq!(drain(&parse).await, paths(&["/a", "/b"]));
    assert!(index.is_empty());
    assert_eq!(drain(&extract).await, paths(&["/a", "/b"]));

    scenario.teardown();
}
