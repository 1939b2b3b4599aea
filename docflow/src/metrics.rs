//! Metric names emitted by the coordination core.
//!
//! The core only records through the [`metrics`] facade; installing a recorder is left to the
//! hosting process.

/// Label carrying the name of the stage emitting a metric.
pub const STAGE_LABEL: &str = "stage";

/// Label carrying the name of a destination channel.
pub const DESTINATION_LABEL: &str = "destination";

/// Label carrying the outcome of a stage run.
pub const OUTCOME_LABEL: &str = "outcome";

/// Label carrying the direction of a completion bridge.
pub const DIRECTION_LABEL: &str = "direction";

/// Counter of elements received by fan-out stages.
pub const DOCFLOW_FAN_OUT_RECEIVED_TOTAL: &str = "docflow_fan_out_received_total";

/// Counter of elements successfully put into a destination by fan-out stages.
pub const DOCFLOW_FAN_OUT_FORWARDED_TOTAL: &str = "docflow_fan_out_forwarded_total";

/// Counter of per-destination forwarding failures, errors and cancellations alike.
pub const DOCFLOW_FAN_OUT_FAILURES_TOTAL: &str = "docflow_fan_out_failures_total";

/// Counter of completion bridge runs, labelled with direction and outcome.
pub const DOCFLOW_BRIDGE_RUNS_TOTAL: &str = "docflow_bridge_runs_total";
