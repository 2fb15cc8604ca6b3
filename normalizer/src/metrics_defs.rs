use shared::metrics_defs::{MetricDef, MetricType};

pub const RECORDS_NORMALIZED: MetricDef = MetricDef {
    name: "normalizer.records.normalized",
    metric_type: MetricType::Counter,
    description: "Landing records rewritten into the processed store",
};

pub const RECORDS_DUPLICATE: MetricDef = MetricDef {
    name: "normalizer.records.duplicate",
    metric_type: MetricType::Counter,
    description: "Redeliveries that found their document already written",
};

pub const RECORDS_QUARANTINED: MetricDef = MetricDef {
    name: "normalizer.records.quarantined",
    metric_type: MetricType::Counter,
    description: "Records parked in quarantine after decode/validation failure",
};

pub const RECORDS_REDELIVERED: MetricDef = MetricDef {
    name: "normalizer.records.redelivered",
    metric_type: MetricType::Counter,
    description: "Deliveries re-queued after exhausting store retries",
};

pub const RECORDS_SKIPPED: MetricDef = MetricDef {
    name: "normalizer.records.skipped",
    metric_type: MetricType::Counter,
    description: "Deliveries whose landing object no longer exists",
};

pub const SWEEP_ENQUEUED: MetricDef = MetricDef {
    name: "normalizer.sweep.enqueued",
    metric_type: MetricType::Counter,
    description: "Landing records re-discovered by the startup sweep",
};

pub const ALL_METRICS: &[MetricDef] = &[
    RECORDS_NORMALIZED,
    RECORDS_DUPLICATE,
    RECORDS_QUARANTINED,
    RECORDS_REDELIVERED,
    RECORDS_SKIPPED,
    SWEEP_ENQUEUED,
];
