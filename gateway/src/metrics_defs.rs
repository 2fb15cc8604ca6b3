use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "gateway.request.duration",
    metric_type: MetricType::Histogram,
    description: "Ingress request duration in seconds",
};

pub const REQUESTS_ACCEPTED: MetricDef = MetricDef {
    name: "gateway.requests.accepted",
    metric_type: MetricType::Counter,
    description: "Requests that produced a durable landing record",
};

pub const REQUESTS_REJECTED: MetricDef = MetricDef {
    name: "gateway.requests.rejected",
    metric_type: MetricType::Counter,
    description: "Requests answered with an error envelope",
};

pub const TOKEN_CACHE_HIT: MetricDef = MetricDef {
    name: "gateway.token_cache.hit",
    metric_type: MetricType::Counter,
    description: "Token validations answered from the cache",
};

pub const TOKEN_CACHE_MISS: MetricDef = MetricDef {
    name: "gateway.token_cache.miss",
    metric_type: MetricType::Counter,
    description: "Token validations forwarded to the identity provider",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_ACCEPTED,
    REQUESTS_REJECTED,
    TOKEN_CACHE_HIT,
    TOKEN_CACHE_MISS,
];
