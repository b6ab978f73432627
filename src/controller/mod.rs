// HTTP controllers: one per route group.

pub mod batch;
pub mod controller;
pub mod error;
pub mod incr;
pub mod kv;
pub mod metrics;
pub mod probe;
pub mod stats;
pub mod wire;


pub use batch::BatchController;
pub use controller::Controller;
pub use error::ApiError;
pub use incr::IncrController;
pub use kv::KvController;
pub use metrics::PrometheusMetricsController;
pub use probe::ProbeController;
pub use stats::StatsController;
