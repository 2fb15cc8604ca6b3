pub mod config;
pub mod errors;
pub mod flatten;
pub mod metrics_defs;
pub mod queue;
pub mod worker;

pub use config::Config;
pub use errors::WorkerError;
pub use queue::{Delivery, DeliveryQueue, QueueHandle};
pub use worker::Normalizer;
