// Observability: metrics facade and Prometheus rendering

pub mod metrics;

pub use metrics::{init, render};
