pub mod fps;
pub mod pipeline_metrics;

pub use fps::*;
pub use pipeline_metrics::*;
