mod retention;

pub use retention::{sweep_interval, RetentionSweeper};
