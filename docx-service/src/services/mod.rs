pub mod composer;
pub mod metrics;
pub mod storage;

pub use composer::{ComposeError, Composition, DocumentComposer, ImagePayload};
pub use metrics::{get_metrics, init_metrics};
pub use storage::{DocumentStore, LocalStorage};
