pub mod documents;
pub mod health;

pub use documents::{insert_header_footer, retrieve_document};
pub use health::{health_check, metrics, root_status};
