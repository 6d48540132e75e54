pub mod documents;

pub use documents::{
    InsertHeaderFooterRequest, InsertHeaderFooterResponse, RetrieveDocumentRequest,
    StatusResponse,
};
