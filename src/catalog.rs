//! Track catalog client.
//!
//! Searches the remote catalog by free text or album, decodes the JSON reply
//! and keeps only rows that carry a preview URL. Requests run on a worker
//! thread so the terminal stays responsive.

mod gateway;
mod model;

pub use gateway::{CatalogWorker, FetchError, Gateway, Reply};
pub use model::*;
