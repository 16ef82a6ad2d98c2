//! Application module: exposes the app model used by the TUI and runtime.
//!
//! The `App` model lives in `app::model` and holds the search results,
//! cursor, query input and pointer state.

mod model;

pub use model::*;
