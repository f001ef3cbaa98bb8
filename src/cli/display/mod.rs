//! Terminal rendering helpers.

pub mod table;

pub use table::{list_table, render_catalog};
