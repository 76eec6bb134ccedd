//! Page objects wrapping a scenario's [`Page`](stepwright_core::Page)

pub mod search;

pub use search::SearchPage;
