//! URL parsing utilities for redirect-guard
//!
//! Detects search-engine redirector links and unwraps their destination.

pub mod redirector;

pub use redirector::{extract_destination, is_redirector, is_well_formed, unwrap_redirect};
