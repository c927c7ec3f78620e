//! Stream-to-relation step: cutting the quad stream into time windows.

pub mod csparql_window;

pub use csparql_window::{CSPARQLWindow, WindowCallback, WindowInstance};
