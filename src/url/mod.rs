//! URL handling module
//!
//! Helpers for the two URL-derived facts the control core cares about:
//! the owning domain (the unit of rate limiting and visit diversity) and
//! the path depth (shallower paths score higher).

mod domain;

pub use domain::{domain_of, extract_domain, path_segment_count};
