//! Robots.txt compliance
//!
//! Fetches, caches, and evaluates robots.txt rules so the fetch pipeline can
//! honor disallow directives and crawl delays.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::ParsedRobots;
