// src/rewrite/mod.rs

//! Closure rewriting
//!
//! `engine` orchestrates a run, `rewriter` performs the byte-level
//! substitutions inside extracted trees, `map` records old -> new path
//! mappings, and `cache` memoizes store reads for the duration of the run.

pub mod cache;
pub mod engine;
pub mod map;
pub mod rewriter;

pub use cache::StoreCache;
pub use engine::{Engine, ProgressFn};
pub use map::{Rewrite, RewriteMap};
pub use rewriter::rewrite_tree;
