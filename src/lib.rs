//! Koral-Mapper - bidirectional rewriting of KoralQuery annotation trees.
//!
//! This is the main library crate that re-exports functionality from the various
//! component crates in the workspace.

// Re-export the tree model
pub use koral_ast as ast;

// Re-export other major components
pub use koral_engine as engine;
pub use koral_rules as rules;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
