//! navex AST
//!
//! This crate provides the abstract syntax tree consumed by the navex
//! evaluator. Trees are stored as an arena of nodes addressed by [`NodeId`]
//! and are assembled with [`AstBuilder`], which performs the one-time
//! flattening of associative operator chains.

pub mod ast;
pub mod builder;
pub mod display;
pub mod error;

pub use ast::*;
pub use builder::AstBuilder;
pub use display::NodeDisplay;
pub use error::{AstError, AstResult};
