//! An ordered container backed by a red black tree.
//!
//! Nodes live in a `TypedArena` and link to their parent and children by handle, so rotations
//! and deletions rewrite handles instead of pointers.

pub mod arena;
pub mod error;
pub mod red_black_tree;

pub use crate::error::{Error, Result};
pub use crate::red_black_tree::{Handle, RedBlackSet, RedBlackTree};
