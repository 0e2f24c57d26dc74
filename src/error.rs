//! Error types returned by the tree.

use std::collections::TryReserveError;
use std::result;
use thiserror::Error;

/// Errors that can occur while operating on a `RedBlackTree<T>`.
///
/// Allocation failure is the only error a mutation can produce. The remaining variants are
/// reported by `RedBlackTree::validate` and name the invariant that does not hold.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("out of memory: {0}")]
    OutOfMemory(#[from] TryReserveError),

    #[error("root node is red")]
    RedRoot,

    #[error("red node has a red child")]
    DoubleRed,

    #[error("black height mismatch: left subtree has {left}, right subtree has {right}")]
    BlackHeightMismatch { left: usize, right: usize },

    #[error("keys are not in order")]
    OutOfOrder,

    #[error("parent link does not match child link")]
    BrokenLink,

    #[error("length mismatch: expected {expected} nodes, found {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

pub type Result<T> = result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn test_display() {
        assert_eq!(Error::RedRoot.to_string(), "root node is red");
        assert_eq!(
            Error::BlackHeightMismatch { left: 2, right: 3 }.to_string(),
            "black height mismatch: left subtree has 2, right subtree has 3",
        );
    }

    #[test]
    fn test_from_try_reserve_error() {
        let mut vec: Vec<u64> = Vec::new();
        let err = vec.try_reserve(usize::MAX).unwrap_err();
        match Error::from(err) {
            Error::OutOfMemory(_) => {},
            other => panic!("Unexpected error: {:?}", other),
        }
    }
}
