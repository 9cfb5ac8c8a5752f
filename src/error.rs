//! Error types for the allocator, the cache simulator, and the command layer.
//!
//! Every error is recoverable: the driver turns each one into a single
//! diagnostic line and keeps the session alive.

use thiserror::Error;

/// Errors produced by the arena allocator.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    #[error("cannot allocate zero bytes")]
    ZeroSize,

    #[error("no free block can hold {requested} bytes")]
    OutOfSpace { requested: usize },

    #[error("unknown block id {0}")]
    UnknownHandle(u64),

    #[error("block id {0} was already freed")]
    DoubleFree(u64),

    #[error("address 0x{0:x} does not name an allocated payload")]
    InvalidAddress(usize),

    #[error("arena of {requested} bytes cannot hold a single block (minimum {minimum})")]
    ArenaTooSmall { requested: usize, minimum: usize },
}

/// Errors produced when constructing a cache level.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    #[error("bad cache geometry: {reason} (size {size}, block {block_size}, {associativity}-way)")]
    BadGeometry {
        size: usize,
        block_size: usize,
        associativity: usize,
        reason: &'static str,
    },
}

/// Errors produced by the line parser.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Usage: {0}")]
    BadArgs(&'static str),

    #[error("Could not parse number '{0}'")]
    ParseError(String),
}
