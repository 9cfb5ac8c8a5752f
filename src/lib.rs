//! # memsim
//!
//! An interactive teaching simulator for two memory subsystems: a heap
//! allocator over a bounded byte arena, and a two-level set-associative
//! CPU cache hierarchy.
//!
//! ## Design Principles
//!
//! - **Two independent engines**: the allocator and the cache never share
//!   state; an address passed to the cache is opaque
//! - **Out-of-band metadata**: blocks and cache lines are plain records;
//!   no in-band headers, no unsafe
//! - **Value ownership**: the driver owns each engine as a value and
//!   replaces it wholesale on `init`
//!
//! ## Architecture
//!
//! ```text
//! [stdin line] --> [parse_line] --> [Simulator::execute]
//!                                      |            |
//!                                   [Arena]  [CacheHierarchy]
//!                                      |            |
//!                                 [SessionStats accumulator]
//! ```

pub mod arena;
pub mod cache;
pub mod command;
pub mod engine;
pub mod error;
pub mod stats;

// Re-exports for convenience
pub use arena::{Allocation, Arena, BlockInfo, PlacementStrategy, HEADER_BYTES, MIN_PAYLOAD};
pub use cache::{AccessReport, CacheHierarchy, CacheLevel, CacheParams, ReplacementPolicy};
pub use command::{help_text, parse_line, tokenize, Command};
pub use engine::{Simulator, DEFAULT_L1, DEFAULT_L2};
pub use error::{AllocError, CacheError, CommandError};
pub use stats::SessionStats;
