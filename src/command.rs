//! Command types and the line parser for the interactive shell.
//!
//! Lines are tokenized on whitespace; keywords are case-insensitive.
//! Numbers accept decimal, `0x` hex, and leading-`0` octal, matching the
//! base-0 convention of the usual C string-to-integer parsers.

use crate::arena::PlacementStrategy;
use crate::cache::{CacheParams, ReplacementPolicy};
use crate::error::CommandError;

/// One parsed shell command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// `init memory <size>`
    InitMemory { size: usize },
    /// `init cache <l1_sz> <l1_blk> <l1_assoc> <l2_sz> <l2_blk> <l2_assoc> [policy]`
    InitCache {
        l1: CacheParams,
        l2: CacheParams,
        policy: ReplacementPolicy,
    },
    /// `set allocator <first_fit|best_fit|worst_fit>`
    SetAllocator(PlacementStrategy),
    /// `set cache_policy <fifo|lru|lfu>` - applies to both levels
    SetCachePolicy(ReplacementPolicy),
    /// `malloc <size>`
    Malloc { size: usize },
    /// `free <id>`
    FreeById(u64),
    /// `free 0x<hex>`
    FreeByAddress(usize),
    /// `dump memory`
    DumpMemory,
    /// `access <addr>`
    Access { addr: u64 },
    Stats,
    Help,
    /// `exit` or `quit`
    Quit,
}

/// Split a line into whitespace-separated tokens.
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// Parse one input line into a [`Command`].
pub fn parse_line(line: &str) -> Result<Command, CommandError> {
    let tokens = tokenize(line);
    let Some(&keyword) = tokens.first() else {
        return Err(CommandError::BadArgs("type 'help' for available commands"));
    };

    match keyword.to_ascii_lowercase().as_str() {
        "init" => parse_init(&tokens),
        "set" => parse_set(&tokens),
        "malloc" => {
            let size = require(&tokens, 1, "malloc <size>")?;
            Ok(Command::Malloc {
                size: parse_number(size)? as usize,
            })
        }
        "free" => {
            let arg = require(&tokens, 1, "free <block_id> or free 0x<address>")?;
            if arg.starts_with("0x") || arg.starts_with("0X") {
                Ok(Command::FreeByAddress(parse_number(arg)? as usize))
            } else {
                Ok(Command::FreeById(parse_number(arg)?))
            }
        }
        "dump" => match tokens.get(1).map(|t| t.to_ascii_lowercase()).as_deref() {
            Some("memory") => Ok(Command::DumpMemory),
            _ => Err(CommandError::BadArgs("dump memory")),
        },
        "access" => {
            let addr = require(&tokens, 1, "access <address>")?;
            Ok(Command::Access {
                addr: parse_number(addr)?,
            })
        }
        "stats" => Ok(Command::Stats),
        "help" => Ok(Command::Help),
        "exit" | "quit" => Ok(Command::Quit),
        _ => Err(CommandError::UnknownCommand(keyword.to_string())),
    }
}

fn parse_init(tokens: &[&str]) -> Result<Command, CommandError> {
    match tokens.get(1).map(|t| t.to_ascii_lowercase()).as_deref() {
        Some("memory") => {
            let size = require(tokens, 2, "init memory <size>")?;
            Ok(Command::InitMemory {
                size: parse_number(size)? as usize,
            })
        }
        Some("cache") => {
            const USAGE: &str =
                "init cache <l1_sz> <l1_blk> <l1_assoc> <l2_sz> <l2_blk> <l2_assoc> [policy]";
            let mut nums = [0usize; 6];
            for (i, slot) in nums.iter_mut().enumerate() {
                *slot = parse_number(require(tokens, 2 + i, USAGE)?)? as usize;
            }
            let policy = match tokens.get(8) {
                Some(name) => ReplacementPolicy::parse(name)
                    .ok_or(CommandError::BadArgs("policy must be fifo, lru, or lfu"))?,
                None => ReplacementPolicy::default(),
            };
            Ok(Command::InitCache {
                l1: CacheParams {
                    size: nums[0],
                    block_size: nums[1],
                    associativity: nums[2],
                },
                l2: CacheParams {
                    size: nums[3],
                    block_size: nums[4],
                    associativity: nums[5],
                },
                policy,
            })
        }
        _ => Err(CommandError::BadArgs(
            "init memory <size> OR init cache <params>",
        )),
    }
}

fn parse_set(tokens: &[&str]) -> Result<Command, CommandError> {
    match tokens.get(1).map(|t| t.to_ascii_lowercase()).as_deref() {
        Some("allocator") => {
            let name = require(tokens, 2, "set allocator <strategy>")?;
            PlacementStrategy::parse(name)
                .map(Command::SetAllocator)
                .ok_or(CommandError::BadArgs(
                    "strategy must be first_fit, best_fit, or worst_fit",
                ))
        }
        Some("cache_policy") => {
            let name = require(tokens, 2, "set cache_policy <policy>")?;
            ReplacementPolicy::parse(name)
                .map(Command::SetCachePolicy)
                .ok_or(CommandError::BadArgs("policy must be fifo, lru, or lfu"))
        }
        _ => Err(CommandError::BadArgs(
            "set allocator <strategy> OR set cache_policy <policy>",
        )),
    }
}

fn require<'a>(
    tokens: &[&'a str],
    index: usize,
    usage: &'static str,
) -> Result<&'a str, CommandError> {
    tokens
        .get(index)
        .copied()
        .ok_or(CommandError::BadArgs(usage))
}

/// Parse an unsigned number with the base-0 prefix rules: `0x`/`0X` hex,
/// leading `0` octal, otherwise decimal.
fn parse_number(token: &str) -> Result<u64, CommandError> {
    let parsed = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if token.len() > 1 && token.starts_with('0') {
        u64::from_str_radix(&token[1..], 8)
    } else {
        token.parse()
    };
    parsed.map_err(|_| CommandError::ParseError(token.to_string()))
}

/// The help block shown by the `help` command.
pub fn help_text() -> &'static str {
    "Available commands:\n\
     \x20 init memory <size>            - Initialize memory system (RAM + Cache)\n\
     \x20 init cache <params...>        - Initialize L1/L2 cache hierarchy\n\
     \x20 set allocator <strategy>      - Set allocation strategy (first_fit, best_fit, worst_fit)\n\
     \x20 set cache_policy <policy>     - Set cache replacement policy (fifo, lru, lfu)\n\
     \x20 malloc <size>                 - Allocate memory block\n\
     \x20 free <block_id>               - Free memory block by ID\n\
     \x20 free 0x<address>              - Free memory block by address\n\
     \x20 dump memory                   - Display memory layout\n\
     \x20 stats                         - Display statistics\n\
     \x20 access <address>              - Simulate cache access (Physical Address)\n\
     \x20 help                          - Show this help\n\
     \x20 exit                          - Exit simulator"
}
