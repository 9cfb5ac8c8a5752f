//! Interactive shell for the memory-hierarchy simulator.
//!
//! Reads whitespace-tokenized commands from stdin, executes them against
//! the simulator, and prints the resulting lines. Parse errors produce a
//! one-line diagnostic and keep the session alive.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use memsim::{parse_line, Command, CommandError, Simulator};

#[derive(Parser, Debug)]
#[command(name = "memsim")]
#[command(about = "Interactive heap-allocator and cache-hierarchy simulator")]
#[command(version)]
struct Args {
    /// Initialize the arena with this many bytes at startup
    #[arg(short = 'm', long)]
    memory: Option<usize>,

    /// Enable debug logging
    #[arg(short = 'd', long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("memsim={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut sim = Simulator::new();
    if let Some(size) = args.memory {
        for line in sim.execute(Command::InitMemory { size }) {
            println!("{line}");
        }
    }

    println!("Memory Management Simulator");
    println!("Type 'help' for available commands");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();

    loop {
        print!("> ");
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parse_line(trimmed) {
            Ok(Command::Quit) => break,
            Ok(cmd) => {
                for out in sim.execute(cmd) {
                    println!("{out}");
                }
            }
            Err(e) => {
                println!("{e}");
                if matches!(e, CommandError::UnknownCommand(_)) {
                    println!("Type 'help' for available commands");
                }
            }
        }
    }

    println!("Simulator exited.");
    Ok(())
}
