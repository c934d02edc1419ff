//! `gcat` — parse G-code files and print statement trees.
//!
//! Reads the file in fixed-size chunks and streams them through a
//! [`FrontEnd`], printing each parsed statement to stdout and each
//! diagnostic to stderr. Exit status is nonzero for usage or I/O failures;
//! parse diagnostics alone do not fail the run.

use std::env;
use std::fs::File;
use std::io::Read;
use std::process::ExitCode;

use gantry_core::GantryError;
use gantry_core::parser::ast::Node;
use gantry_core::parser::{Consumer, FrontEnd};

const CHUNK: usize = 4096;

/// Prints statements and diagnostics as they arrive.
struct Report;

impl Consumer for Report {
    fn error(&mut self, diagnostic: &GantryError) {
        eprintln!("*** ERROR: {diagnostic}");
    }

    fn statement(&mut self, statement: Node) {
        println!("{statement}");
    }
}

fn run(path: &str) -> std::io::Result<()> {
    let mut file = File::open(path)?;
    let mut front_end = FrontEnd::new(Report);
    let mut buf = [0u8; CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        front_end.feed(&buf[..n]);
    }
    front_end.finish();
    Ok(())
}

fn main() -> ExitCode {
    let mut args = env::args().skip(1);
    let (Some(path), None) = (args.next(), args.next()) else {
        eprintln!("Usage: gcat FILE");
        return ExitCode::FAILURE;
    };
    if let Err(err) = run(&path) {
        eprintln!("*** ERROR: {path}: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
