use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use std::fs;
use std::path::PathBuf;

use rv32_rs::asm::{Assembler, Program};

#[derive(Parser, Debug)]
#[command(author, version, about = "Two-pass RV32I/M assembler")]
struct Opts {
    /// Input assembly file (one instruction and/or label per line)
    #[arg(short, long)]
    input: PathBuf,
    /// Output file
    #[arg(short, long)]
    output: PathBuf,
    /// Output encoding
    #[arg(short, long, value_enum, default_value_t = Emit::Bin)]
    emit: Emit,
    /// Address of the first instruction (label resolution only)
    #[arg(long, default_value_t = 0u32)]
    start: u32,
    /// Also write the word-index to source-line map and symbols as JSON
    #[arg(long, value_name = "FILE")]
    map: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// 32-character binary strings, one per line
    Bin,
    /// 8-digit hex words, one per line
    Hex,
    /// Little-endian raw words
    Raw,
}

#[derive(Serialize)]
struct MapFile<'a> {
    start: u32,
    line_map: &'a [usize],
    symbols: Vec<(&'a str, u32)>,
}

fn emit(prog: &Program, how: Emit) -> Vec<u8> {
    match how {
        Emit::Bin => prog
            .to_bin_strings()
            .into_iter()
            .flat_map(|s| (s + "\n").into_bytes())
            .collect(),
        Emit::Hex => prog
            .words
            .iter()
            .flat_map(|w| format!("{w:08x}\n").into_bytes())
            .collect(),
        Emit::Raw => prog.to_le_bytes(),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let text = fs::read_to_string(&opts.input)
        .with_context(|| format!("reading {}", opts.input.display()))?;

    let prog = match Assembler::with_origin(opts.start).assemble(&text) {
        Ok(p) => p,
        Err(errs) => {
            for e in &errs.0 {
                eprintln!("{}:{e}", opts.input.display());
            }
            bail!("{} error(s), no output written", errs.0.len());
        }
    };

    fs::write(&opts.output, emit(&prog, opts.emit))
        .with_context(|| format!("writing {}", opts.output.display()))?;
    if let Some(path) = &opts.map {
        let map = MapFile {
            start: opts.start,
            line_map: &prog.line_map,
            symbols: prog.symbols.sorted(),
        };
        fs::write(path, serde_json::to_string_pretty(&map)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    println!("{} words written to {}", prog.words.len(), opts.output.display());
    Ok(())
}
