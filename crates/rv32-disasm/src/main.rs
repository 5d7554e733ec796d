use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use std::path::PathBuf;

use rv32_rs::disasm::disassemble;
use rv32_rs::loader::{self, ImageFormat};

#[derive(Parser, Debug)]
#[command(author, version, about = "RV32I/M disassembler CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Disassemble a program image (bit strings, hex words or raw binary)
    File {
        #[arg(value_name = "FILE")]
        input: PathBuf,
        /// Image format; guessed when omitted
        #[arg(long, value_enum)]
        format: Option<ImageFormat>,
        /// Address of the first word
        #[arg(long, default_value = "0", value_parser = parse_u32)]
        base: u32,
        /// Output format: text or json
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
        /// Only the instruction text, one per line
        #[arg(long)]
        plain: bool,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Disassemble words given on the command line (hex, decimal or 32-bit binary)
    Word {
        #[arg(value_name = "WORD", required = true)]
        words: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize)]
struct Line {
    addr: u32,
    word: u32,
    text: String,
}

fn parse_u32(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u32::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u32>()?)
    }
}

/// A bare 32-digit `0`/`1` string is a bit pattern, everything else a number.
fn parse_word(s: &str) -> Result<u32> {
    match loader::parse_bin_word(s.trim()) {
        Some(w) => Ok(w),
        None => parse_u32(s).with_context(|| format!("bad word '{s}'")),
    }
}

fn listing(words: &[u32], base: u32) -> Vec<Line> {
    words
        .iter()
        .enumerate()
        .map(|(i, &word)| Line {
            addr: base.wrapping_add(4 * i as u32),
            word,
            text: disassemble(word),
        })
        .collect()
}

fn render(lines: &[Line], output: OutputFormat, plain: bool) -> Result<String> {
    let mut s = String::new();
    match output {
        OutputFormat::Json => s = serde_json::to_string_pretty(lines)?,
        OutputFormat::Text if plain => {
            for l in lines {
                s.push_str(&l.text);
                s.push('\n');
            }
        }
        OutputFormat::Text => {
            for l in lines {
                s.push_str(&format!("{:08x}:  {:08x}  {}\n", l.addr, l.word, l.text));
            }
        }
    }
    Ok(s)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::File { input, format, base, output, plain, out } => {
            let bytes = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
            let format = format.unwrap_or_else(|| {
                let ext = input.extension().and_then(|e| e.to_str());
                loader::detect(ext, &bytes)
            });
            let image = loader::load_image(&bytes, format)?;
            let text = render(&listing(&image.words, base), output, plain)?;
            match out {
                Some(path) => std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?,
                None => print!("{text}"),
            }
        }
        Command::Word { words } => {
            for w in &words {
                println!("{}", disassemble(parse_word(w)?));
            }
        }
    }
    Ok(())
}
