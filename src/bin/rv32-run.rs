use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rv32_rs::loader::{self, ImageFormat};
use rv32_rs::{RunExit, SimConfig, Simulator};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run an RV32I/M program on the rv32-rs simulator")]
struct Opts {
    /// Program image: assembly, bit-string text, hex text or raw binary
    #[arg(value_name = "PROGRAM")]
    input: PathBuf,
    /// Image format; guessed from the extension and contents when omitted
    #[arg(short, long, value_enum)]
    format: Option<ImageFormat>,
    /// JSON file with a SimConfig
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Step cap (overrides the config)
    #[arg(long)]
    max_steps: Option<u64>,
    /// Preset the timer counter
    #[arg(long, value_parser = parse_u32)]
    timer: Option<u32>,
    /// Word latched into the UART rx register before running
    #[arg(long, value_parser = parse_u32)]
    uart_rx: Option<u32>,
    /// Print retired-instruction statistics
    #[arg(long)]
    stats: bool,
    /// Dump memory after the run: ADDR:LEN (hex or decimal)
    #[arg(long, value_name = "ADDR:LEN")]
    dump_mem: Vec<String>,
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let t = s.trim();
    let parsed = if let Some(h) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        u32::from_str_radix(h, 16)
    } else {
        t.parse::<u32>()
    };
    parsed.map_err(|e| format!("invalid number '{s}': {e}"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let mut cfg = match &opts.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<SimConfig>(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => SimConfig::default(),
    };
    if let Some(n) = opts.max_steps {
        cfg.max_steps = n;
    }

    let bytes = std::fs::read(&opts.input)
        .with_context(|| format!("reading {}", opts.input.display()))?;
    let format = opts.format.unwrap_or_else(|| {
        let ext = opts.input.extension().and_then(|e| e.to_str());
        loader::detect(ext, &bytes)
    });
    let image = loader::load_image(&bytes, format)?;

    let mut sim = Simulator::new(cfg);
    sim.load_program(&image.words, image.line_map)?;
    if let Some(t) = opts.timer {
        sim.bus_mut().timer.set(t);
    }
    if let Some(w) = opts.uart_rx {
        sim.bus_mut().uart.receive(w);
    }

    // Stream peripheral output as it happens.
    let mut exit = RunExit::StepLimit;
    for _ in 0..cfg.max_steps {
        let runnable = sim.step();
        for ev in sim.drain_events() {
            println!("{ev}");
        }
        if !runnable {
            exit = if sim.fault().is_some() { RunExit::Faulted } else { RunExit::Halted };
            break;
        }
    }

    print!("{}", sim.dump_regs());
    if opts.stats {
        println!("{}", serde_json::to_string_pretty(sim.stats())?);
    }
    for arg in &opts.dump_mem {
        let Some((a, l)) = arg.split_once(':') else {
            bail!("--dump-mem expects ADDR:LEN, got '{arg}'");
        };
        let addr = parse_u32(a).map_err(anyhow::Error::msg)?;
        let len = parse_u32(l).map_err(anyhow::Error::msg)?;
        print!("{}", sim.dump_memory(addr, len));
    }

    match exit {
        RunExit::Halted => Ok(()),
        RunExit::StepLimit => {
            eprintln!("stopped after {} steps", cfg.max_steps);
            Ok(())
        }
        RunExit::Faulted => {
            let msg = sim.fault_message().unwrap_or_default();
            let line = sim.line_for_pc(sim.pc());
            match line {
                Some(l) => bail!("TRAP (source line {l}): {msg}"),
                None => bail!("TRAP: {msg}"),
            }
        }
    }
}
