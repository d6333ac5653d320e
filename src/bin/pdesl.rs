use std::fs;
use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use clap::Parser;
use pdesl::codegen::{Emitter, MAPPING_TEMPLATE};
use pdesl::parser::parse_string;

/// compiles a PDE model description (.pde) to numerical solver setup code
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input filename, use `-' to read from standard input
    input: String,

    /// Output filename (defaults to standard output)
    #[arg(short, long)]
    out: Option<String>,

    /// Mapping template file overriding the built-in one
    #[arg(short, long)]
    template: Option<String>,

    /// Verbosity level; prints a model summary before emission
    #[arg(short, long, value_name = "LEVEL", num_args = 0..=1,
          default_value_t = 0, default_missing_value = "1")]
    verbose: u32,
}

fn main() -> Result<()> {
    let cli = Args::parse();

    let text = if cli.input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading standard input failed")?;
        buf
    } else {
        fs::read_to_string(&cli.input)
            .with_context(|| format!("opening file `{}' failed", cli.input))?
    };

    let template = match &cli.template {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("could not open template file {}", path))?,
        None => MAPPING_TEMPLATE.to_owned(),
    };

    let model = parse_string(&text)?;
    if cli.verbose > 0 {
        eprint!("{}", model);
    }

    let emitter = Emitter::new(&model);
    match &cli.out {
        Some(path) => {
            let mut file = fs::File::create(path)
                .with_context(|| format!("opening file `{}' failed", path))?;
            emitter.emit_code(&template, &mut file)?;
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            emitter.emit_code(&template, &mut lock)?;
            lock.flush()?;
        }
    }
    Ok(())
}
