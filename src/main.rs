use std::path::Path;
use std::process;

use clap::Parser;
use hackasm::assemble;

/// Assembles Hack .asm files into .hack binary code
#[derive(Parser)]
#[command(about)]
struct Args {
    /// Input assembly file (.asm)
    input: String,

    /// Output file; defaults to the input name with a .hack extension
    #[arg(short, long)]
    output: Option<String>,
}

fn main() {
    let args = Args::parse();

    if !args.input.ends_with(".asm") {
        eprintln!("Error: file must have .asm extension: {}", args.input);
        process::exit(1);
    }

    let output = args.output.unwrap_or_else(|| {
        let stem = Path::new(&args.input).file_stem().unwrap_or_default();
        format!("{}.hack", stem.to_string_lossy())
    });

    if let Err(e) = assemble(&args.input, &output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
