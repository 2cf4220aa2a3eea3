mod checksum;
mod codec;
mod common;
mod diag;
mod finders;
mod keys;
mod locate;
mod report;
mod rom;
mod search;
mod variants;

use clap::Parser;
use std::fs;

use rom::include::{MAX_ROMSIZE, MIN_ROMSIZE};
use rom::RomImage;

#[derive(Parser, Debug)]
struct Args {
    /// ROM image to analyze
    rom_file: Option<String>,

    /// print one CSV row of properties
    #[arg(short = 'c', long = "csv")]
    csv: bool,

    /// print the CSV header row
    #[arg(short = 'l', long = "headers")]
    headers: bool,

    /// print properties as name/value lines
    #[arg(short = 'v', long = "human")]
    human: bool,

    /// analyze even if the file size is outside the expected range
    #[arg(short = 'f', long = "force")]
    force: bool,
}

/// Human mode wins over the CSV flags; with no output flag at all it is the
/// default.
fn human_mode(csv: bool, headers: bool, human: bool) -> bool {
    human || !(csv || headers)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let human = human_mode(args.csv, args.headers, args.human);

    if !human && args.headers {
        report::print_csv_header();
    }

    let Some(rom_file) = args.rom_file else {
        if args.headers {
            return Ok(());
        }
        return Err("no ROM file given (try --help)".into());
    };

    let buf = fs::read(&rom_file)?;
    let siz = buf.len() as u64;
    if siz < MIN_ROMSIZE as u64 || siz > MAX_ROMSIZE as u64 {
        if args.force {
            eprintln!("warning: unusual file size {} bytes, continuing", siz);
        } else {
            return Err(format!(
                "unlikely ROM size {} bytes (use --force to analyze anyway)",
                siz
            )
            .into());
        }
    }

    let rom = RomImage::new(buf, rom_file);
    let diag: &dyn diag::Diag = if human { &diag::Stderr } else { &diag::Null };

    let desc = rom::analyze(&rom, diag)?;

    if human {
        report::print_human(&rom, &desc);
    } else if args.csv {
        report::print_csv_values(&rom, &desc);
    }

    Ok(())
}
