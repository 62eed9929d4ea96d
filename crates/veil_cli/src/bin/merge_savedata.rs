//! Merges sampling checkpoints produced by `verify_mi`.
//!
//! All inputs must carry the same build hash and sampling parameters;
//! the output accumulates their run counts, durations and per-slot
//! sums. Useful for combining campaigns run on several machines.
//!
//! Exit codes: 0 success, 1 usage error, 2 output exists, 3 input
//! read failure, 4 merge inconsistency, 5 output write failure.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::Parser;

use veil_mi::SaveData;

/// Sum compatible sampling checkpoints into one.
#[derive(Parser, Debug)]
#[command(name = "merge_savedata", version, about = "Merge verify_mi checkpoints")]
struct Args {
    /// Input checkpoint files followed by the output file.
    #[arg(required = true, num_args = 3.., value_name = "INPUTS... OUTPUT")]
    files: Vec<PathBuf>,
}

fn run() -> i32 {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = err.print();
            return code;
        }
    };

    let (output, inputs) = match args.files.split_last() {
        Some(split) => split,
        None => return 1,
    };

    if output.exists() {
        eprintln!("output file exists and would be overwritten, aborting");
        return 2;
    }

    let mut merged = match File::open(&inputs[0]).map_err(veil_mi::SaveDataError::from) {
        Ok(file) => match SaveData::read(file, None) {
            Ok(data) => data,
            Err(err) => {
                eprintln!("failed while reading {}: {err}", inputs[0].display());
                return 3;
            }
        },
        Err(err) => {
            eprintln!("failed while reading {}: {err}", inputs[0].display());
            return 3;
        }
    };

    for path in &inputs[1..] {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                eprintln!("failed while reading {}: {err}", path.display());
                return 3;
            }
        };
        let data = match SaveData::read(file, Some(merged.hash)) {
            Ok(data) => data,
            Err(err) => {
                eprintln!("exception while processing {}: {err}", path.display());
                return 4;
            }
        };
        if let Err(err) = merged.merge(&data) {
            eprintln!("exception while processing {}: {err}", path.display());
            return 4;
        }
    }

    let file = match File::create(output) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("failed while writing {}: {err}", output.display());
            return 5;
        }
    };
    if let Err(err) = merged.write(BufWriter::new(file)) {
        eprintln!("failed while writing {}: {err}", output.display());
        return 5;
    }

    0
}

fn main() {
    process::exit(run());
}
