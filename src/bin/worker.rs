//! Computes one operand for the server: runs the predefined function selected by the native tag
//! and writes the serialized result to stdout.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use splitcalc::functions;
use splitcalc::operation::{Function, NativeTag, Operation};

const EX_USAGE: u8 = 64;
const EX_SOFTWARE: u8 = 70;

#[derive(Parser, Debug)]
struct Args {
    /// Function group: or, and, int
    tag: NativeTag,

    /// Which function of the group: f or g
    function: Function,

    index: usize,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let Some(value) = functions::evaluate(args.tag, args.function, args.index) else {
        eprintln!("index {} is outside the {} functions", args.index, args.tag);
        return ExitCode::from(EX_USAGE);
    };

    let serialized = Operation::for_native_tag(args.tag).serialize(&value);

    let mut stdout = io::stdout().lock();
    if stdout.write_all(serialized.as_bytes()).is_err() || stdout.flush().is_err() {
        return ExitCode::from(EX_SOFTWARE);
    }

    ExitCode::SUCCESS
}
