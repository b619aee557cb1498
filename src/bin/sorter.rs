use clap::Parser;
use maxset::data_source::{DataFormat, RecordReader};
use maxset::sorter::sort_dataset;
use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "sorter")]
#[command(about = "Sort a binary dataset lexicographically or by cardinality", long_about = None)]
struct Cli {
    /// Sort by increasing itemset cardinality instead of lexicographic order
    #[arg(short = 'c')]
    by_cardinality: bool,

    /// Path to the input dataset
    input: PathBuf,

    /// Path to write the sorted dataset
    output: PathBuf,

    /// Read the whitespace text format instead of packed binary
    #[arg(long)]
    text: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            exit(if e.use_stderr() { 1 } else { 0 });
        }
    };
    let start = Instant::now();

    let format = if cli.text {
        DataFormat::Text
    } else {
        DataFormat::Binary
    };
    let mut data = match RecordReader::from_path(&cli.input, format) {
        Ok(data) => data,
        Err(e) => {
            eprintln!(
                "ERROR: failed to open input file {}: {}",
                cli.input.display(),
                e
            );
            exit(2);
        }
    };

    if let Err(e) = sort_dataset(&mut data, &cli.output, cli.by_cardinality) {
        eprintln!("ERROR: {}", e);
        exit(3);
    }

    eprintln!("[sorter] success");
    eprintln!("[sorter] total running time: {:.2?}", start.elapsed());
}
