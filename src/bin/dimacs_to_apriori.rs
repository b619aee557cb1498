use clap::Parser;
use maxset::dimacs::{dimacs_to_apriori, DimacsReader};
use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "dimacs-to-apriori")]
#[command(about = "Convert DIMACS CNF to a frequency-relabeled packed binary dataset", long_about = None)]
struct Cli {
    /// Sort by increasing clause cardinality instead of lexicographic order
    #[arg(short = 'c')]
    by_cardinality: bool,

    /// Path to the DIMACS CNF input
    input: PathBuf,

    /// Path to write the packed binary dataset
    output: PathBuf,
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

    let mut data = match DimacsReader::from_path(&cli.input) {
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

    if let Err(e) = dimacs_to_apriori(&mut data, &cli.output, cli.by_cardinality) {
        eprintln!("ERROR: {}", e);
        exit(3);
    }

    eprintln!("[dimacs-to-apriori] success");
    eprintln!(
        "[dimacs-to-apriori] total running time: {:.2?}",
        start.elapsed()
    );
}
