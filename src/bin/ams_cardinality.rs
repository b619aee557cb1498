use clap::Parser;
use maxset::data_source::{DataFormat, RecordReader};
use maxset::memory::{MemoryBudget, DEFAULT_MAX_ITEMS_IN_RAM, DEFAULT_MAX_ITEM_ID};
use maxset::output::OutputMode;
use maxset::CardinalityEngine;
use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "ams-cardinality")]
#[command(about = "Find all maximal sets in a cardinality-sorted dataset", long_about = None)]
struct Cli {
    /// Path to the dataset, sorted by non-decreasing cardinality
    dataset: PathBuf,

    /// Largest expected item id (candidate index preallocation hint)
    #[arg(long, default_value_t = DEFAULT_MAX_ITEM_ID)]
    max_item_id: u32,

    /// Bound on the number of 4-byte item ids held in RAM
    #[arg(long, default_value_t = DEFAULT_MAX_ITEMS_IN_RAM)]
    max_items_in_ram: u64,

    /// Derive the RAM bound from system memory instead
    #[arg(long)]
    auto_mem: bool,

    /// What to print on stdout for each maximal set
    #[arg(long, value_enum, default_value = "count-only")]
    output: OutputMode,

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
    let mut data = match RecordReader::from_path(&cli.dataset, format) {
        Ok(data) => data,
        Err(e) => {
            eprintln!(
                "ERROR: failed to open input file {}: {}",
                cli.dataset.display(),
                e
            );
            exit(2);
        }
    };

    let budget = if cli.auto_mem {
        MemoryBudget::from_system()
    } else {
        MemoryBudget::fixed(cli.max_items_in_ram)
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut engine = CardinalityEngine::new();
    if let Err(e) = engine.find_all_maximal_sets(
        &mut data,
        cli.max_item_id,
        budget.max_items_in_ram,
        cli.output,
        &mut out,
    ) {
        eprintln!("ERROR: {}", e);
        exit(3);
    }

    eprintln!(
        "[ams-cardinality] found {} maximal itemsets",
        engine.maximal_sets_count()
    );
    eprintln!(
        "[ams-cardinality] itemsets retained from the input: {}",
        engine.input_sets_count()
    );
    eprintln!(
        "[ams-cardinality] subsumption checks performed: {}",
        engine.subsumption_checks_count()
    );
    eprintln!(
        "[ams-cardinality] total running time: {:.2?}",
        start.elapsed()
    );
}
