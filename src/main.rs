//! # rartic: Amplicon Consensus Pipeline for Nanopore Sequencing
//!
//! ## Usage
//! ```bash
//! # Default nanopolish workflow
//! rartic nCoV-2019/V3 sample1 --fast5-directory fast5/ \
//!     --sequencing-summary sequencing_summary.txt
//!
//! # Medaka workflow from basecalled reads only
//! rartic nCoV-2019/V3 sample1 --workflow medaka \
//!     --medaka-model r941_min_high_g360
//! ```
//!
//! Diagnostics go to stderr; the run log lands in `<sample>.minion.log.txt`.

use tracing_subscriber::EnvFilter;

use rartic::config::Config;
use rartic::error::Result;
use rartic::pipelines::MinionPipeline;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse_and_validate()?;
    MinionPipeline::new(config).run()
}
