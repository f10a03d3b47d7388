//! # MinION Consensus Pipeline
//!
//! Orchestrates the amplicon consensus workflow:
//! 1. Resolve the primer scheme (trusted local cache, else manifest download)
//! 2. Inspect the reference and collect the primer pools
//! 3. Build the ordered command list from the run configuration
//! 4. Execute it sequentially with fail-fast semantics and a run log
//!
//! The builder is a pure function of its inputs: identical configuration,
//! scheme, pool set, and reference span yield an identical step sequence.
//! The reference in effect for each stage is threaded through as an explicit
//! value; divergent mode swaps in a sample-derived pseudo reference for the
//! variant-calling stages and reverts to the scheme reference before
//! finalization, because coordinates called against the pseudo reference
//! are not final.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::config::{Aligner, Config, Workflow};
use crate::error::Result;
use crate::io::{bed, fasta};
use crate::scheme::{self, SchemeRef};
use super::command::{Command, Step};
use super::executor::{execute, RunLog, ShellRunner};

// medaka consensus chunking; fixed across runs so pool chunks line up.
const MEDAKA_CHUNK_LEN: u32 = 800;
const MEDAKA_CHUNK_OVERLAP: u32 = 400;
// Pileup and refinement depth ceiling for dense amplicon data.
const MAX_COVERAGE: u32 = 200_000;

/// The full consensus workflow for one sample.
pub struct MinionPipeline {
    config: Config,
}

impl MinionPipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Resolve inputs, build the step list, and run it.
    #[instrument(name = "minion", skip(self), fields(sample = %self.config.sample))]
    pub fn run(&self) -> Result<()> {
        let config = &self.config;

        let scheme = scheme::resolve(
            &config.scheme,
            &config.scheme_directory,
            &config.scheme_version,
        )?;
        info!(scheme = %scheme.name, version = %scheme.version, "using primer scheme");

        let span = fasta::reference_span(&scheme.reference)?;
        let pools = bed::primer_pools(&scheme.bed)?;
        info!(pools = pools.len(), "collected primer pools");

        let steps = build_steps(config, &scheme, &pools, &span);

        if config.workflow == Workflow::Medaka && !config.dry_run {
            clear_stale_consensus_chunks(&config.sample, &pools);
        }

        let log_path = PathBuf::from(format!("{}.minion.log.txt", config.sample));
        let mut log = RunLog::create(&log_path)?;
        let mut runner = ShellRunner;
        execute(&steps, &mut runner, &mut log, config.dry_run)
    }
}

/// medaka consensus refuses to overwrite an existing chunk file, so per-pool
/// leftovers from a previous run are cleared before execution starts.
fn clear_stale_consensus_chunks(sample: &str, pools: &BTreeSet<String>) {
    for pool in pools {
        let chunks = PathBuf::from(format!("{sample}.{pool}.hdf"));
        if chunks.exists() {
            let _ = fs::remove_file(&chunks);
        }
    }
}

/// Build the ordered step list for one sample. Pure and deterministic;
/// never inspects the filesystem.
pub fn build_steps(
    config: &Config,
    scheme: &SchemeRef,
    pools: &BTreeSet<String>,
    reference_span: &str,
) -> Vec<Step> {
    let sample = config.sample.as_str();
    let reads = config.reads();
    let mut steps = Vec::new();

    // Nanopolish needs its read index before the first variant pass.
    if config.workflow == Workflow::Nanopolish && !config.skip_nanopolish {
        if let (Some(fast5), Some(summary)) =
            (&config.fast5_directory, &config.sequencing_summary)
        {
            steps.push(Step::cmd(
                Command::new("nanopolish")
                    .arg("index")
                    .arg("-s")
                    .arg(summary.display().to_string())
                    .arg("-d")
                    .arg(fast5.display().to_string())
                    .arg(reads.display().to_string()),
            ));
        }
    }

    // Highly divergent samples first get a naive pileup consensus; the
    // variant-calling stages then run against that pseudo reference so the
    // polishing caller converges.
    let working_ref: PathBuf = if config.divergent {
        steps.extend(alignment_steps(config, &scheme.reference, &reads));
        steps.push(primer_trim_step(config, scheme, TrimPass::FullPair));
        steps.push(index_bam(format!("{sample}.primertrimmed.rg.sorted.bam")));
        steps.extend(pseudo_reference_steps(config, &scheme.reference));
        PathBuf::from(format!("{sample}.pseudoreference.fasta"))
    } else {
        scheme.reference.clone()
    };

    // Primary alignment against the working reference.
    steps.extend(alignment_steps(config, &working_ref, &reads));

    // Two trim passes: start-anchored feeds variant calling, full-pair
    // feeds depth masking.
    steps.push(primer_trim_step(config, scheme, TrimPass::StartAnchored));
    steps.push(primer_trim_step(config, scheme, TrimPass::FullPair));
    steps.push(index_bam(format!("{sample}.trimmed.rg.sorted.bam")));
    steps.push(index_bam(format!("{sample}.primertrimmed.rg.sorted.bam")));

    // Per-pool variant calling, in stable sorted pool order.
    match config.workflow {
        Workflow::Medaka => {
            if let Some(model) = config.medaka_model.as_deref() {
                steps.extend(medaka_pool_steps(config, model, &working_ref, pools));
            }
        }
        Workflow::Nanopolish => {
            steps.extend(nanopolish_pool_steps(
                config,
                &working_ref,
                &reads,
                pools,
                reference_span,
            ));
        }
    }

    // Merge the per-pool calls into one sample-level set.
    steps.push(merge_step(config, scheme, pools));

    if config.strict {
        steps.extend(strict_filter_steps(config, scheme));
    }

    if config.workflow == Workflow::Medaka && !config.no_longshot {
        steps.extend(longshot_steps(config, &working_ref));
    }

    steps.extend(pass_fail_steps(config));
    steps.extend(depth_mask_steps(config, &working_ref));
    steps.push(consensus_step(config));

    // Coordinates produced against a pseudo reference are not final:
    // finalization always goes back to the scheme reference.
    steps.extend(finalize_steps(config, &scheme.reference));

    if config.divergent {
        steps.push(final_variants_step(config));
    }

    if config.strict {
        steps.push(stats_step(config, scheme));
    }

    steps
}

/// Which primer-trim variant to run over the sorted alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrimPass {
    /// Trim to primer start sites; output feeds variant calling.
    StartAnchored,
    /// Trim full primer pairs; output feeds depth/mask computation.
    FullPair,
}

impl TrimPass {
    fn output(self, sample: &str) -> String {
        match self {
            TrimPass::StartAnchored => format!("{sample}.trimmed.rg.sorted.bam"),
            TrimPass::FullPair => format!("{sample}.primertrimmed.rg.sorted.bam"),
        }
    }
}

fn index_bam(bam: String) -> Step {
    Step::cmd(Command::new("samtools").arg("index").arg(bam))
}

/// Align reads to `reference`, keep mapped records, and sort into
/// `<sample>.sorted.bam`; the aligner choice branches the command shape.
fn alignment_steps(config: &Config, reference: &Path, reads: &Path) -> Vec<Step> {
    let sample = &config.sample;
    let sorted = format!("{sample}.sorted.bam");
    let view = Command::new("samtools").args(["view", "-bS", "-F", "4", "-"]);
    let sort = Command::new("samtools")
        .args(["sort", "-o"])
        .arg(&sorted)
        .arg("-");

    let mut steps = Vec::new();
    match config.aligner {
        Aligner::Minimap2 => {
            steps.push(
                Step::cmd(
                    Command::new("minimap2")
                        .args(["-a", "-x", "map-ont", "-t"])
                        .arg(config.threads.to_string())
                        .arg(reference.display().to_string())
                        .arg(reads.display().to_string()),
                )
                .pipe(view)
                .pipe(sort),
            );
        }
        Aligner::Bwa => {
            steps.push(Step::cmd(
                Command::new("bwa")
                    .arg("index")
                    .arg(reference.display().to_string()),
            ));
            steps.push(
                Step::cmd(
                    Command::new("bwa")
                        .args(["mem", "-t"])
                        .arg(config.threads.to_string())
                        .args(["-x", "ont2d"])
                        .arg(reference.display().to_string())
                        .arg(reads.display().to_string()),
                )
                .pipe(view)
                .pipe(sort),
            );
        }
    }
    steps.push(index_bam(sorted));
    steps
}

/// One `align_trim` pass over the sorted alignment, re-sorted into the
/// pass's output file. Coverage normalisation is threaded in when set.
fn primer_trim_step(config: &Config, scheme: &SchemeRef, pass: TrimPass) -> Step {
    let sample = &config.sample;
    let mut trim = Command::new("align_trim");
    if let Some(depth) = config.normalise {
        trim = trim.arg("--normalise").arg(depth.to_string());
    }
    trim = trim.arg(scheme.bed.display().to_string());
    if pass == TrimPass::StartAnchored {
        trim = trim.arg("--start");
    }
    trim = trim
        .args(["--remove-incorrect-pairs", "--report"])
        .arg(format!("{sample}.alignreport.txt"));

    Step::cmd(trim)
        .stdin_from(format!("{sample}.sorted.bam"))
        .stderr_to(format!("{sample}.alignreport.er"))
        .pipe(
            Command::new("samtools")
                .args(["sort", "-T"])
                .arg(sample)
                .arg("-")
                .arg("-o")
                .arg(pass.output(sample)),
        )
}

/// Derive a sample-specific pseudo reference: naive pileup calls against the
/// scheme reference, then a consensus of those calls.
fn pseudo_reference_steps(config: &Config, reference: &Path) -> Vec<Step> {
    let sample = &config.sample;
    let calls = format!("{sample}.pseudoreference.vcf.gz");
    vec![
        Step::cmd(
            Command::new("bcftools")
                .args(["mpileup", "--max-depth"])
                .arg(MAX_COVERAGE.to_string())
                .args(["--skip-indels", "-Ou", "-f"])
                .arg(reference.display().to_string())
                .arg(format!("{sample}.primertrimmed.rg.sorted.bam")),
        )
        .pipe(
            Command::new("bcftools")
                .args(["call", "-mv", "-Ob", "-o"])
                .arg(&calls),
        ),
        Step::cmd(Command::new("bcftools").arg("index").arg(&calls)),
        Step::cmd(
            Command::new("bcftools")
                .args(["consensus", "-f"])
                .arg(reference.display().to_string())
                .arg(&calls),
        )
        .stdout_to(format!("{sample}.pseudoreference.fasta")),
    ]
}

/// medaka fan-out: consensus chunks, variant extraction, and (when longshot
/// is disabled) read-depth annotation, once per pool.
fn medaka_pool_steps(
    config: &Config,
    model: &str,
    working_ref: &Path,
    pools: &BTreeSet<String>,
) -> Vec<Step> {
    let sample = &config.sample;
    let trimmed = format!("{sample}.trimmed.rg.sorted.bam");
    let mut steps = Vec::new();

    for pool in pools {
        let chunks = format!("{sample}.{pool}.hdf");
        let calls = format!("{sample}.{pool}.vcf");

        steps.push(Step::cmd(
            Command::new("medaka")
                .args(["consensus", "--model"])
                .arg(model)
                .arg("--threads")
                .arg(config.threads.to_string())
                .arg("--chunk_len")
                .arg(MEDAKA_CHUNK_LEN.to_string())
                .arg("--chunk_ovlp")
                .arg(MEDAKA_CHUNK_OVERLAP.to_string())
                .arg("--RG")
                .arg(pool)
                .arg(&trimmed)
                .arg(&chunks),
        ));

        let variant_mode = if config.no_indels { "snp" } else { "variant" };
        steps.push(Step::cmd(
            Command::new("medaka")
                .arg(variant_mode)
                .arg(working_ref.display().to_string())
                .arg(&chunks)
                .arg(&calls),
        ));

        if config.no_longshot {
            // Without longshot the calls still need depth annotation so the
            // pass/fail filter has something to filter on.
            steps.push(Step::cmd(
                Command::new("medaka")
                    .args(["tools", "annotate", "--pad", "25", "--RG"])
                    .arg(pool)
                    .arg(&calls)
                    .arg(working_ref.display().to_string())
                    .arg(&trimmed)
                    .arg("tmp.medaka-annotate.vcf"),
            ));
            steps.push(Step::cmd(
                Command::new("mv").arg("tmp.medaka-annotate.vcf").arg(&calls),
            ));
        }
    }
    steps
}

/// nanopolish fan-out: one signal-level calling invocation per pool over the
/// whole reference span.
fn nanopolish_pool_steps(
    config: &Config,
    working_ref: &Path,
    reads: &Path,
    pools: &BTreeSet<String>,
    reference_span: &str,
) -> Vec<Step> {
    let sample = &config.sample;
    let mut steps = Vec::new();

    for pool in pools {
        let mut call = Command::new("nanopolish")
            .args(["variants", "--min-flanking-sequence", "10", "-x"])
            .arg(config.max_haplotypes.to_string())
            .args(["--progress", "-t"])
            .arg(config.threads.to_string())
            .arg("--reads")
            .arg(reads.display().to_string())
            .arg("-o")
            .arg(format!("{sample}.{pool}.vcf"))
            .arg("-b")
            .arg(format!("{sample}.trimmed.rg.sorted.bam"))
            .arg("-g")
            .arg(working_ref.display().to_string())
            .arg("-w")
            .arg(reference_span)
            .args(["--ploidy", "1", "-m", "0.15", "--read-group"])
            .arg(pool);
        if config.no_indels {
            call = call.arg("--snps");
        }
        steps.push(Step::cmd(call));
    }
    steps
}

/// Merge the per-pool call sets into `<sample>.merged.vcf`, with the region
/// list assigning pool of origin per primer site.
fn merge_step(config: &Config, scheme: &SchemeRef, pools: &BTreeSet<String>) -> Step {
    let sample = &config.sample;
    let mut merge = Command::new("artic_vcf_merge")
        .arg(sample)
        .arg(scheme.bed.display().to_string());
    for pool in pools {
        merge = merge.arg(format!("{pool}:{sample}.{pool}.vcf"));
    }
    Step::cmd(merge).stderr_to(format!("{sample}.primersitereport.txt"))
}

/// Strict mode: drop variants failing primer-boundary or overlap checks,
/// replacing the merged set with the filtered result.
fn strict_filter_steps(config: &Config, scheme: &SchemeRef) -> Vec<Step> {
    let sample = &config.sample;
    let merged = format!("{sample}.merged.vcf");
    let filtered = format!("{sample}.merged.filtered.vcf");
    vec![
        Step::cmd(Command::new("bgzip").arg("-f").arg(&merged)),
        Step::cmd(
            Command::new("tabix")
                .args(["-p", "vcf"])
                .arg(format!("{merged}.gz")),
        ),
        Step::cmd(
            Command::new("artic-tools")
                .args(["check_vcf", "--dropPrimerVars", "--dropOverlapFails", "--vcfOut"])
                .arg(&filtered)
                .arg(format!("{merged}.gz"))
                .arg(scheme.bed.display().to_string()),
        )
        .stderr_to(format!("{sample}.vcfreport.txt")),
        Step::cmd(Command::new("mv").arg(&filtered).arg(&merged)),
    ]
}

/// Re-call the merged candidates against the primer-trimmed alignment with a
/// haplotype-free refinement pass, overwriting the merged set.
fn longshot_steps(config: &Config, working_ref: &Path) -> Vec<Step> {
    let sample = &config.sample;
    let merged = format!("{sample}.merged.vcf");
    vec![
        Step::cmd(Command::new("bgzip").arg("-f").arg(&merged)),
        Step::cmd(
            Command::new("tabix")
                .args(["-f", "-p", "vcf"])
                .arg(format!("{merged}.gz")),
        ),
        Step::cmd(
            Command::new("longshot")
                .args(["-P", "0", "-F", "--max_cov"])
                .arg(MAX_COVERAGE.to_string())
                .arg("--no_haps")
                .arg("--bam")
                .arg(format!("{sample}.primertrimmed.rg.sorted.bam"))
                .arg("--ref")
                .arg(working_ref.display().to_string())
                .arg("--out")
                .arg(&merged)
                .arg("--potential_variants")
                .arg(format!("{merged}.gz")),
        ),
    ]
}

/// Partition the merged set into PASS and FAIL lists, then index the PASS
/// set for consensus application.
fn pass_fail_steps(config: &Config) -> Vec<Step> {
    let sample = &config.sample;
    let pass = format!("{sample}.pass.vcf");
    let mut filter =
        Command::new("artic_vcf_filter").arg(format!("--{}", config.workflow.as_str()));
    // Frameshift exclusion only means anything when indels are being called.
    if config.no_frameshifts && !config.no_indels {
        filter = filter.arg("--no-frameshifts");
    }
    filter = filter
        .arg(format!("{sample}.merged.vcf"))
        .arg(&pass)
        .arg(format!("{sample}.fail.vcf"));
    vec![
        Step::cmd(filter),
        Step::cmd(Command::new("bgzip").arg("-f").arg(&pass)),
        Step::cmd(
            Command::new("tabix")
                .args(["-p", "vcf"])
                .arg(format!("{pass}.gz")),
        ),
    ]
}

/// Depth-of-coverage mask: per-pool depths, the aggregate coverage mask, and
/// the masked pre-consensus sequence.
fn depth_mask_steps(config: &Config, working_ref: &Path) -> Vec<Step> {
    let sample = &config.sample;
    vec![
        Step::cmd(
            Command::new("artic_make_depth_mask")
                .arg("--store-rg-depths")
                .arg(working_ref.display().to_string())
                .arg(format!("{sample}.primertrimmed.rg.sorted.bam"))
                .arg(format!("{sample}.coverage_mask.txt")),
        ),
        Step::cmd(
            Command::new("artic_mask")
                .arg(working_ref.display().to_string())
                .arg(format!("{sample}.coverage_mask.txt"))
                .arg(format!("{sample}.preconsensus.fasta")),
        ),
    ]
}

/// Apply the PASS set plus the coverage mask to the pre-consensus sequence.
fn consensus_step(config: &Config) -> Step {
    let sample = &config.sample;
    Step::cmd(
        Command::new("bcftools")
            .args(["consensus", "-f"])
            .arg(format!("{sample}.preconsensus.fasta"))
            .arg(format!("{sample}.pass.vcf.gz"))
            .arg("-m")
            .arg(format!("{sample}.coverage_mask.txt"))
            .arg("-o")
            .arg(format!("{sample}.consensus.fasta")),
    )
}

/// Header-annotate the consensus, then align it against the scheme reference.
fn finalize_steps(config: &Config, reference: &Path) -> Vec<Step> {
    let sample = &config.sample;
    let header = format!("{sample}/ARTIC/{}", config.workflow.as_str());
    vec![
        Step::cmd(
            Command::new("artic_fasta_header")
                .arg(format!("{sample}.consensus.fasta"))
                .arg(header),
        ),
        Step::cmd(
            Command::new("cat")
                .arg(reference.display().to_string())
                .arg(format!("{sample}.consensus.fasta")),
        )
        .stdout_to(format!("{sample}.mafft.in.fasta")),
        Step::cmd(
            Command::new("mafft")
                .args(["--auto", "--preservecase", "--thread", "-1"])
                .arg(format!("{sample}.mafft.in.fasta")),
        )
        .stdout_to(format!("{sample}.mafft.out.fasta")),
    ]
}

/// Divergent mode only: derive a final variant set relative to the scheme
/// reference from the finalization alignment. Best-effort; intermediate
/// call sets are pseudo-reference-relative and stay unreliable either way.
fn final_variants_step(config: &Config) -> Step {
    let sample = &config.sample;
    Step::cmd(
        Command::new("snp-sites")
            .arg("-v")
            .arg(format!("{sample}.mafft.out.fasta")),
    )
    .stdout_to(format!("{sample}.final.vcf"))
    .best_effort()
}

/// Strict mode only: aggregate region-coverage and filtering statistics.
fn stats_step(config: &Config, scheme: &SchemeRef) -> Step {
    let sample = &config.sample;
    Step::cmd(
        Command::new("artic_get_stats")
            .arg("--scheme")
            .arg(scheme.bed.display().to_string())
            .arg("--align-report")
            .arg(format!("{sample}.alignreport.txt"))
            .arg("--vcf-report")
            .arg(format!("{sample}.vcfreport.txt"))
            .arg(sample),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn pools(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn test_scheme() -> SchemeRef {
        SchemeRef {
            name: "nCoV-2019".into(),
            version: "3".into(),
            bed: PathBuf::from("schemes/nCoV-2019/V3/nCoV-2019.primer.bed"),
            reference: PathBuf::from("schemes/nCoV-2019/V3/nCoV-2019.reference.fasta"),
        }
    }

    fn config_from(extra: &[&str]) -> Config {
        let mut args = vec![
            "rartic",
            "nCoV-2019",
            "sample1",
            "--read-file",
            "sample1.fastq",
        ];
        args.extend(extra);
        Config::try_parse_from(args).expect("test config parses")
    }

    fn medaka_config(extra: &[&str]) -> Config {
        let mut args = vec!["--workflow", "medaka", "--medaka-model", "r941_min_high_g360"];
        args.extend(extra);
        config_from(&args)
    }

    fn rendered(steps: &[Step]) -> Vec<String> {
        steps.iter().map(Step::to_string).collect()
    }

    const SPAN: &str = "MN908947.3:1-29904";

    #[test]
    fn build_is_deterministic() {
        let config = medaka_config(&["--divergent", "--strict"]);
        let scheme = test_scheme();
        let pools = pools(&["pool_1", "pool_2"]);
        let first = build_steps(&config, &scheme, &pools, SPAN);
        let second = build_steps(&config, &scheme, &pools, SPAN);
        assert_eq!(first, second);
    }

    #[test]
    fn pool_fanout_emits_one_caller_per_pool() {
        let config = medaka_config(&[]);
        let steps = build_steps(
            &config,
            &test_scheme(),
            &pools(&["pool_1", "pool_2", "pool_3"]),
            SPAN,
        );
        let consensus: Vec<String> = rendered(&steps)
            .into_iter()
            .filter(|s| s.starts_with("medaka consensus"))
            .collect();
        assert_eq!(consensus.len(), 3);
        for (text, pool) in consensus.iter().zip(["pool_1", "pool_2", "pool_3"]) {
            assert!(
                text.contains(&format!("--RG {pool}")),
                "pool order is sorted and distinct: {text}"
            );
        }
    }

    #[test]
    fn nanopolish_fanout_embeds_the_reference_span() {
        let config = config_from(&[
            "--fast5-directory",
            "fast5/",
            "--sequencing-summary",
            "summary.txt",
        ]);
        let steps = build_steps(&config, &test_scheme(), &pools(&["pool_1"]), SPAN);
        let text = rendered(&steps);

        assert!(text[0].starts_with("nanopolish index"), "{}", text[0]);
        let caller = text
            .iter()
            .find(|s| s.starts_with("nanopolish variants"))
            .expect("per-pool caller emitted");
        assert!(caller.contains(SPAN));
        assert!(caller.contains("--ploidy 1"));
        assert!(caller.contains("-m 0.15"));
        assert!(caller.contains("--read-group pool_1"));
    }

    #[test]
    fn skipping_the_first_pass_drops_read_indexing() {
        let config = config_from(&["--skip-nanopolish"]);
        let steps = build_steps(&config, &test_scheme(), &pools(&["pool_1"]), SPAN);
        assert!(
            rendered(&steps)
                .iter()
                .all(|s| !s.starts_with("nanopolish index")),
            "no indexing step when the first pass is skipped"
        );
    }

    #[test]
    fn no_indels_switches_medaka_to_snp_calling() {
        let config = medaka_config(&["--no-indels"]);
        let text = rendered(&build_steps(
            &config,
            &test_scheme(),
            &pools(&["pool_1"]),
            SPAN,
        ));
        assert!(text.iter().any(|s| s.starts_with("medaka snp")));
        assert!(text.iter().all(|s| !s.starts_with("medaka variant")));
    }

    #[test]
    fn longshot_refines_merged_calls_unless_disabled() {
        let refined = rendered(&build_steps(
            &medaka_config(&[]),
            &test_scheme(),
            &pools(&["pool_1"]),
            SPAN,
        ));
        assert!(refined.iter().any(|s| s.starts_with("longshot")));
        assert!(refined.iter().all(|s| !s.contains("medaka tools annotate")));

        let annotated = rendered(&build_steps(
            &medaka_config(&["--no-longshot"]),
            &test_scheme(),
            &pools(&["pool_1"]),
            SPAN,
        ));
        assert!(annotated.iter().all(|s| !s.starts_with("longshot")));
        assert!(annotated.iter().any(|s| s.contains("medaka tools annotate")));
    }

    #[test]
    fn normalise_threads_into_both_trim_passes() {
        let config = medaka_config(&["--normalise", "200"]);
        let trims: Vec<String> = rendered(&build_steps(
            &config,
            &test_scheme(),
            &pools(&["pool_1"]),
            SPAN,
        ))
        .into_iter()
        .filter(|s| s.starts_with("align_trim"))
        .collect();
        assert_eq!(trims.len(), 2);
        assert!(trims.iter().all(|s| s.contains("--normalise 200")));
        assert!(trims.iter().filter(|s| s.contains("--start")).count() == 1);
    }

    #[test]
    fn frameshift_exclusion_requires_indels_to_be_called() {
        let on = rendered(&build_steps(
            &medaka_config(&["--no-frameshifts"]),
            &test_scheme(),
            &pools(&["pool_1"]),
            SPAN,
        ));
        assert!(on.iter().any(|s| s.contains("--no-frameshifts")));

        let off = rendered(&build_steps(
            &medaka_config(&["--no-frameshifts", "--no-indels"]),
            &test_scheme(),
            &pools(&["pool_1"]),
            SPAN,
        ));
        assert!(off.iter().all(|s| !s.contains("--no-frameshifts")));
    }

    #[test]
    fn strict_mode_filters_and_reports() {
        let text = rendered(&build_steps(
            &medaka_config(&["--strict"]),
            &test_scheme(),
            &pools(&["pool_1"]),
            SPAN,
        ));
        assert!(text.iter().any(|s| s.contains("artic-tools check_vcf")));
        let stats = text.last().expect("stats step is final");
        assert!(stats.starts_with("artic_get_stats"), "{stats}");
    }

    #[test]
    fn divergent_mode_swaps_and_restores_the_reference() {
        let config = medaka_config(&["--divergent"]);
        let scheme = test_scheme();
        let text = rendered(&build_steps(&config, &scheme, &pools(&["pool_1"]), SPAN));
        let reference = scheme.reference.display().to_string();
        let pseudo = "sample1.pseudoreference.fasta";

        // The variant-calling alignment runs against the pseudo reference...
        let alignments: Vec<&String> =
            text.iter().filter(|s| s.starts_with("minimap2")).collect();
        assert_eq!(alignments.len(), 2);
        assert!(alignments[0].contains(&reference), "pre-pass uses the scheme reference");
        assert!(alignments[1].contains(pseudo), "primary pass uses the pseudo reference");

        // ...and masking does too, but finalization restores the original.
        let mask = text
            .iter()
            .find(|s| s.starts_with("artic_make_depth_mask"))
            .expect("mask step");
        assert!(mask.contains(pseudo));
        let concat = text
            .iter()
            .find(|s| s.starts_with("cat "))
            .expect("finalization concat");
        assert!(concat.contains(&reference));
        assert!(!concat.contains(pseudo));

        // Divergent runs also re-derive final calls against the original.
        assert!(text.iter().any(|s| s.starts_with("snp-sites")));
    }

    #[test]
    fn bwa_branch_adds_reference_indexing() {
        let config = medaka_config(&["--aligner", "bwa"]);
        let text = rendered(&build_steps(
            &config,
            &test_scheme(),
            &pools(&["pool_1"]),
            SPAN,
        ));
        assert!(text.iter().any(|s| s.starts_with("bwa index")));
        assert!(text.iter().any(|s| s.starts_with("bwa mem")));
        assert!(text.iter().all(|s| !s.starts_with("minimap2")));
    }

    #[test]
    fn merge_assigns_pool_of_origin_in_sorted_order() {
        let config = medaka_config(&[]);
        let text = rendered(&build_steps(
            &config,
            &test_scheme(),
            &pools(&["pool_2", "pool_1"]),
            SPAN,
        ));
        let merge = text
            .iter()
            .find(|s| s.starts_with("artic_vcf_merge"))
            .expect("merge step");
        assert!(merge.contains("pool_1:sample1.pool_1.vcf pool_2:sample1.pool_2.vcf"));
    }
}
