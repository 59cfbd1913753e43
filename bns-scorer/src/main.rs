use bindnseq_rs::artifact::WriteOutcome;
use bindnseq_rs::scanner::KmerScanner;
use bindnseq_rs::seeds::MemeCommand;
use bindnseq_rs::{BindnSeq, BindnSeqError, RegionSource, ScoringConfig};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(thiserror::Error, Debug)]
pub enum ScorerError {
    #[error(transparent)]
    BindnSeq(#[from] BindnSeqError),

    #[error("Invalid region argument '{0}', expected NAME=FASTA")]
    InvalidRegionArg(String),
}

#[derive(Parser)]
#[command(
    name = "bns-scorer",
    about = "Ranks Bind-n-Seq enriched kmers and scores their occurrences across genomic regions",
    long_about = "Loads Bind-n-Seq odds ratio tables (<k>mer_OR), ranks kmers by enrichment across \
                  protein concentrations and selects the enriched ones. The score command writes \
                  per-region kmer densities and BED-Detail tracks of every occurrence; the seeds \
                  command writes enriched kmers as FASTA for motif discovery.",
    version,
    after_help = "Example usage:\n    \
                  bns-scorer score bns_results/ scores/ --region 3p_utr=utrs.fa --region cds=cds.fa\n    \
                  bns-scorer seeds bns_results/ seeds/ --cutoff 2.5 --meme",
    color = clap::ColorChoice::Always
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML file with scoring parameters; command line flags take precedence
    #[arg(long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Log debug messages (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct RunArgs {
    /// Directory holding the <k>mer_OR odds ratio tables
    #[arg(value_name = "RESULTS_DIR")]
    results_dir: PathBuf,

    /// Directory where outputs are written; created if missing
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Enrichment method across concentrations: max or mean
    #[arg(long)]
    method: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score enriched kmer density and positions in genomic regions
    Score {
        #[command(flatten)]
        run: RunArgs,

        /// Region set and its FASTA, as NAME=FASTA (repeatable). A bare NAME is skipped
        #[arg(long = "region", value_name = "NAME=FASTA")]
        regions: Vec<String>,

        /// Kmer lengths to score, comma separated
        #[arg(long = "kmer-lens", value_delimiter = ',')]
        kmer_lens: Option<Vec<usize>>,

        /// Percentile of kmer enrichment used as the enrichment cutoff
        #[arg(long)]
        percentile: Option<f64>,

        /// Genome assembly for the BED track header
        #[arg(long)]
        genome: Option<String>,

        /// Also place occurrences from plus strand regions
        #[arg(long)]
        plus_strand: bool,
    },

    /// Write enriched kmers as FASTA and optionally run MEME on them
    Seeds {
        #[command(flatten)]
        run: RunArgs,

        /// Minimum fold enrichment of a seed kmer
        #[arg(long)]
        cutoff: Option<f64>,

        /// Only write seeds of this kmer length
        #[arg(long)]
        kmer_len: Option<usize>,

        /// Run MEME on the seed FASTA
        #[arg(long)]
        meme: bool,

        /// MEME executable
        #[arg(long, default_value = "meme")]
        meme_bin: PathBuf,
    },
}

fn parse_region(arg: &str) -> Result<RegionSource, ScorerError> {
    match arg.split_once('=') {
        Some((name, _)) if name.is_empty() => Err(ScorerError::InvalidRegionArg(arg.to_string())),
        Some((name, fasta)) => Ok(RegionSource::new(name, Some(PathBuf::from(fasta)))),
        None if !arg.is_empty() => Ok(RegionSource::new(arg, None)),
        None => Err(ScorerError::InvalidRegionArg(arg.to_string())),
    }
}

fn load_config(cli: &Cli) -> Result<ScoringConfig, ScorerError> {
    let mut config = match &cli.config {
        Some(path) => ScoringConfig::from_toml_file(path)?,
        None => ScoringConfig::default(),
    };

    let run = match &cli.command {
        Commands::Score {
            run,
            kmer_lens,
            percentile,
            genome,
            plus_strand,
            ..
        } => {
            if let Some(kmer_lens) = kmer_lens {
                config.kmer_lens = kmer_lens.clone();
            }
            if let Some(percentile) = percentile {
                config.percentile = *percentile;
            }
            if let Some(genome) = genome {
                config.genome = genome.clone();
            }
            config.project_plus_strand |= *plus_strand;
            run
        }
        Commands::Seeds { run, cutoff, .. } => {
            if let Some(cutoff) = cutoff {
                config.seed_fc_cutoff = *cutoff;
            }
            run
        }
    };
    if let Some(method) = &run.method {
        config.method = method.clone();
    }

    Ok(config)
}

fn run(cli: Cli) -> Result<(), ScorerError> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Score { run, regions, .. } => {
            let regions = regions
                .iter()
                .map(|arg| parse_region(arg))
                .collect::<Result<Vec<_>, _>>()?;
            let mut bns = BindnSeq::new(&run.results_dir, &run.output_dir, config)?;
            bns.load_odds_ratios()?;
            info!("Scoring enriched motifs for: {:?}", bns.config.kmer_lens);

            let reports = bns.score_regions(&KmerScanner, &regions)?;
            for report in &reports {
                info!(
                    "{} ({}-mer): {} sequences, {} BED entries{}",
                    report.region,
                    report.kmer_len,
                    report.num_sequences,
                    report.num_intervals,
                    if report.bed_outcome == WriteOutcome::Skipped {
                        " (BED already present)"
                    } else {
                        ""
                    }
                );
            }
        }
        Commands::Seeds {
            run,
            kmer_len,
            meme,
            meme_bin,
            ..
        } => {
            let mut bns = BindnSeq::new(&run.results_dir, &run.output_dir, config)?;
            bns.load_odds_ratios()?;
            if meme {
                let tool = MemeCommand {
                    program: meme_bin,
                    ..MemeCommand::default()
                };
                bns.run_meme_on_enriched_kmers(&tool, kmer_len)?;
            } else {
                let fasta = bns.write_motif_seeds(kmer_len)?;
                info!("Seed kmers in {}", fasta.display());
            }
        }
    }

    Ok(())
}

/// Writes a fatal error to `out` regardless of the log filter
fn report_failure<W: Write>(error: &ScorerError, out: &mut W) -> ExitCode {
    // nothing else can be reported if stderr itself is gone
    let _ = writeln!(out, "Error: {}", error);
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    let start_time = std::time::Instant::now();

    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    if let Err(e) = run(cli) {
        error!("{}", e);
        return report_failure(&e, &mut io::stderr());
    }

    let elapsed = start_time.elapsed();
    info!(
        "Total execution time: {:.4} minutes",
        elapsed.as_secs_f64() / 60.0
    );
    ExitCode::SUCCESS
}
