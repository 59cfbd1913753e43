use crate::artifact::{dir_is_populated, ArtifactCache, WriteOutcome};
use crate::error::{BindnSeqError, Result};
use crate::fasta::write_fasta_to;
use crate::rank::{rank_enriched_kmers, select_by_fold_change};
use crate::types::{EnrichmentTable, RankMethod, RankedKmer};
use log::{debug, info};
use polars::prelude::{Column, DataFrame};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Collects the kmers of the requested lengths whose enrichment reaches `fold_cutoff`.
///
/// Lengths are visited in the order given and kmers keep their rank order within a
/// length.
///
/// # Errors
/// * `BindnSeqError::MissingData` if a requested kmer length was never loaded
pub fn select_motif_seeds(
    tables: &BTreeMap<usize, EnrichmentTable>,
    kmer_lens: &[usize],
    fold_cutoff: f64,
    method: RankMethod,
) -> Result<Vec<RankedKmer>> {
    let mut seeds = Vec::new();
    for &kmer_len in kmer_lens {
        let table = tables.get(&kmer_len).ok_or_else(|| {
            BindnSeqError::missing_data(format!("no odds ratios loaded for k = {}", kmer_len))
        })?;
        let enriched = select_by_fold_change(&rank_enriched_kmers(table, method), fold_cutoff);
        debug!(
            "{} of {} {}-mers reach fold change {:.1}",
            enriched.len(),
            table.len(),
            kmer_len,
            fold_cutoff
        );
        seeds.extend(enriched.kmers);
    }
    Ok(seeds)
}

/// Pseudo-FASTA frame where every kmer is its own record: label and sequence are both
/// the kmer.
pub fn seeds_to_fasta_frame(seeds: &[RankedKmer]) -> Result<DataFrame> {
    let kmers: Vec<&str> = seeds.iter().map(|k| k.kmer()).collect();
    let df = DataFrame::new(vec![
        Column::new("label".into(), kmers.clone()),
        Column::new("sequence".into(), kmers),
    ])?;
    Ok(df)
}

/// File name of the seed FASTA, e.g. `enriched_kmers.cutoff_2.0.method_max.all_kmers.fasta`
pub fn seed_fasta_name(fold_cutoff: f64, method: RankMethod, kmer_len: Option<usize>) -> String {
    let lens = kmer_len.map_or_else(|| "all".to_string(), |k| k.to_string());
    format!(
        "enriched_kmers.cutoff_{:.1}.method_{}.{}_kmers.fasta",
        fold_cutoff, method, lens
    )
}

/// Writes the seed kmers as pseudo-FASTA unless the file already exists.
pub fn write_seed_fasta<P: AsRef<Path>>(
    cache: &mut ArtifactCache,
    seeds: &[RankedKmer],
    filename: P,
) -> Result<WriteOutcome> {
    let df = seeds_to_fasta_frame(seeds)?;
    info!(
        "Outputting {} sequences as FASTA to: {}",
        df.height(),
        filename.as_ref().display()
    );
    cache.write_once(filename, |out| write_fasta_to(&df, out))
}

/// External motif discovery run over a FASTA file
pub trait MotifDiscovery {
    fn discover(&self, fasta: &Path, output_dir: &Path) -> Result<()>;
}

/// Runs the MEME suite's `meme` executable
#[derive(Debug, Clone)]
pub struct MemeCommand {
    pub program: PathBuf,
    /// Arguments passed after the input FASTA and output directory
    pub args: Vec<String>,
}

impl Default for MemeCommand {
    fn default() -> Self {
        MemeCommand {
            program: PathBuf::from("meme"),
            args: ["-dna", "-revcomp", "-mod", "zoops", "-nmotifs", "5", "-minw", "4"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl MotifDiscovery for MemeCommand {
    fn discover(&self, fasta: &Path, output_dir: &Path) -> Result<()> {
        debug!(
            "Running {} on {} -> {}",
            self.program.display(),
            fasta.display(),
            output_dir.display()
        );
        let status = Command::new(&self.program)
            .arg(fasta)
            .arg("-oc")
            .arg(output_dir)
            .args(&self.args)
            .status()
            .map_err(|e| {
                BindnSeqError::ExternalTool(format!("cannot start {}: {}", self.program.display(), e))
            })?;
        if !status.success() {
            return Err(BindnSeqError::ExternalTool(format!(
                "{} exited with {}",
                self.program.display(),
                status
            )));
        }
        Ok(())
    }
}

/// Runs motif discovery unless `output_dir` already holds results.
///
/// # Returns
/// * `WriteOutcome::Skipped` if `output_dir` was already populated; the tool is not run
pub fn run_motif_discovery(
    tool: &dyn MotifDiscovery,
    fasta: &Path,
    output_dir: &Path,
) -> Result<WriteOutcome> {
    fs::create_dir_all(output_dir)?;
    info!("  - MEME output dir: {}", output_dir.display());
    if dir_is_populated(output_dir)? {
        info!("MEME output exists. Skipping...");
        return Ok(WriteOutcome::Skipped);
    }
    tool.discover(fasta, output_dir)?;
    Ok(WriteOutcome::Written)
}
