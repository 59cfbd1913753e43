use crate::artifact::{ArtifactCache, WriteOutcome};
use crate::config::ScoringConfig;
use crate::density::{aggregate_by_transcript, write_density_table, write_transcript_table, DensityWeighter};
use crate::error::{BindnSeqError, Result};
use crate::fasta::{labelled_sequences, read_fasta};
use crate::projection::{write_bed_detail, CoordinateProjector};
use crate::rank::{rank_enriched_kmers, select_enriched};
use crate::scanner::SequenceScanner;
use crate::seeds::{run_motif_discovery, seed_fasta_name, select_motif_seeds, write_seed_fasta, MotifDiscovery};
use crate::tables::load_odds_ratios;
use crate::types::*;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Region whose per-gene summary pools exons by transcript
const CDS_REGION: &str = "cds";

/// A named set of genomic regions (e.g. `3p_utr`) and the FASTA holding their sequences
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSource {
    pub name: String,
    pub fasta: Option<PathBuf>,
}

impl RegionSource {
    pub fn new(name: impl Into<String>, fasta: Option<PathBuf>) -> Self {
        RegionSource {
            name: name.into(),
            fasta,
        }
    }
}

/// What scoring one region set for one kmer length produced
#[derive(Debug, Clone, PartialEq)]
pub struct RegionReport {
    pub kmer_len: usize,
    pub region: String,
    pub num_sequences: usize,
    pub density_file: PathBuf,
    pub bed_file: PathBuf,
    pub bed_outcome: WriteOutcome,
    /// Intervals written to the BED file; zero when it was skipped
    pub num_intervals: usize,
}

/// One Bind-n-Seq analysis run: odds ratio tables plus an output directory
pub struct BindnSeq {
    pub results_dir: PathBuf,
    pub output_dir: PathBuf,
    pub config: ScoringConfig,
    /// Odds ratio tables keyed by kmer length
    pub odds_ratios: BTreeMap<usize, EnrichmentTable>,
    cache: ArtifactCache,
}

impl BindnSeq {
    /// Sets up a run without loading anything.
    ///
    /// # Errors
    /// * Invalid configuration values, see `ScoringConfig::validate`
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        results_dir: P,
        output_dir: Q,
        config: ScoringConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(BindnSeq {
            results_dir: results_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
            config,
            odds_ratios: BTreeMap::new(),
            cache: ArtifactCache::new(),
        })
    }

    /// (Re)loads every odds ratio table in the results directory
    pub fn load_odds_ratios(&mut self) -> Result<&BTreeMap<usize, EnrichmentTable>> {
        self.odds_ratios = load_odds_ratios(&self.results_dir, &self.config.conc_suffix)?;
        Ok(&self.odds_ratios)
    }

    fn table(&self, kmer_len: usize) -> Result<&EnrichmentTable> {
        if self.odds_ratios.is_empty() {
            return Err(BindnSeqError::missing_data(
                "cannot score enriched kmers since no odds ratio data is loaded",
            ));
        }
        self.odds_ratios.get(&kmer_len).ok_or_else(|| {
            BindnSeqError::missing_data(format!(
                "cannot score enriched kmers for k = {} since its data is not loaded",
                kmer_len
            ))
        })
    }

    /// Kmers of one length passing the configured percentile cutoff, in rank order
    pub fn enriched_kmers(&self, kmer_len: usize) -> Result<EnrichedSet> {
        let table = self.table(kmer_len)?;
        debug!(
            "Ranking {} {}-mers over {}",
            table.len(),
            kmer_len,
            table.conditions.join(", ")
        );
        let ranked = rank_enriched_kmers(table, self.config.rank_method()?);
        let enriched = select_enriched(&ranked, self.config.percentile)?;
        info!(
            "  - Fold for {} cutoff: {:.2} ({} enriched kmers)",
            kmer_len,
            enriched.cutoff,
            enriched.len()
        );
        Ok(enriched)
    }

    /// Scores enriched kmers in every region set for every configured kmer length.
    ///
    /// For each pair this writes a density table, a BED-Detail file of kmer
    /// occurrences and, for `cds`, a per-gene summary. Region sets whose FASTA is
    /// missing or unreadable are logged and skipped.
    ///
    /// Every region set is weighed before anything is written, so an error while
    /// scoring leaves the output directory untouched.
    pub fn score_regions<S: SequenceScanner>(
        &mut self,
        scanner: &S,
        regions: &[RegionSource],
    ) -> Result<Vec<RegionReport>> {
        info!("Outputting enriched kmers scores...");
        info!("  - Output dir: {}", self.output_dir.display());
        info!("  - Method: {}", self.config.method);

        let kmer_lens = self.config.kmer_lens.clone();
        for &kmer_len in &kmer_lens {
            self.table(kmer_len)?;
        }

        let mut sources = Vec::with_capacity(regions.len());
        for source in regions {
            if let Some(sequences) = read_region_sequences(source)? {
                sources.push((source.name.as_str(), sequences));
            }
        }

        let weighter = DensityWeighter::from_config(&self.config);
        let mut scored = Vec::with_capacity(kmer_lens.len());
        for kmer_len in kmer_lens {
            let enriched = self.enriched_kmers(kmer_len)?;
            let kmers = enriched.kmer_strings();
            let mut records = Vec::with_capacity(sources.len());
            for (region, sequences) in &sources {
                debug!(
                    "Scoring {} {}-mers in {} {} sequences",
                    kmers.len(),
                    kmer_len,
                    sequences.len(),
                    region
                );
                let counts: Vec<RegionCounts> = sequences
                    .iter()
                    .map(|(label, seq)| scanner.count_kmers(label, seq, &kmers))
                    .collect();
                records.push(weighter.weigh_regions(&enriched, &counts)?);
            }
            scored.push((enriched, records));
        }

        fs::create_dir_all(&self.output_dir)?;
        let mut reports = Vec::new();
        for (enriched, records) in &scored {
            for ((region, sequences), records) in sources.iter().zip(records) {
                reports.push(self.write_region(scanner, enriched, region, sequences, records)?);
            }
        }
        Ok(reports)
    }

    fn write_region<S: SequenceScanner>(
        &mut self,
        scanner: &S,
        enriched: &EnrichedSet,
        region: &str,
        sequences: &[(String, String)],
        records: &[DensityRecord],
    ) -> Result<RegionReport> {
        let kmer_len = enriched.kmer_len;

        let density_file = self
            .output_dir
            .join(format!("enriched_kmers.{}.{}_kmer.txt", region, kmer_len));
        info!("Outputting summary file to: {}", density_file.display());
        write_density_table(records, enriched, &density_file)?;

        if region == CDS_REGION {
            let per_gene_file = self
                .output_dir
                .join(format!("enriched_kmers.{}.{}_kmer.per_gene.txt", region, kmer_len));
            info!("Outputting CDS kmers per gene to: {}", per_gene_file.display());
            write_transcript_table(&aggregate_by_transcript(records, kmer_len), &per_gene_file)?;
        }

        let bed_file = self
            .output_dir
            .join(format!("enriched_kmers.{}.{}_kmer.bed", region, kmer_len));
        let (bed_outcome, num_intervals) = if self.cache.contains(&bed_file) {
            info!("Found BED file {}. Skipping...", bed_file.display());
            (WriteOutcome::Skipped, 0)
        } else {
            let kmers = enriched.kmer_strings();
            let intervals = self.project_sequences(scanner, enriched, sequences, &kmers);
            let track_desc = format!("BNS enriched kmers ({}, {}-mer)", region, kmer_len);
            let outcome = write_bed_detail(
                &mut self.cache,
                &bed_file,
                &track_desc,
                &self.config.genome,
                &intervals,
            )?;
            (outcome, intervals.len())
        };

        Ok(RegionReport {
            kmer_len,
            region: region.to_string(),
            num_sequences: sequences.len(),
            density_file,
            bed_file,
            bed_outcome,
            num_intervals,
        })
    }

    fn project_sequences<S: SequenceScanner>(
        &self,
        scanner: &S,
        enriched: &EnrichedSet,
        sequences: &[(String, String)],
        kmers: &[&str],
    ) -> Vec<GenomicInterval> {
        let projector = CoordinateProjector::from_config(enriched.kmer_len, &self.config);
        let fold_changes = enriched.fold_change_map();

        let mut intervals = Vec::new();
        for (label, seq) in sequences {
            let region = match RegionId::parse(label) {
                Ok(region) => region,
                Err(e) => {
                    warn!("{}; no BED entries for this sequence", e);
                    continue;
                }
            };
            let hits = scanner.kmer_starts(seq, kmers);
            intervals.extend(projector.project(&region, &hits, &fold_changes));
        }
        intervals
    }

    /// Writes enriched kmers of the seed lengths as pseudo-FASTA under `seqs/`.
    ///
    /// `kmer_len` restricts output to a single seed length.
    pub fn write_motif_seeds(&mut self, kmer_len: Option<usize>) -> Result<PathBuf> {
        let method = self.config.rank_method()?;
        let lens: Vec<usize> = self
            .config
            .seed_kmer_lens
            .iter()
            .copied()
            .filter(|&k| kmer_len.map_or(true, |wanted| wanted == k))
            .collect();
        if lens.is_empty() {
            warn!(
                "Kmer length {:?} is not among the seed lengths {:?}; seed file will be empty",
                kmer_len, self.config.seed_kmer_lens
            );
        }

        let seeds = select_motif_seeds(
            &self.odds_ratios,
            &lens,
            self.config.seed_fc_cutoff,
            method,
        )?;
        let fasta = self.output_dir.join("seqs").join(seed_fasta_name(
            self.config.seed_fc_cutoff,
            method,
            kmer_len,
        ));
        write_seed_fasta(&mut self.cache, &seeds, &fasta)?;
        Ok(fasta)
    }

    /// Writes the seed FASTA and hands it to a motif discovery tool, unless the
    /// tool's output directory (`meme_output/`) is already populated.
    pub fn run_meme_on_enriched_kmers(
        &mut self,
        tool: &dyn MotifDiscovery,
        kmer_len: Option<usize>,
    ) -> Result<WriteOutcome> {
        info!("Running MEME on enriched BindnSeq kmers...");
        info!("  - Output dir: {}", self.output_dir.display());
        info!("  - Fold enrichment cutoff: {:.1}", self.config.seed_fc_cutoff);
        info!("  - Enrichment method: {}", self.config.method);
        let fasta = self.write_motif_seeds(kmer_len)?;
        run_motif_discovery(tool, &fasta, &self.output_dir.join("meme_output"))
    }
}

/// Labelled sequences of a region set, or `None` when its FASTA is missing or unusable
fn read_region_sequences(source: &RegionSource) -> Result<Option<Vec<(String, String)>>> {
    let Some(fasta) = source.fasta.as_ref().filter(|path| path.is_file()) else {
        warn!("No sequences for region {}; skipping", source.name);
        return Ok(None);
    };
    match read_fasta(fasta) {
        Ok(df) => Ok(Some(labelled_sequences(&df)?)),
        Err(e @ (BindnSeqError::Io(_) | BindnSeqError::InvalidFileFormat(_))) => {
            warn!(
                "Cannot read sequences for region {} from {}: {}; skipping",
                source.name,
                fasta.display(),
                e
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

impl fmt::Display for BindnSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BindnSeq(input_dir={})", self.results_dir.display())
    }
}
