use crate::config::ScoringConfig;
use crate::error::{BindnSeqError, Result};
use crate::types::{join_values, DensityRecord, EnrichedSet, RegionCounts, RegionId};
use log::{debug, warn};
use ndarray::{Array1, Zip};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

const KB: f64 = 1000.0;

/// Number of positions a kmer can start at, in kilobases
pub fn start_positions_in_kb(seq_len: usize, kmer_len: usize) -> f64 {
    (seq_len as f64 - kmer_len as f64 + 1.0) / KB
}

/// Turns observed kmer counts into a per-kilobase density of strongly enriched kmers.
///
/// Kmers whose fold change is below `fc_filter` are dropped from the density even if
/// they passed the percentile cutoff. Densities never fall below `min_density`, and
/// regions shorter than `min_seq_len` are pinned to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityWeighter {
    pub fc_filter: f64,
    pub min_density: f64,
    pub min_seq_len: usize,
}

impl DensityWeighter {
    pub fn new(fc_filter: f64, min_density: f64, min_seq_len: usize) -> Self {
        DensityWeighter {
            fc_filter,
            min_density,
            min_seq_len,
        }
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self::new(config.fc_filter, config.min_density, config.min_seq_len)
    }

    /// Scores one region.
    ///
    /// # Arguments
    /// * `fold_changes` - Fold change of each enriched kmer, in rank order
    /// * `kmer_len` - Length of the enriched kmers
    /// * `counts` - Observed counts aligned with `fold_changes`
    ///
    /// # Errors
    /// * `BindnSeqError::CountVectorMismatch` if `counts` and `fold_changes` differ in length
    pub fn weigh(
        &self,
        fold_changes: &Array1<f64>,
        kmer_len: usize,
        counts: &RegionCounts,
    ) -> Result<DensityRecord> {
        if counts.obs_counts.len() != fold_changes.len() {
            return Err(BindnSeqError::count_mismatch(
                &counts.region,
                fold_changes.len(),
                counts.obs_counts.len(),
            ));
        }

        let raw: Array1<u32> = Array1::from_vec(counts.obs_counts.clone());
        let filtered: Array1<u32> = Zip::from(&raw)
            .and(fold_changes)
            .map_collect(|&count, &fc| if fc >= self.fc_filter { count } else { 0 });
        let filtered_counts: u64 = filtered.iter().map(|&c| c as u64).sum();

        let effective_kb = start_positions_in_kb(counts.seq_len, kmer_len);
        let (weighted_density, max_kmer_fc) =
            if counts.seq_len < self.min_seq_len || effective_kb <= 0.0 {
                (self.min_density, self.min_density)
            } else {
                let density = (filtered_counts as f64 / effective_kb).max(self.min_density);
                let max_fc = Zip::from(&raw)
                    .and(fold_changes)
                    .fold(None, |acc: Option<f64>, &count, &fc| {
                        if count >= 1 {
                            Some(acc.map_or(fc, |m| m.max(fc)))
                        } else {
                            acc
                        }
                    })
                    .unwrap_or(self.min_density);
                (density, max_fc)
            };

        Ok(DensityRecord {
            region: counts.region.clone(),
            seq_len: counts.seq_len,
            sum_counts: counts.sum_counts(),
            filtered_counts,
            obs_counts: counts.obs_counts.clone(),
            log2_weighted_density: weighted_density.log2(),
            max_kmer_fc,
        })
    }

    /// Scores every region against one enriched kmer set.
    ///
    /// Either every region is scored or an error is returned; a single misaligned
    /// count vector aborts the whole pass.
    pub fn weigh_regions(
        &self,
        enriched: &EnrichedSet,
        regions: &[RegionCounts],
    ) -> Result<Vec<DensityRecord>> {
        let fold_changes = Array1::from_vec(enriched.fold_changes());
        if !fold_changes.iter().any(|&fc| fc >= self.fc_filter) {
            warn!(
                "No enriched {}-mer meets the fold change filter {:.2}; all densities will be floored",
                enriched.kmer_len, self.fc_filter
            );
        }

        let records = regions
            .iter()
            .map(|counts| self.weigh(&fold_changes, enriched.kmer_len, counts))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "Weighted {} regions for {}-mers",
            records.len(),
            enriched.kmer_len
        );
        Ok(records)
    }
}

/// Writes density records as a tab separated table with 4 decimal floats.
///
/// The enriched kmers' fold changes and ordinal ranks are repeated on every row so
/// each observed count can be matched back to its kmer.
pub fn write_density_table<P: AsRef<Path>>(
    records: &[DensityRecord],
    enriched: &EnrichedSet,
    filename: P,
) -> Result<()> {
    let fc_rank = join_values(&enriched.fold_changes());
    let ordinal_rank = join_values(
        &enriched
            .kmers
            .iter()
            .map(|k| k.ordinal_rank())
            .collect::<Vec<_>>(),
    );
    let n = records.len();

    let mut df = DataFrame::new(vec![
        Column::new(
            "region".into(),
            records.iter().map(|r| r.region.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "seq_len".into(),
            records.iter().map(|r| r.seq_len as u64).collect::<Vec<_>>(),
        ),
        Column::new(
            "sum_counts".into(),
            records.iter().map(|r| r.sum_counts).collect::<Vec<_>>(),
        ),
        Column::new(
            "obs_counts".into(),
            records
                .iter()
                .map(|r| r.obs_counts_string())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "filtered_counts".into(),
            records.iter().map(|r| r.filtered_counts).collect::<Vec<_>>(),
        ),
        Column::new("fc_rank".into(), vec![fc_rank; n]),
        Column::new("ordinal_rank".into(), vec![ordinal_rank; n]),
        Column::new(
            "log2_weighted_density".into(),
            records
                .iter()
                .map(|r| r.log2_weighted_density)
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "max_kmer_fc".into(),
            records.iter().map(|r| r.max_kmer_fc).collect::<Vec<_>>(),
        ),
    ])?;

    write_tsv(&mut df, filename.as_ref())
}

fn write_tsv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b'\t')
        .with_float_precision(Some(4))
        .finish(df)?;
    Ok(())
}

/// Enriched kmer density pooled over all exons of a transcript
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptDensity {
    pub gene_id: String,
    pub transcript_id: String,
    pub sum_counts: u64,
    /// Possible kmer start positions summed over the transcript's exons
    pub num_starts_in_kb: f64,
    pub density: f64,
}

/// Pools per-exon density records by transcript.
///
/// Regions are grouped on the gene and transcript fields of their identifier;
/// identifiers without them are skipped with a warning. Rows are ordered by gene,
/// then transcript.
pub fn aggregate_by_transcript(
    records: &[DensityRecord],
    kmer_len: usize,
) -> Vec<TranscriptDensity> {
    let mut groups: BTreeMap<(String, String), (u64, f64)> = BTreeMap::new();
    for record in records {
        let ids = RegionId::parse(&record.region).ok().and_then(|id| {
            Some((id.gene_id()?.to_string(), id.transcript_id()?.to_string()))
        });
        let Some(key) = ids else {
            warn!(
                "Region {} has no gene/transcript fields; left out of per-gene output",
                record.region
            );
            continue;
        };
        let entry = groups.entry(key).or_insert((0, 0.0));
        entry.0 += record.sum_counts;
        entry.1 += start_positions_in_kb(record.seq_len, kmer_len).max(0.0);
    }

    groups
        .into_iter()
        .map(
            |((gene_id, transcript_id), (sum_counts, num_starts_in_kb))| TranscriptDensity {
                gene_id,
                transcript_id,
                sum_counts,
                num_starts_in_kb,
                density: if num_starts_in_kb > 0.0 {
                    sum_counts as f64 / num_starts_in_kb
                } else {
                    0.0
                },
            },
        )
        .collect()
}

/// Writes per-transcript densities as a tab separated table with 4 decimal floats.
pub fn write_transcript_table<P: AsRef<Path>>(
    rows: &[TranscriptDensity],
    filename: P,
) -> Result<()> {
    let mut df = DataFrame::new(vec![
        Column::new(
            "gene_id".into(),
            rows.iter().map(|r| r.gene_id.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "transcript_id".into(),
            rows.iter().map(|r| r.transcript_id.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "sum_counts_in_trans".into(),
            rows.iter().map(|r| r.sum_counts).collect::<Vec<_>>(),
        ),
        Column::new(
            "num_starts_in_trans_in_kb".into(),
            rows.iter().map(|r| r.num_starts_in_kb).collect::<Vec<_>>(),
        ),
        Column::new(
            "trans_density".into(),
            rows.iter().map(|r| r.density).collect::<Vec<_>>(),
        ),
    ])?;

    write_tsv(&mut df, filename.as_ref())
}
