use crate::error::{BindnSeqError, Result};
use crate::types::*;
use statrs::statistics::Statistics;
use std::cmp::Ordering;

/// Collapses the per-concentration odds ratios of a kmer into one enrichment value.
///
/// Missing (NaN) concentrations are ignored; a kmer with no usable value scores NaN
/// and sorts after every other kmer.
pub fn rank_score(scores: &[f64], method: RankMethod) -> f64 {
    let values: Vec<f64> = scores.iter().copied().filter(|v| !v.is_nan()).collect();
    if values.is_empty() {
        return f64::NAN;
    }
    match method {
        RankMethod::Max => Statistics::max(&values),
        RankMethod::Mean => Statistics::mean(&values),
    }
}

/// Descending by score, NaN last
fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a)
        .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

/// Ranks the kmers of a table by enrichment.
///
/// Every kmer receives a `rank_score` computed with `method`, the kmers are sorted by
/// descending `rank_score` and assigned an ordinal rank where tied kmers share the
/// lowest rank of their group (scores `[10, 10, 8]` rank as `[1, 1, 3]`). Kmers
/// without a usable score tie with each other at the bottom.
///
/// The sort is stable: kmers with equal scores keep the order in which they were
/// loaded.
///
/// # Arguments
/// * `table` - Odds ratios for one kmer length
/// * `method` - How concentrations are collapsed (maximum or mean)
///
/// # Returns
/// * `RankedTable` - The kmers in rank order
pub fn rank_enriched_kmers(table: &EnrichmentTable, method: RankMethod) -> RankedTable {
    let mut scored: Vec<(KmerRecord, f64)> = table
        .records
        .iter()
        .map(|record| (record.clone(), rank_score(&record.scores, method)))
        .collect();
    scored.sort_by(|(_, a), (_, b)| descending(*a, *b));

    let mut kmers: Vec<RankedKmer> = Vec::with_capacity(scored.len());
    let mut previous: Option<(f64, usize)> = None;
    for (idx, (record, score)) in scored.into_iter().enumerate() {
        let ordinal = match previous {
            Some((prev_score, prev_rank))
                if prev_score == score || (prev_score.is_nan() && score.is_nan()) =>
            {
                prev_rank
            }
            _ => idx + 1,
        };
        previous = Some((score, ordinal));
        kmers.push(RankedKmer::new(record, score, ordinal));
    }

    RankedTable {
        kmer_len: table.kmer_len,
        method,
        kmers,
    }
}

/// Value at `percentile` of `values`, interpolating linearly between the two
/// closest order statistics.
///
/// Returns `None` when there are no finite values.
///
/// # Errors
/// * `BindnSeqError::InvalidParameter` if `percentile` is outside [0, 100]
pub fn percentile_cutoff(values: &[f64], percentile: f64) -> Result<Option<f64>> {
    if !(0.0..=100.0).contains(&percentile) {
        return Err(BindnSeqError::invalid_parameter(
            "percentile",
            percentile,
            "must be within [0, 100]",
        ));
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return Ok(None);
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let position = percentile / 100.0 * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Ok(Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction))
}

/// Selects the kmers whose `rank_score` reaches the given percentile of the table's
/// score distribution. Rank order is preserved.
///
/// # Errors
/// * `BindnSeqError::InvalidParameter` if `percentile` is outside [0, 100]
/// * `BindnSeqError::MissingData` if the table holds no scored kmers
pub fn select_enriched(ranked: &RankedTable, percentile: f64) -> Result<EnrichedSet> {
    let scores: Vec<f64> = ranked.kmers.iter().map(|k| k.rank_score()).collect();
    let cutoff = percentile_cutoff(&scores, percentile)?.ok_or_else(|| {
        BindnSeqError::missing_data(format!(
            "no scored kmers of length {} to select from",
            ranked.kmer_len
        ))
    })?;

    Ok(EnrichedSet {
        kmer_len: ranked.kmer_len,
        cutoff,
        kmers: kmers_at_or_above(ranked, cutoff),
    })
}

/// Selects the kmers whose `rank_score` is at least an absolute fold change.
pub fn select_by_fold_change(ranked: &RankedTable, fold_cutoff: f64) -> EnrichedSet {
    EnrichedSet {
        kmer_len: ranked.kmer_len,
        cutoff: fold_cutoff,
        kmers: kmers_at_or_above(ranked, fold_cutoff),
    }
}

fn kmers_at_or_above(ranked: &RankedTable, cutoff: f64) -> Vec<RankedKmer> {
    ranked
        .kmers
        .iter()
        .filter(|k| k.rank_score() >= cutoff)
        .cloned()
        .collect()
}
