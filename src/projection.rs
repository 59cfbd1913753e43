use crate::artifact::{ArtifactCache, WriteOutcome};
use crate::config::ScoringConfig;
use crate::error::Result;
use crate::types::*;
use log::{info, warn};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

const MAX_SCORE: f64 = 1000.0;
const MAX_COLOR: f64 = 255.0;

/// Linearly maps `value` from the scale [old_min, old_max] onto [new_min, new_max],
/// e.g. 3 on [1, 5] becomes 500.5 on [1, 1000].
pub fn rescale_score(value: f64, old_min: f64, old_max: f64, new_min: f64, new_max: f64) -> f64 {
    ((value - old_min) * (new_max - new_min)) / (old_max - old_min) + new_min
}

/// Places kmer occurrences found inside a region's sequence onto the genome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateProjector {
    pub kmer_len: usize,
    /// Fold change mapped to the maximum score and color
    pub fc_ceiling: f64,
    /// Plus strand regions are only projected when this is set
    pub project_plus_strand: bool,
}

impl CoordinateProjector {
    pub fn new(kmer_len: usize, fc_ceiling: f64, project_plus_strand: bool) -> Self {
        CoordinateProjector {
            kmer_len,
            fc_ceiling,
            project_plus_strand,
        }
    }

    pub fn from_config(kmer_len: usize, config: &ScoringConfig) -> Self {
        Self::new(kmer_len, config.fc_ceiling, config.project_plus_strand)
    }

    /// BED score in [0, 1000]
    pub fn score(&self, fold_change: f64) -> u32 {
        rescale_score(fold_change, 1.0, self.fc_ceiling, 1.0, MAX_SCORE).clamp(0.0, MAX_SCORE)
            as u32
    }

    /// Display intensity in [0, 255]
    pub fn color(&self, fold_change: f64) -> u8 {
        rescale_score(fold_change, 1.0, self.fc_ceiling, 1.0, MAX_COLOR).clamp(0.0, MAX_COLOR)
            as u8
    }

    /// Genomic `[start, end)` of an occurrence starting `offset` bases into the region.
    ///
    /// Minus strand sequences read from the region end, so offset 0 ends at
    /// `region.end`. Returns `None` for plus strand regions unless plus strand
    /// projection is enabled, and for occurrences that would fall before position 0.
    pub fn locate(&self, region: &RegionId, offset: usize) -> Option<(u64, u64)> {
        let k = self.kmer_len as i64;
        let (start, end) = match region.strand {
            Strand::Minus => {
                let start_1based = offset as i64 + 1;
                let end = region.end as i64 - start_1based + 1;
                (end - k, end)
            }
            Strand::Plus if self.project_plus_strand => {
                let start = region.start as i64 + offset as i64;
                (start, start + k)
            }
            Strand::Plus => return None,
        };
        if start < 0 || start > end {
            return None;
        }
        Some((start as u64, end as u64))
    }

    /// One interval per occurrence of each kmer in `hits`, in the order given.
    ///
    /// Kmers without occurrences, or missing from `fold_changes`, produce nothing.
    pub fn project(
        &self,
        region: &RegionId,
        hits: &[KmerStarts],
        fold_changes: &HashMap<String, f64>,
    ) -> Vec<GenomicInterval> {
        if region.strand == Strand::Plus && !self.project_plus_strand {
            return Vec::new();
        }

        let mut intervals = Vec::new();
        for hit in hits.iter().filter(|hit| !hit.starts.is_empty()) {
            let Some(&fold_change) = fold_changes.get(&hit.kmer) else {
                warn!("No fold change for kmer {}; not projected", hit.kmer);
                continue;
            };
            let score = self.score(fold_change);
            let color = self.color(fold_change);
            for &offset in &hit.starts {
                let Some((start, end)) = self.locate(region, offset) else {
                    warn!(
                        "Occurrence of {} at offset {} falls outside {}:{}-{}; dropped",
                        hit.kmer, offset, region.chrom, region.start, region.end
                    );
                    continue;
                };
                intervals.push(GenomicInterval {
                    chrom: region.chrom.clone(),
                    start,
                    end,
                    name: hit.kmer.clone(),
                    score,
                    strand: region.strand,
                    thick_start: start,
                    thick_end: end,
                    color,
                });
            }
        }
        intervals
    }
}

/// BED-Detail track header line
pub fn track_header(track_desc: &str, genome: &str) -> String {
    format!(
        "track name=\"{desc}\" description=\"{desc}\" useScore=1 db={genome} visibility=3",
        desc = track_desc,
        genome = genome
    )
}

/// Writes intervals as a BED-Detail file unless `filename` already exists.
///
/// # Returns
/// * `WriteOutcome::Skipped` if the file was already present; nothing is written
pub fn write_bed_detail<P: AsRef<Path>>(
    cache: &mut ArtifactCache,
    filename: P,
    track_desc: &str,
    genome: &str,
    intervals: &[GenomicInterval],
) -> Result<WriteOutcome> {
    let filename = filename.as_ref();
    info!("Outputting BED file: {}", filename.display());
    cache.write_once(filename, |out| {
        writeln!(out, "{}", track_header(track_desc, genome))?;
        for interval in intervals {
            writeln!(out, "{}", interval.to_bed_line())?;
        }
        Ok(())
    })
}
