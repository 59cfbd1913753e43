use crate::error::{BindnSeqError, Result};
use phf::phf_map;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A single kmer as loaded from an odds ratio table, one score per concentration
#[derive(Debug, Clone, PartialEq)]
pub struct KmerRecord {
    pub kmer: String,
    pub scores: Vec<f64>,
}

impl KmerRecord {
    pub fn new(kmer: impl Into<String>, scores: Vec<f64>) -> Self {
        KmerRecord {
            kmer: kmer.into(),
            scores,
        }
    }

    pub fn len(&self) -> usize {
        self.kmer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kmer.is_empty()
    }
}

/// Odds ratios for every kmer of one length, in the order they were loaded
#[derive(Debug, Clone)]
pub struct EnrichmentTable {
    pub kmer_len: usize,
    /// Concentration column names, aligned with `KmerRecord::scores`
    pub conditions: Vec<String>,
    pub records: Vec<KmerRecord>,
}

impl EnrichmentTable {
    pub fn new(kmer_len: usize, conditions: Vec<String>, records: Vec<KmerRecord>) -> Self {
        EnrichmentTable {
            kmer_len,
            conditions,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// How the per-concentration odds ratios collapse into one enrichment value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMethod {
    Max,
    Mean,
}

static RANK_METHODS: phf::Map<&'static str, RankMethod> = phf_map! {
    "max" => RankMethod::Max,
    "mean" => RankMethod::Mean,
};

impl FromStr for RankMethod {
    type Err = BindnSeqError;

    fn from_str(s: &str) -> Result<Self> {
        RANK_METHODS
            .get(s)
            .copied()
            .ok_or_else(|| BindnSeqError::InvalidMethod(s.to_string()))
    }
}

impl fmt::Display for RankMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankMethod::Max => write!(f, "max"),
            RankMethod::Mean => write!(f, "mean"),
        }
    }
}

/// A kmer annotated with its enrichment value and ordinal rank.
///
/// Fields are only reachable through getters, so a ranked kmer cannot be
/// altered after ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedKmer {
    kmer: String,
    scores: Vec<f64>,
    rank_score: f64,
    ordinal_rank: usize,
}

impl RankedKmer {
    pub(crate) fn new(record: KmerRecord, rank_score: f64, ordinal_rank: usize) -> Self {
        RankedKmer {
            kmer: record.kmer,
            scores: record.scores,
            rank_score,
            ordinal_rank,
        }
    }

    pub fn kmer(&self) -> &str {
        &self.kmer
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn rank_score(&self) -> f64 {
        self.rank_score
    }

    pub fn ordinal_rank(&self) -> usize {
        self.ordinal_rank
    }
}

/// Kmers of one length sorted by descending `rank_score`
#[derive(Debug, Clone)]
pub struct RankedTable {
    pub kmer_len: usize,
    pub method: RankMethod,
    pub kmers: Vec<RankedKmer>,
}

/// The enriched subset of a ranked table, still in rank order.
///
/// Observed count vectors handed to the density weighter are index aligned
/// with `kmers`.
#[derive(Debug, Clone)]
pub struct EnrichedSet {
    pub kmer_len: usize,
    pub cutoff: f64,
    pub kmers: Vec<RankedKmer>,
}

impl EnrichedSet {
    pub fn len(&self) -> usize {
        self.kmers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kmers.is_empty()
    }

    pub fn kmer_strings(&self) -> Vec<&str> {
        self.kmers.iter().map(|k| k.kmer()).collect()
    }

    pub fn fold_changes(&self) -> Vec<f64> {
        self.kmers.iter().map(|k| k.rank_score()).collect()
    }

    /// Mapping from kmer to its fold change (`rank_score`)
    pub fn fold_change_map(&self) -> HashMap<String, f64> {
        self.kmers
            .iter()
            .map(|k| (k.kmer().to_string(), k.rank_score()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Plus,
    Minus,
}

impl FromStr for Strand {
    type Err = BindnSeqError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "+" => Ok(Strand::Plus),
            "-" => Ok(Strand::Minus),
            other => Err(BindnSeqError::InvalidRegion(format!(
                "unknown strand '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Plus => write!(f, "+"),
            Strand::Minus => write!(f, "-"),
        }
    }
}

/// Parsed sequence identifier of the form
/// `chrom:start-end:strand;feature;transcript_id;gene_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionId {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    /// `;` separated fields following the coordinates
    pub metadata: Vec<String>,
}

impl RegionId {
    pub fn parse(name: &str) -> Result<Self> {
        let mut fields = name.split(';');
        let location = fields.next().unwrap_or_default();
        let parts: Vec<&str> = location.split(':').collect();
        let [chrom, coords, strand] = parts.as_slice() else {
            return Err(BindnSeqError::InvalidRegion(name.to_string()));
        };
        let (start, end) = coords
            .split_once('-')
            .ok_or_else(|| BindnSeqError::InvalidRegion(name.to_string()))?;
        let start: u64 = start
            .parse()
            .map_err(|_| BindnSeqError::InvalidRegion(name.to_string()))?;
        let end: u64 = end
            .parse()
            .map_err(|_| BindnSeqError::InvalidRegion(name.to_string()))?;
        if start > end || chrom.is_empty() {
            return Err(BindnSeqError::InvalidRegion(name.to_string()));
        }

        Ok(RegionId {
            chrom: chrom.to_string(),
            start,
            end,
            strand: strand.parse()?,
            metadata: fields.map(|f| f.to_string()).collect(),
        })
    }

    pub fn transcript_id(&self) -> Option<&str> {
        self.metadata.get(1).map(|s| s.as_str())
    }

    pub fn gene_id(&self) -> Option<&str> {
        self.metadata.get(2).map(|s| s.as_str())
    }
}

/// Scanner output for one sequence: totals plus counts aligned to the query kmers
#[derive(Debug, Clone, PartialEq)]
pub struct RegionCounts {
    pub region: String,
    pub seq_len: usize,
    pub obs_counts: Vec<u32>,
}

impl RegionCounts {
    pub fn sum_counts(&self) -> u64 {
        self.obs_counts.iter().map(|&c| c as u64).sum()
    }
}

/// All 0-based start offsets of one kmer within one sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmerStarts {
    pub kmer: String,
    pub starts: Vec<usize>,
}

/// Length normalized, fold change filtered kmer density of one region
#[derive(Debug, Clone, PartialEq)]
pub struct DensityRecord {
    pub region: String,
    pub seq_len: usize,
    pub sum_counts: u64,
    pub filtered_counts: u64,
    pub obs_counts: Vec<u32>,
    pub log2_weighted_density: f64,
    pub max_kmer_fc: f64,
}

impl DensityRecord {
    pub fn weighted_density(&self) -> f64 {
        self.log2_weighted_density.exp2()
    }

    /// Counts serialized the way they appear in the density table
    pub fn obs_counts_string(&self) -> String {
        join_values(&self.obs_counts)
    }
}

/// One kmer occurrence placed on the genome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomicInterval {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub name: String,
    pub score: u32,
    pub strand: Strand,
    pub thick_start: u64,
    pub thick_end: u64,
    /// Display intensity in [0, 255]
    pub color: u8,
}

impl GenomicInterval {
    /// The 8 BED-Detail fields, tab separated
    pub fn to_bed_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.chrom,
            self.start,
            self.end,
            self.name,
            self.score,
            self.strand,
            self.thick_start,
            self.thick_end
        )
    }
}

pub(crate) fn join_values<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
