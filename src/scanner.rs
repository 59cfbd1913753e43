use crate::types::{KmerStarts, RegionCounts};
use std::collections::HashMap;

/// Locates query kmers within a sequence.
///
/// Results are index aligned with `kmers`: entry `i` of the counts vector and of the
/// start lists belongs to `kmers[i]`.
pub trait SequenceScanner {
    /// Every 0-based start offset of each query kmer in `sequence`
    fn kmer_starts(&self, sequence: &str, kmers: &[&str]) -> Vec<KmerStarts>;

    /// Number of occurrences of each query kmer in `sequence`
    fn count_kmers(&self, region: &str, sequence: &str, kmers: &[&str]) -> RegionCounts {
        let obs_counts = self
            .kmer_starts(sequence, kmers)
            .iter()
            .map(|hit| hit.starts.len() as u32)
            .collect();
        RegionCounts {
            region: region.to_string(),
            seq_len: sequence.len(),
            obs_counts,
        }
    }
}

/// Exact, case-insensitive matching that counts overlapping occurrences
#[derive(Debug, Default, Clone, Copy)]
pub struct KmerScanner;

impl SequenceScanner for KmerScanner {
    fn kmer_starts(&self, sequence: &str, kmers: &[&str]) -> Vec<KmerStarts> {
        let sequence = sequence.to_ascii_uppercase();
        let queries: Vec<String> = kmers.iter().map(|k| k.to_ascii_uppercase()).collect();

        let mut by_len: HashMap<usize, HashMap<&[u8], Vec<usize>>> = HashMap::new();
        for (idx, query) in queries.iter().enumerate() {
            by_len
                .entry(query.len())
                .or_default()
                .entry(query.as_bytes())
                .or_default()
                .push(idx);
        }

        let mut starts: Vec<Vec<usize>> = vec![Vec::new(); kmers.len()];
        for (&len, lookup) in &by_len {
            if len == 0 {
                continue;
            }
            for (offset, window) in sequence.as_bytes().windows(len).enumerate() {
                if let Some(indices) = lookup.get(window) {
                    for &idx in indices {
                        starts[idx].push(offset);
                    }
                }
            }
        }

        kmers
            .iter()
            .zip(starts)
            .map(|(kmer, starts)| KmerStarts {
                kmer: kmer.to_string(),
                starts,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlapping_occurrences() {
        let hits = KmerScanner.kmer_starts("AAAAAC", &["AAAA", "AAAC", "GGGG"]);
        assert_eq!(hits[0].starts, vec![0, 1]);
        assert_eq!(hits[1].starts, vec![2]);
        assert!(hits[2].starts.is_empty());
    }

    #[test]
    fn test_counts_are_aligned_with_queries() {
        let counts = KmerScanner.count_kmers("r1", "acgtACGT", &["CGTA", "ACGT", "TTTT"]);
        assert_eq!(counts.seq_len, 8);
        assert_eq!(counts.obs_counts, vec![1, 2, 0]);
        assert_eq!(counts.sum_counts(), 3);
    }
}
