use crate::error::{BindnSeqError, Result};
use crate::types::RankMethod;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Fold change below which a kmer's occurrences are zeroed before density is computed
pub const FC_FILTER: f64 = 2.0;

/// Floor for weighted densities and maximum fold changes (2^-8)
pub const MIN_DENSITY: f64 = 0.00390625;

/// Regions shorter than this are considered uninformative
pub const MIN_SEQ_LEN: usize = 15;

/// Fold change that maps to the top of the BED score and color ranges
pub const FC_CEILING: f64 = 4.0;

/// Tunables for one scoring run.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// kmer_lens = [6, 7]
/// percentile = 95.0
/// genome = "hg19"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Kmer lengths scored against regions
    pub kmer_lens: Vec<usize>,
    /// Kmer lengths written to the motif seed FASTA
    pub seed_kmer_lens: Vec<usize>,
    /// "max" or "mean"
    pub method: String,
    /// Percentile of the rank score distribution used as the enrichment cutoff
    pub percentile: f64,
    pub fc_filter: f64,
    pub min_density: f64,
    pub min_seq_len: usize,
    pub fc_ceiling: f64,
    /// Absolute fold change cutoff for motif seeds
    pub seed_fc_cutoff: f64,
    /// Genome assembly written into the BED track header
    pub genome: String,
    /// Suffix identifying concentration columns in odds ratio tables
    pub conc_suffix: String,
    /// Emit BED intervals for plus strand regions too
    pub project_plus_strand: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig {
            kmer_lens: vec![4, 5, 6, 7, 8, 9],
            seed_kmer_lens: vec![4, 5, 6],
            method: "max".to_string(),
            percentile: 98.0,
            fc_filter: FC_FILTER,
            min_density: MIN_DENSITY,
            min_seq_len: MIN_SEQ_LEN,
            fc_ceiling: FC_CEILING,
            seed_fc_cutoff: 2.0,
            genome: "mm9".to_string(),
            conc_suffix: "nM".to_string(),
            project_plus_strand: false,
        }
    }
}

impl ScoringConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| BindnSeqError::Config(e.to_string()))
    }

    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn rank_method(&self) -> Result<RankMethod> {
        self.method.parse()
    }

    /// Checks value ranges and the ranking method
    pub fn validate(&self) -> Result<()> {
        self.rank_method()?;
        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(BindnSeqError::invalid_parameter(
                "percentile",
                self.percentile,
                "must be within [0, 100]",
            ));
        }
        for (name, value) in [
            ("fc_filter", self.fc_filter),
            ("seed_fc_cutoff", self.seed_fc_cutoff),
        ] {
            if !value.is_finite() {
                return Err(BindnSeqError::invalid_parameter(name, value, "must be finite"));
            }
        }
        if !self.min_density.is_finite() || self.min_density <= 0.0 {
            return Err(BindnSeqError::invalid_parameter(
                "min_density",
                self.min_density,
                "must be positive and finite",
            ));
        }
        if !self.fc_ceiling.is_finite() || self.fc_ceiling <= 1.0 {
            return Err(BindnSeqError::invalid_parameter(
                "fc_ceiling",
                self.fc_ceiling,
                "must be finite and greater than 1",
            ));
        }
        if let Some(k) = self
            .kmer_lens
            .iter()
            .chain(self.seed_kmer_lens.iter())
            .find(|&&k| k == 0)
        {
            return Err(BindnSeqError::invalid_parameter(
                "kmer_lens",
                k,
                "kmer lengths must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ScoringConfig::from_toml_str("percentile = 95.0\ngenome = \"hg19\"").unwrap();
        assert_eq!(config.percentile, 95.0);
        assert_eq!(config.genome, "hg19");
        assert_eq!(config.fc_filter, FC_FILTER);
        assert_eq!(config.kmer_lens, vec![4, 5, 6, 7, 8, 9]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ScoringConfig {
            method: "median".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BindnSeqError::InvalidMethod(_))
        ));

        let config = ScoringConfig {
            percentile: 101.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BindnSeqError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_non_finite_thresholds() {
        let configs = [
            ScoringConfig {
                min_density: f64::NAN,
                ..Default::default()
            },
            ScoringConfig {
                fc_filter: f64::NAN,
                ..Default::default()
            },
            ScoringConfig {
                fc_ceiling: f64::NAN,
                ..Default::default()
            },
            ScoringConfig {
                fc_ceiling: f64::INFINITY,
                ..Default::default()
            },
            ScoringConfig {
                seed_fc_cutoff: f64::NAN,
                ..Default::default()
            },
        ];
        for config in configs {
            assert!(matches!(
                config.validate(),
                Err(BindnSeqError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn test_min_density_is_two_to_minus_eight() {
        assert_eq!(MIN_DENSITY, 2f64.powi(-8));
    }
}
