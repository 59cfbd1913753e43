//! Rank Bind-n-Seq enriched kmers, score their density in genomic regions and place
//! their occurrences on the genome as BED-Detail tracks

pub mod artifact;
pub mod config;
pub mod density;
pub mod error;
pub mod fasta;
pub mod pipeline;
pub mod projection;
pub mod rank;
pub mod scanner;
pub mod seeds;
pub mod tables;
pub mod types;

pub use config::ScoringConfig;
pub use error::{BindnSeqError, Result};
pub use pipeline::{BindnSeq, RegionReport, RegionSource};
