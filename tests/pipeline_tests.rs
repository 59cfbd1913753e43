use bindnseq_rs::artifact::WriteOutcome;
use bindnseq_rs::error::BindnSeqError;
use bindnseq_rs::scanner::{KmerScanner, SequenceScanner};
use bindnseq_rs::seeds::MotifDiscovery;
use bindnseq_rs::types::{KmerStarts, RegionCounts};
use bindnseq_rs::{BindnSeq, RegionSource, Result, ScoringConfig};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

fn config() -> ScoringConfig {
    ScoringConfig {
        kmer_lens: vec![4],
        seed_kmer_lens: vec![4, 5],
        percentile: 50.0,
        ..Default::default()
    }
}

fn loaded(output_dir: &Path) -> BindnSeq {
    let mut bns = BindnSeq::new("tests/data", output_dir, config()).unwrap();
    bns.load_odds_ratios().unwrap();
    bns
}

fn regions() -> Vec<RegionSource> {
    vec![RegionSource::new(
        "3p_utr",
        Some(PathBuf::from("tests/data/regions.fa")),
    )]
}

#[test]
fn test_enriched_kmers_follow_percentile() {
    let tempdir = tempfile::tempdir().unwrap();
    let bns = loaded(tempdir.path());
    let enriched = bns.enriched_kmers(4).unwrap();
    assert_eq!(enriched.cutoff, 2.5);
    assert_eq!(enriched.kmer_strings(), vec!["AAAA", "CCCC", "TTTT"]);

    let err = bns.enriched_kmers(7).unwrap_err();
    assert!(matches!(err, BindnSeqError::MissingData(_)));
}

#[test]
fn test_score_regions_writes_density_and_bed() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut bns = loaded(tempdir.path());
    let reports = bns.score_regions(&KmerScanner, &regions()).unwrap();

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.num_sequences, 3);
    assert_eq!(report.bed_outcome, WriteOutcome::Written);
    // only the minus strand region is placed on the genome
    assert_eq!(report.num_intervals, 4);

    let density = fs::read_to_string(&report.density_file).unwrap();
    let rows: Vec<Vec<&str>> = density
        .lines()
        .skip(1)
        .map(|line| line.split('\t').collect())
        .collect();
    assert_eq!(rows.len(), 3);
    // region, seq_len, sum_counts, obs_counts, filtered_counts, ..., log2 density, max fc
    assert_eq!(rows[0][1], "30");
    assert_eq!(rows[0][3], "2,1,1");
    assert_eq!(rows[0][8], "10.0000");
    assert_eq!(rows[1][1], "10");
    assert_eq!(rows[1][7], "-8.0000");
    assert_eq!(rows[1][8], "0.0039");
    assert_eq!(rows[2][3], "1,0,0");
    assert_eq!(rows[2][7], "5.6439");

    let bed = fs::read_to_string(&report.bed_file).unwrap();
    let lines: Vec<&str> = bed.lines().collect();
    assert_eq!(
        lines[0],
        "track name=\"BNS enriched kmers (3p_utr, 4-mer)\" description=\"BNS enriched kmers (3p_utr, 4-mer)\" useScore=1 db=mm9 visibility=3"
    );
    assert_eq!(
        &lines[1..],
        &[
            "chr1\t194\t198\tAAAA\t1000\t-\t194\t198",
            "chr1\t193\t197\tAAAA\t1000\t-\t193\t197",
            "chr1\t189\t193\tCCCC\t1000\t-\t189\t193",
            "chr1\t180\t184\tTTTT\t500\t-\t180\t184",
        ]
    );
}

#[test]
fn test_rerun_skips_existing_bed() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut bns = loaded(tempdir.path());
    let first = bns.score_regions(&KmerScanner, &regions()).unwrap();
    let bed = fs::read_to_string(&first[0].bed_file).unwrap();

    // a new run over the same output directory leaves the BED file alone
    let mut bns = BindnSeq::new(
        "tests/data",
        tempdir.path(),
        ScoringConfig {
            genome: "hg19".to_string(),
            ..config()
        },
    )
    .unwrap();
    bns.load_odds_ratios().unwrap();
    let second = bns.score_regions(&KmerScanner, &regions()).unwrap();
    assert_eq!(second[0].bed_outcome, WriteOutcome::Skipped);
    assert_eq!(fs::read_to_string(&second[0].bed_file).unwrap(), bed);
}

#[test]
fn test_missing_region_sequences_are_skipped() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut bns = loaded(tempdir.path());
    let sources = vec![
        RegionSource::new("5p_utr", None),
        RegionSource::new("intron", Some(PathBuf::from("tests/data/no_such.fa"))),
        RegionSource::new("3p_utr", Some(PathBuf::from("tests/data/regions.fa"))),
    ];
    let reports = bns.score_regions(&KmerScanner, &sources).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].region, "3p_utr");
    assert!(!tempdir.path().join("enriched_kmers.5p_utr.4_kmer.txt").exists());
}

#[test]
fn test_unreadable_region_sequences_are_skipped() {
    let tempdir = tempfile::tempdir().unwrap();
    let empty = tempdir.path().join("empty.fa");
    fs::write(&empty, "").unwrap();
    let output_dir = tempdir.path().join("out");

    let mut bns = loaded(&output_dir);
    let sources = vec![
        RegionSource::new("intron", Some(empty)),
        RegionSource::new("3p_utr", Some(PathBuf::from("tests/data/regions.fa"))),
    ];
    let reports = bns.score_regions(&KmerScanner, &sources).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].region, "3p_utr");
    assert!(reports[0].density_file.is_file());
    assert!(!output_dir.join("enriched_kmers.intron.4_kmer.txt").exists());
}

/// Reports one count too many for sequences of the `intron` set
struct MisalignedScanner;

impl SequenceScanner for MisalignedScanner {
    fn kmer_starts(&self, sequence: &str, kmers: &[&str]) -> Vec<KmerStarts> {
        KmerScanner.kmer_starts(sequence, kmers)
    }

    fn count_kmers(&self, region: &str, sequence: &str, kmers: &[&str]) -> RegionCounts {
        let mut counts = KmerScanner.count_kmers(region, sequence, kmers);
        if region.contains(";intron;") {
            counts.obs_counts.push(0);
        }
        counts
    }
}

#[test]
fn test_count_mismatch_writes_nothing() {
    let tempdir = tempfile::tempdir().unwrap();
    let introns = tempdir.path().join("introns.fa");
    fs::write(&introns, ">chr9:10-50:-;intron;ENSMUST09;ENSMUSG09\nAAAACCCCTTTTGGGGAAAA\n").unwrap();
    let output_dir = tempdir.path().join("out");

    let mut bns = loaded(&output_dir);
    let sources = vec![
        RegionSource::new("3p_utr", Some(PathBuf::from("tests/data/regions.fa"))),
        RegionSource::new("intron", Some(introns)),
    ];
    let err = bns.score_regions(&MisalignedScanner, &sources).unwrap_err();
    assert!(matches!(err, BindnSeqError::CountVectorMismatch { .. }));
    // the 3p_utr set weighed fine but none of its outputs were written
    assert!(!output_dir.exists());
}

#[test]
fn test_cds_region_gets_per_gene_summary() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut bns = loaded(tempdir.path());
    let sources = vec![RegionSource::new(
        "cds",
        Some(PathBuf::from("tests/data/regions.fa")),
    )];
    bns.score_regions(&KmerScanner, &sources).unwrap();

    let per_gene =
        fs::read_to_string(tempdir.path().join("enriched_kmers.cds.4_kmer.per_gene.txt")).unwrap();
    // three exons in three transcripts of two genes
    assert_eq!(per_gene.lines().count(), 4);
}

#[test]
fn test_unloaded_kmer_length_is_fatal() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut bns = BindnSeq::new(
        "tests/data",
        tempdir.path(),
        ScoringConfig {
            kmer_lens: vec![4, 8],
            ..config()
        },
    )
    .unwrap();
    bns.load_odds_ratios().unwrap();
    let err = bns.score_regions(&KmerScanner, &regions()).unwrap_err();
    assert!(matches!(err, BindnSeqError::MissingData(_)));
    // nothing is scored before the check
    assert!(!tempdir.path().join("enriched_kmers.3p_utr.4_kmer.txt").exists());
}

#[test]
fn test_invalid_method_is_rejected_up_front() {
    let result = BindnSeq::new(
        "tests/data",
        "unused",
        ScoringConfig {
            method: "median".to_string(),
            ..config()
        },
    );
    assert!(matches!(result, Err(BindnSeqError::InvalidMethod(_))));
}

#[test]
fn test_motif_seed_fasta() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut bns = loaded(tempdir.path());
    let fasta = bns.write_motif_seeds(None).unwrap();
    assert_eq!(
        fasta,
        tempdir
            .path()
            .join("seqs")
            .join("enriched_kmers.cutoff_2.0.method_max.all_kmers.fasta")
    );
    // 4-mers then 5-mers, each in rank order
    assert_eq!(
        fs::read_to_string(&fasta).unwrap(),
        ">AAAA\nAAAA\n>CCCC\nCCCC\n>TTTT\nTTTT\n>AAAAA\nAAAAA\n>CCCCC\nCCCCC\n>TTTTT\nTTTTT\n"
    );

    let fasta = bns.write_motif_seeds(Some(5)).unwrap();
    assert!(fasta.ends_with("enriched_kmers.cutoff_2.0.method_max.5_kmers.fasta"));
    assert_eq!(
        fs::read_to_string(&fasta).unwrap(),
        ">AAAAA\nAAAAA\n>CCCCC\nCCCCC\n>TTTTT\nTTTTT\n"
    );
}

#[test]
fn test_seed_length_must_be_loaded() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut bns = BindnSeq::new(
        "tests/data",
        tempdir.path(),
        ScoringConfig {
            seed_kmer_lens: vec![4, 6],
            ..config()
        },
    )
    .unwrap();
    bns.load_odds_ratios().unwrap();
    let err = bns.write_motif_seeds(None).unwrap_err();
    assert!(matches!(err, BindnSeqError::MissingData(_)));
}

struct RecordingTool {
    calls: Cell<usize>,
}

impl MotifDiscovery for RecordingTool {
    fn discover(&self, fasta: &Path, output_dir: &Path) -> Result<()> {
        self.calls.set(self.calls.get() + 1);
        assert!(fasta.is_file());
        fs::write(output_dir.join("meme.txt"), "MEME version 5")?;
        Ok(())
    }
}

#[test]
fn test_motif_discovery_runs_once_per_output_dir() {
    let tempdir = tempfile::tempdir().unwrap();
    let tool = RecordingTool {
        calls: Cell::new(0),
    };

    let mut bns = loaded(tempdir.path());
    let outcome = bns.run_meme_on_enriched_kmers(&tool, Some(4)).unwrap();
    assert_eq!(outcome, WriteOutcome::Written);
    assert!(tempdir.path().join("meme_output").join("meme.txt").is_file());

    let mut bns = loaded(tempdir.path());
    let outcome = bns.run_meme_on_enriched_kmers(&tool, Some(4)).unwrap();
    assert_eq!(outcome, WriteOutcome::Skipped);
    assert_eq!(tool.calls.get(), 1);
}
