use bindnseq_rs::config::{FC_FILTER, MIN_DENSITY, MIN_SEQ_LEN};
use bindnseq_rs::density::*;
use bindnseq_rs::error::BindnSeqError;
use bindnseq_rs::rank::{rank_enriched_kmers, select_enriched};
use bindnseq_rs::types::*;
use ndarray::array;

fn weighter() -> DensityWeighter {
    DensityWeighter::new(FC_FILTER, MIN_DENSITY, MIN_SEQ_LEN)
}

fn counts(region: &str, seq_len: usize, obs_counts: &[u32]) -> RegionCounts {
    RegionCounts {
        region: region.to_string(),
        seq_len,
        obs_counts: obs_counts.to_vec(),
    }
}

fn enriched_set(rows: &[(&str, f64)]) -> EnrichedSet {
    let records = rows
        .iter()
        .map(|(kmer, fc)| KmerRecord::new(*kmer, vec![*fc]))
        .collect();
    let table = EnrichmentTable::new(rows[0].0.len(), vec!["5nM".to_string()], records);
    select_enriched(&rank_enriched_kmers(&table, RankMethod::Max), 0.0).unwrap()
}

#[test]
fn test_density_is_per_kilobase_of_start_positions() {
    let fcs = array![10.0, 4.0, 2.5];
    let record = weighter()
        .weigh(&fcs, 4, &counts("r1", 1003, &[2, 1, 1]))
        .unwrap();
    // 1003 - 4 + 1 = 1000 start positions = 1 kb
    assert_eq!(record.log2_weighted_density, 2.0);
    assert_eq!(record.weighted_density(), 4.0);
    assert_eq!(record.sum_counts, 4);
    assert_eq!(record.filtered_counts, 4);
    assert_eq!(record.max_kmer_fc, 10.0);
}

#[test]
fn test_weakly_enriched_kmers_are_suppressed() {
    let fcs = array![3.0, 1.5];
    let record = weighter()
        .weigh(&fcs, 4, &counts("r1", 503, &[1, 7]))
        .unwrap();
    // only the first kmer counts: 1 occurrence in 0.5 kb
    assert_eq!(record.filtered_counts, 1);
    assert_eq!(record.sum_counts, 8);
    assert_eq!(record.weighted_density(), 2.0);
}

#[test]
fn test_max_fold_change_uses_raw_occurrences() {
    let fcs = array![3.0, 1.5];
    let record = weighter()
        .weigh(&fcs, 4, &counts("r1", 503, &[0, 2]))
        .unwrap();
    // suppressed from the density, but still observed
    assert_eq!(record.filtered_counts, 0);
    assert_eq!(record.log2_weighted_density, -8.0);
    assert_eq!(record.max_kmer_fc, 1.5);
}

#[test]
fn test_no_occurrences_floor_everything() {
    let fcs = array![3.0, 2.0];
    let record = weighter()
        .weigh(&fcs, 4, &counts("r1", 200, &[0, 0]))
        .unwrap();
    assert_eq!(record.log2_weighted_density, -8.0);
    assert_eq!(record.max_kmer_fc, MIN_DENSITY);
}

#[test]
fn test_short_regions_are_uninformative() {
    let fcs = array![10.0, 4.0];
    for seq_len in [4, 10, 14] {
        let record = weighter()
            .weigh(&fcs, 4, &counts("short", seq_len, &[5, 5]))
            .unwrap();
        assert_eq!(record.log2_weighted_density, MIN_DENSITY.log2());
        assert_eq!(record.max_kmer_fc, MIN_DENSITY);
    }
    let record = weighter()
        .weigh(&fcs, 4, &counts("long enough", 15, &[1, 0]))
        .unwrap();
    assert_eq!(record.max_kmer_fc, 10.0);
}

#[test]
fn test_log2_density_never_below_floor() {
    let fcs = array![5.0, 2.0, 1.0];
    let floor = MIN_DENSITY.log2();
    for seq_len in [0, 3, 15, 16, 100, 100_000, 10_000_000] {
        for obs in [[0, 0, 0], [0, 0, 9], [1, 0, 0], [3, 2, 1]] {
            let record = weighter()
                .weigh(&fcs, 4, &counts("r", seq_len, &obs))
                .unwrap();
            assert!(record.log2_weighted_density >= floor);
        }
    }
}

#[test]
fn test_fold_change_filter_is_configurable() {
    let fcs = array![3.0, 1.5];
    let strict = DensityWeighter::new(5.0, MIN_DENSITY, MIN_SEQ_LEN);
    let record = strict.weigh(&fcs, 4, &counts("r1", 503, &[4, 4])).unwrap();
    assert_eq!(record.filtered_counts, 0);

    let lenient = DensityWeighter::new(1.0, MIN_DENSITY, MIN_SEQ_LEN);
    let record = lenient.weigh(&fcs, 4, &counts("r1", 503, &[4, 4])).unwrap();
    assert_eq!(record.filtered_counts, 8);
}

#[test]
fn test_count_vector_mismatch_aborts_pass() {
    let enriched = enriched_set(&[("AAAA", 10.0), ("CCCC", 4.0)]);
    let regions = vec![
        counts("good", 100, &[1, 1]),
        counts("bad", 100, &[1, 1, 1]),
    ];
    let err = weighter().weigh_regions(&enriched, &regions).unwrap_err();
    match err {
        BindnSeqError::CountVectorMismatch {
            region,
            expected,
            found,
        } => {
            assert_eq!(region, "bad");
            assert_eq!(expected, 2);
            assert_eq!(found, 3);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_write_density_table() {
    let enriched = enriched_set(&[("AAAA", 10.0), ("CCCC", 4.0)]);
    let records = weighter()
        .weigh_regions(
            &enriched,
            &[counts("r1", 1003, &[2, 2]), counts("r2", 10, &[1, 0])],
        )
        .unwrap();

    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("enriched_kmers.3p_utr.4_kmer.txt");
    write_density_table(&records, &enriched, &path).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "region\tseq_len\tsum_counts\tobs_counts\tfiltered_counts\tfc_rank\tordinal_rank\tlog2_weighted_density\tmax_kmer_fc"
    );
    assert_eq!(lines[1], "r1\t1003\t4\t2,2\t4\t10,4\t1,2\t2.0000\t10.0000");
    assert_eq!(lines[2], "r2\t10\t1\t1,0\t1\t10,4\t1,2\t-8.0000\t0.0039");
}

#[test]
fn test_aggregate_by_transcript() {
    let record = |region: &str, seq_len: usize, sum_counts: u64| DensityRecord {
        region: region.to_string(),
        seq_len,
        sum_counts,
        filtered_counts: sum_counts,
        obs_counts: vec![sum_counts as u32],
        log2_weighted_density: 0.0,
        max_kmer_fc: 0.0,
    };
    let records = vec![
        record("chr1:0-503:+;cds;T2;G1", 503, 3),
        record("chr1:1000-1503:+;cds;T1;G1", 503, 1),
        record("chr1:2000-2503:+;cds;T1;G1", 503, 2),
        record("chr1:3000-3100:+", 100, 7),
    ];
    let rows = aggregate_by_transcript(&records, 4);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].transcript_id, "T1");
    assert_eq!(rows[0].gene_id, "G1");
    assert_eq!(rows[0].sum_counts, 3);
    assert!((rows[0].num_starts_in_kb - 1.0).abs() < 1e-12);
    assert!((rows[0].density - 3.0).abs() < 1e-9);
    assert_eq!(rows[1].transcript_id, "T2");
    assert!((rows[1].density - 6.0).abs() < 1e-9);

    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("per_gene.txt");
    write_transcript_table(&rows, &path).unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("gene_id\ttranscript_id\tsum_counts_in_trans"));
    assert_eq!(contents.lines().count(), 3);
}
