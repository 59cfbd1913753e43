use polars::prelude::*;
use bindnseq_rs::fasta;

#[test]
fn test_read_fasta() {
    let path = "tests/data/regions.fa";
    let df = fasta::read_fasta(path).unwrap();
    assert_eq!(df.height(), 3);
    assert_eq!(df.width(), 2);

    // sequences are uppercased
    let sequences = fasta::labelled_sequences(&df).unwrap();
    assert_eq!(sequences[2].1, "ACGTAAAATGCATGCATGCATGC");
    assert_eq!(sequences[0].0, "chr1:100-200:-;exon;ENSMUST01;ENSMUSG01");

    // test file does not exist
    let result = fasta::read_fasta("tests/data/nonexistent.fasta");
    assert!(result.is_err());
}

#[test]
fn test_write_fasta() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("kmers_out.fasta");
    let df: DataFrame = df!(
        "label" => ["AAAAAA", "CACACA", "GGTTGG"],
        "sequence" => ["AAAAAA", "CACACA", "GGTTGG"],
    )
    .unwrap();

    fasta::write_fasta(&df, &path).unwrap();

    let df_out = fasta::read_fasta(&path).unwrap();
    assert_eq!(df_out.height(), 3);
    assert_eq!(df_out.width(), 2);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        ">AAAAAA\nAAAAAA\n>CACACA\nCACACA\n>GGTTGG\nGGTTGG\n"
    );
}

#[test]
fn test_empty_fasta_is_rejected() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("empty.fa");
    std::fs::write(&path, "\n\n").unwrap();
    assert!(fasta::read_fasta(&path).is_err());
}
