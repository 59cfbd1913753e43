use crate::error::{BindnSeqError, Result};
use crate::types::{EnrichmentTable, KmerRecord};
use log::{debug, info};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// File name suffix of Bind-n-Seq odds ratio tables, e.g. `6mer_OR`
const OR_SUFFIX: &str = "mer_OR";

fn tab_separated() -> CsvParseOptions {
    CsvParseOptions::default().with_separator(b'\t')
}

/// Finds every odds ratio table in a results directory.
///
/// # Returns
/// * `Result<Vec<(usize, PathBuf)>>` - Kmer length and path of each `<k>mer_OR` file,
///   ordered by kmer length
///
/// # Errors
/// * Returns `BindnSeqError::InvalidFileFormat` if a file name does not start with a kmer length
/// * Returns `BindnSeqError::Io` for unreadable directory entries
pub fn discover_odds_ratio_files<P: AsRef<Path>>(results_dir: P) -> Result<Vec<(usize, PathBuf)>> {
    let pattern = results_dir.as_ref().join(format!("*{}", OR_SUFFIX));
    let paths = glob::glob(&pattern.to_string_lossy()).map_err(|e| {
        BindnSeqError::invalid_parameter("results_dir", pattern.display(), e.to_string())
    })?;

    let mut found = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| BindnSeqError::Io(e.into_error()))?;
        found.push((kmer_len_from_path(&path)?, path));
    }
    found.sort();
    Ok(found)
}

fn kmer_len_from_path(path: &Path) -> Result<usize> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split("mer").next())
        .and_then(|prefix| prefix.parse().ok())
        .ok_or_else(|| {
            BindnSeqError::InvalidFileFormat(format!(
                "cannot read kmer length from file name {}",
                path.display()
            ))
        })
}

/// Reads a Bind-n-Seq odds ratio table into an `EnrichmentTable`.
///
/// The file is tab separated with one leading comment line. Its kmer column is
/// labelled `#` and concentration columns end with `conc_suffix` (usually `nM`).
///
/// # Arguments
/// * `filename` - Path to the odds ratio table
/// * `kmer_len` - Expected length of every kmer in the table
/// * `conc_suffix` - Suffix identifying concentration columns
///
/// # Errors
/// * Returns `BindnSeqError::InvalidFileFormat` if the kmer or concentration columns are
///   missing, or a kmer has the wrong length
/// * Returns `BindnSeqError::Polars` if the table cannot be parsed
pub fn load_odds_ratio_table<P: AsRef<Path>>(
    filename: P,
    kmer_len: usize,
    conc_suffix: &str,
) -> Result<EnrichmentTable> {
    let path = filename.as_ref();
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_skip_rows(1)
        .with_parse_options(tab_separated())
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    if names.iter().any(|name| name == "#") {
        df.rename("#", "kmer".into())?;
    } else if !names.iter().any(|name| name == "kmer") {
        return Err(BindnSeqError::InvalidFileFormat(format!(
            "{} has no kmer column",
            path.display()
        )));
    }

    let conditions: Vec<String> = names
        .into_iter()
        .filter(|name| name.ends_with(conc_suffix))
        .collect();
    if conditions.is_empty() {
        return Err(BindnSeqError::InvalidFileFormat(format!(
            "{} has no concentration columns ending in '{}'",
            path.display(),
            conc_suffix
        )));
    }

    let mut selection = vec![col("kmer")];
    selection.extend(
        conditions
            .iter()
            .map(|name| col(name.as_str()).cast(DataType::Float64)),
    );
    let df = df.lazy().select(selection).collect()?;

    let kmers = df.column("kmer")?.str()?;
    let columns = conditions
        .iter()
        .map(|name| df.column(name.as_str())?.f64())
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut records = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let kmer = kmers
            .get(idx)
            .ok_or_else(|| BindnSeqError::DataError(format!("missing kmer in row {}", idx + 1)))?
            .trim()
            .to_uppercase();
        if kmer.len() != kmer_len {
            return Err(BindnSeqError::InvalidFileFormat(format!(
                "kmer {} in {} is not {} bases long",
                kmer,
                path.display(),
                kmer_len
            )));
        }
        let scores = columns
            .iter()
            .map(|column| column.get(idx).unwrap_or(f64::NAN))
            .collect();
        records.push(KmerRecord::new(kmer, scores));
    }

    debug!(
        "Loaded {} {}-mers over {} concentrations from {}",
        records.len(),
        kmer_len,
        conditions.len(),
        path.display()
    );
    Ok(EnrichmentTable::new(kmer_len, conditions, records))
}

/// Loads every odds ratio table found in `results_dir`, keyed by kmer length.
///
/// # Errors
/// * Returns `BindnSeqError::MissingData` if the directory holds no `*mer_OR` files
pub fn load_odds_ratios<P: AsRef<Path>>(
    results_dir: P,
    conc_suffix: &str,
) -> Result<BTreeMap<usize, EnrichmentTable>> {
    let results_dir = results_dir.as_ref();
    info!("Loading BindnSeq results from: {}", results_dir.display());
    let files = discover_odds_ratio_files(results_dir)?;
    if files.is_empty() {
        return Err(BindnSeqError::missing_data(format!(
            "no odds ratio files (*{}) in {}",
            OR_SUFFIX,
            results_dir.display()
        )));
    }

    let mut tables = BTreeMap::new();
    for (kmer_len, path) in &files {
        tables.insert(*kmer_len, load_odds_ratio_table(path, *kmer_len, conc_suffix)?);
    }
    info!("  - Found {} OR files", files.len());
    Ok(tables)
}

/// Reads a Bind-n-Seq counts table.
///
/// The header line may start with a `#` comment marker; it is stripped and the
/// remaining names label the columns.
///
/// # Errors
/// * Returns `BindnSeqError::InvalidFileFormat` if the file is empty or the header does not
///   match the number of parsed columns
pub fn load_counts_table<P: AsRef<Path>>(filename: P) -> Result<DataFrame> {
    let path = filename.as_ref();
    let mut header = String::new();
    BufReader::new(File::open(path)?).read_line(&mut header)?;
    let header = header.trim_end();
    if header.is_empty() {
        return Err(BindnSeqError::InvalidFileFormat(format!(
            "{} has no header line",
            path.display()
        )));
    }
    let columns: Vec<&str> = header.strip_prefix('#').unwrap_or(header).split('\t').collect();

    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(tab_separated())
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let parsed: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    if parsed.len() != columns.len() {
        return Err(BindnSeqError::InvalidFileFormat(format!(
            "{} header names {} columns but {} were parsed",
            path.display(),
            columns.len(),
            parsed.len()
        )));
    }
    for (old, new) in parsed.iter().zip(columns) {
        if old != new {
            df.rename(old, new.into())?;
        }
    }

    Ok(df)
}
