use crate::error::{BindnSeqError, Result};
use polars::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Reads sequences from a FASTA format file and converts them into a Polars DataFrame.
///
/// # Arguments
/// * `filename` - Path to the FASTA file to read
///
/// # Returns
/// * `Result<DataFrame>` - A DataFrame with two columns:
///   - "label": The sequence identifiers (without '>' prefix)
///   - "sequence": The corresponding DNA/RNA sequences in uppercase
///
/// # Errors
/// * Returns `BindnSeqError::InvalidFileFormat` if no sequences are found
/// * Returns `BindnSeqError::DataError` if DataFrame creation fails
/// * Returns `BindnSeqError::Io` for file reading issues
pub fn read_fasta<P: AsRef<Path>>(filename: P) -> Result<DataFrame> {
    let mut sequences: Vec<(String, String)> = Vec::new();
    let file = File::open(filename)?;
    let reader = BufReader::new(file);

    let mut current_header: Option<String> = None;
    let mut current_sequence = String::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();

        if let Some(header) = line.strip_prefix('>') {
            if let Some(previous) = current_header.take() {
                sequences.push((previous, current_sequence.to_uppercase()));
                current_sequence.clear();
            }
            current_header = Some(header.to_string());
        } else if !line.is_empty() {
            current_sequence.push_str(line);
        }
    }

    if let Some(header) = current_header {
        sequences.push((header, current_sequence.to_uppercase()));
    }

    if sequences.is_empty() {
        return Err(BindnSeqError::InvalidFileFormat("No sequences found".into()));
    }

    let (labels, sequences): (Vec<String>, Vec<String>) = sequences.into_iter().unzip();
    let df = DataFrame::new(vec![
        Column::new("label".into(), labels),
        Column::new("sequence".into(), sequences),
    ])
    .map_err(|e| BindnSeqError::DataError(e.to_string()))?;

    Ok(df)
}

/// Writes sequences from a Polars DataFrame to a FASTA format file.
///
/// # Arguments
/// * `df` - DataFrame containing sequences with "label" and "sequence" columns
/// * `filename` - Path where the FASTA file should be written
///
/// # Errors
/// * Returns `BindnSeqError::Polars` if required columns are missing or not strings
/// * Returns `BindnSeqError::DataError` for null labels or sequences
/// * Returns `BindnSeqError::Io` for file writing issues
pub fn write_fasta<P: AsRef<Path>>(df: &DataFrame, filename: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(filename)?);
    write_fasta_to(df, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Writes FASTA records from a DataFrame to any writer.
pub fn write_fasta_to<W: Write>(df: &DataFrame, writer: &mut W) -> Result<()> {
    let labels = df.column("label")?.str()?;
    let sequences = df.column("sequence")?.str()?;

    for (idx, (label, sequence)) in labels.into_iter().zip(sequences).enumerate() {
        let (Some(label), Some(sequence)) = (label, sequence) else {
            return Err(BindnSeqError::DataError(format!(
                "missing label or sequence in FASTA row {}",
                idx + 1
            )));
        };
        writeln!(writer, ">{}", label)?;
        writeln!(writer, "{}", sequence)?;
    }

    Ok(())
}

/// Pairs each label with its sequence, in file order.
pub fn labelled_sequences(df: &DataFrame) -> Result<Vec<(String, String)>> {
    let labels = df.column("label")?.str()?;
    let sequences = df.column("sequence")?.str()?;

    labels
        .into_iter()
        .zip(sequences)
        .map(|pair| match pair {
            (Some(label), Some(sequence)) => Ok((label.to_string(), sequence.to_string())),
            _ => Err(BindnSeqError::DataError("null label or sequence".into())),
        })
        .collect()
}
