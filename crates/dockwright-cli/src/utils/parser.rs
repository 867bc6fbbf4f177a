use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid --set format: '{0}'. Expected KEY=VALUE.")]
    InvalidKeyValue(String),

    #[error("Invalid accession code '{0}'. Expected 4 alphanumeric characters (e.g., '1ABC').")]
    InvalidAccession(String),

    #[error("Sequence contains no residues.")]
    EmptySequence,

    #[error("Invalid residue '{residue}' at position {position} of the sequence.")]
    InvalidResidue { residue: char, position: usize },
}

/// Splits `KEY=VALUE` at the first `=`; both halves are trimmed and the key must be non-empty.
pub fn parse_key_value(pair: &str) -> Result<(&str, &str), ParseError> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim(), value.trim())),
        _ => Err(ParseError::InvalidKeyValue(pair.to_string())),
    }
}

pub fn parse_accession(code: &str) -> Result<String, ParseError> {
    let trimmed = code.trim();
    if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(trimmed.to_ascii_uppercase())
    } else {
        Err(ParseError::InvalidAccession(code.to_string()))
    }
}

/// Extracts a one-letter amino-acid sequence from inline text or FASTA content.
///
/// Header (`>`) and comment (`;`) lines are skipped; whitespace is dropped.
pub fn parse_sequence(text: &str) -> Result<String, ParseError> {
    let sequence: String = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('>') && !l.starts_with(';'))
        .flat_map(|l| l.chars().filter(|c| !c.is_whitespace()))
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if sequence.is_empty() {
        return Err(ParseError::EmptySequence);
    }
    if let Some((position, residue)) = sequence
        .chars()
        .enumerate()
        .find(|(_, c)| !c.is_ascii_alphabetic())
    {
        return Err(ParseError::InvalidResidue {
            residue,
            position: position + 1,
        });
    }
    Ok(sequence)
}
