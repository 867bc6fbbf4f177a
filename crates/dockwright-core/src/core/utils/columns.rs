//! Helpers for fixed-column PDB records.
//!
//! Column ranges are zero-based and half-open, so the PDB "columns 23-26" residue number
//! field is `22..26`.

pub const CHAIN_ID: usize = 21;
pub const RESIDUE_SEQ: (usize, usize) = (22, 26);
pub const INSERTION_CODE: usize = 26;

/// Columns count characters, not bytes, in every helper here.
fn char_range(line: &str, start: usize, end: usize) -> &str {
    if end <= start {
        return "";
    }
    let mut offsets = line
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(line.len()));
    let Some(from) = offsets.nth(start) else {
        return "";
    };
    let to = offsets.nth(end - start - 1).unwrap_or(line.len());
    &line[from..to]
}

pub fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    char_range(line, start, end).trim()
}

/// Returns the character in column `index`, or a blank when the line is shorter.
pub fn column_char(line: &str, index: usize) -> char {
    line.chars().nth(index).unwrap_or(' ')
}

pub fn is_atom_record(line: &str) -> bool {
    line.starts_with("ATOM") || line.starts_with("HETATM")
}

/// Replaces columns `start..end` with `text`, padding short lines with blanks first.
///
/// `text` is truncated or blank-padded to exactly `end - start` characters so that the
/// columns after the field keep their positions.
pub fn replace_columns(line: &str, start: usize, end: usize, text: &str) -> String {
    let mut chars: Vec<char> = line.chars().collect();
    if chars.len() < end {
        chars.resize(end, ' ');
    }
    let width = end - start;
    let mut field: Vec<char> = text.chars().take(width).collect();
    field.resize(width, ' ');
    chars.splice(start..end, field);
    chars.into_iter().collect()
}
