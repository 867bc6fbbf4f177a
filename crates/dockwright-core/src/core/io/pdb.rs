use crate::core::io::traits::StructureFormat;
use crate::core::models::atom::{AtomRecord, RecordKind};
use crate::core::models::structure::Structure;
use crate::core::utils::columns::{column_char, is_atom_record, slice_and_trim};
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Line is too short for ATOM/HETATM record (must reach column 54)")]
    LineTooShort,
}

const MIN_COORD_LINE_LEN: usize = 54;

fn parse_float(line: &str, start: usize, end: usize, line_num: usize) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: value.to_string(),
        },
    })
}

fn parse_optional_float(line: &str, start: usize, end: usize, default: f64) -> f64 {
    slice_and_trim(line, start, end).parse().unwrap_or(default)
}

fn parse_atom_line(line: &str, line_num: usize, ordinal: usize) -> Result<AtomRecord, PdbError> {
    if line.len() < MIN_COORD_LINE_LEN {
        return Err(PdbError::Parse {
            line: line_num,
            kind: PdbParseErrorKind::LineTooShort,
        });
    }

    let kind = if line.starts_with("HETATM") {
        RecordKind::Hetatm
    } else {
        RecordKind::Atom
    };

    // Serial fields overflow to hex or asterisks in large files; writers renumber anyway.
    let serial = slice_and_trim(line, 6, 11).parse().unwrap_or(ordinal);

    let res_seq_str = slice_and_trim(line, 22, 26);
    let residue_number = res_seq_str.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidInt {
            columns: "23-26".to_string(),
            value: res_seq_str.to_string(),
        },
    })?;

    let x = parse_float(line, 30, 38, line_num)?;
    let y = parse_float(line, 38, 46, line_num)?;
    let z = parse_float(line, 46, 54, line_num)?;

    Ok(AtomRecord {
        kind,
        serial,
        name: format!("{:<4}", line.get(12..16).unwrap_or("")),
        alt_loc: column_char(line, 16),
        residue_name: slice_and_trim(line, 17, 20).to_string(),
        chain_id: column_char(line, 21),
        residue_number,
        insertion_code: column_char(line, 26),
        position: Point3::new(x, y, z),
        occupancy: parse_optional_float(line, 54, 60, 1.0),
        temp_factor: parse_optional_float(line, 60, 66, 0.0),
        element: slice_and_trim(line, 76, 78).to_string(),
        charge: slice_and_trim(line, 78, 80).to_string(),
    })
}

fn format_atom_line(atom: &AtomRecord, serial: usize) -> String {
    format!(
        "{:<6}{:>5} {:<4}{}{:>3} {}{:>4}{}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}{:<2}",
        atom.kind.to_string(),
        serial,
        atom.name,
        atom.alt_loc,
        atom.residue_name,
        atom.chain_id,
        atom.residue_number,
        atom.insertion_code,
        atom.position.x,
        atom.position.y,
        atom.position.z,
        atom.occupancy,
        atom.temp_factor,
        atom.element,
        atom.charge,
    )
}

fn format_ter_line(last: &AtomRecord, serial: usize) -> String {
    format!(
        "TER   {:>5}      {:>3} {}{:>4}{}",
        serial, last.residue_name, last.chain_id, last.residue_number, last.insertion_code
    )
}

/// Reader and writer for the coordinate section of PDB files.
///
/// Only the first model is read. The writer emits atoms in order with serials renumbered
/// from 1, a `TER` record after each chain, and a closing `END`.
pub struct PdbFile;

impl StructureFormat for PdbFile {
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<Structure, Self::Error> {
        let mut structure = Structure::new();

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            if line.starts_with("ENDMDL") || line.trim_end() == "END" {
                break;
            }
            if is_atom_record(&line) {
                let atom = parse_atom_line(&line, line_num + 1, structure.len() + 1)?;
                structure.push(atom);
            }
        }

        Ok(structure)
    }

    fn write_to(structure: &Structure, writer: &mut impl Write) -> Result<(), Self::Error> {
        let mut serial = 0;
        let mut previous: Option<&AtomRecord> = None;

        for atom in structure.atoms() {
            if let Some(prev) = previous {
                if prev.chain_id != atom.chain_id {
                    serial += 1;
                    writeln!(writer, "{}", format_ter_line(prev, serial))?;
                }
            }
            serial += 1;
            writeln!(writer, "{}", format_atom_line(atom, serial))?;
            previous = Some(atom);
        }
        if let Some(last) = previous {
            serial += 1;
            writeln!(writer, "{}", format_ter_line(last, serial))?;
        }
        writeln!(writer, "END")?;
        Ok(())
    }
}

/// Reads every line of a text file, keeping non-atom records for pass-through rewriting.
pub fn read_lines(path: &Path) -> Result<Vec<String>, PdbError> {
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().map(str::to_string).collect())
}

pub fn write_lines(path: &Path, lines: &[String]) -> Result<(), PdbError> {
    let mut content = lines.join("\n");
    content.push('\n');
    std::fs::write(path, content)?;
    Ok(())
}
