use super::error::EngineError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SCORE_PREFIX: &str = "SCORE:";
pub const TOTAL_SCORE_COLUMN: &str = "total_score";
pub const DESCRIPTION_COLUMN: &str = "description";

static TRAILING_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_(\d+)$").expect("trailing index pattern is valid"));

/// One named column value of a score row; `None` when absent or unparsable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreTerm {
    pub name: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub desc: String,
    pub index: Option<u32>,
    pub score: f64,
    pub pdb_path: Option<PathBuf>,
    pub terms: Vec<ScoreTerm>,
}

impl ScoreRecord {
    pub fn term(&self, name: &str) -> Option<f64> {
        self.terms
            .iter()
            .find(|t| t.name == name)
            .and_then(|t| t.value)
    }
}

/// Extracts the trailing `_<digits>` index of a descriptor or file stem.
pub fn descriptor_index(desc: &str) -> Option<u32> {
    TRAILING_INDEX
        .captures(desc)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Maps structure indices to the files matching `pattern`.
///
/// Matches are visited in sorted order, so a later file wins when two share an index.
pub fn index_structures(pattern: &str) -> BTreeMap<u32, PathBuf> {
    let mut paths: Vec<PathBuf> = match glob::glob(pattern) {
        Ok(entries) => entries.filter_map(Result::ok).collect(),
        Err(e) => {
            warn!(pattern, error = %e, "Invalid structure glob; no structures will be matched.");
            Vec::new()
        }
    };
    paths.sort();

    let mut map = BTreeMap::new();
    for path in paths {
        let index = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(descriptor_index);
        if let Some(index) = index {
            map.insert(index, path);
        }
    }
    map
}

fn is_header_row(line: &str) -> bool {
    line.starts_with(SCORE_PREFIX) && line.contains(TOTAL_SCORE_COLUMN)
}

fn header_columns(header: &str) -> Vec<String> {
    let parts: Vec<&str> = header.split_whitespace().collect();
    let desc_idx = parts
        .iter()
        .position(|p| *p == DESCRIPTION_COLUMN)
        .unwrap_or(parts.len());
    parts
        .get(1..desc_idx)
        .unwrap_or_default()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn parse_row(parts: &[&str], columns: &[String]) -> ScoreRecord {
    let mappable = parts.len() - 2;
    let terms: Vec<ScoreTerm> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| ScoreTerm {
            name: name.clone(),
            value: if i < mappable {
                parts[i + 1].parse().ok()
            } else {
                None
            },
        })
        .collect();

    let desc = parts[parts.len() - 1].to_string();
    let score = terms
        .iter()
        .find(|t| t.name == TOTAL_SCORE_COLUMN)
        .and_then(|t| t.value)
        .unwrap_or(0.0);

    ScoreRecord {
        index: descriptor_index(&desc),
        desc,
        score,
        pdb_path: None,
        terms,
    }
}

/// Parses score-table text into records, resolving structure paths through `structures`.
///
/// `source` only labels errors.
pub fn parse_table(
    content: &str,
    source: &Path,
    structures: &BTreeMap<u32, PathBuf>,
) -> Result<Vec<ScoreRecord>, EngineError> {
    let mut lines = content.lines();
    let header = lines
        .by_ref()
        .find(|l| is_header_row(l))
        .ok_or_else(|| EngineError::Parse {
            path: source.to_path_buf(),
            reason: format!("no header row containing '{TOTAL_SCORE_COLUMN}'"),
        })?;
    let columns = header_columns(header);

    // Only rows after the header belong to the table.
    let records: Vec<ScoreRecord> = lines
        .filter(|l| l.starts_with(SCORE_PREFIX) && !is_header_row(l))
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            (parts.len() >= 3).then(|| parse_row(&parts, &columns))
        })
        .map(|mut record| {
            record.pdb_path = record.index.and_then(|i| structures.get(&i).cloned());
            record
        })
        .collect();

    if records.is_empty() {
        return Err(EngineError::Parse {
            path: source.to_path_buf(),
            reason: "no data rows".to_string(),
        });
    }
    Ok(records)
}

/// Whether `candidate` should replace `current` as the best score.
///
/// NaN never beats anything, and anything beats NaN.
pub(crate) fn improves_on(candidate: f64, current: f64) -> bool {
    !candidate.is_nan() && (current.is_nan() || candidate < current)
}

/// Minimum score wins; the earliest record wins ties. NaN scores rank last.
pub fn select_best(records: &[ScoreRecord]) -> Option<&ScoreRecord> {
    records.iter().fold(None, |best, record| match best {
        Some(current) if !improves_on(record.score, current.score) => Some(current),
        _ => Some(record),
    })
}

/// Reads score tables written by the docking engine.
pub struct ScoreTableParser;

impl ScoreTableParser {
    /// Parses every data row of `table`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotFound`] when the table is missing and
    /// [`EngineError::Parse`] when it has no header row or no data rows.
    pub fn parse_all(table: &Path, structure_glob: &str) -> Result<Vec<ScoreRecord>, EngineError> {
        if !table.exists() {
            return Err(EngineError::not_found("Score table", table));
        }
        let content = std::fs::read_to_string(table)?;
        let structures = index_structures(structure_glob);
        let records = parse_table(&content, table, &structures)?;
        debug!(
            table = %table.display(),
            records = records.len(),
            structures = structures.len(),
            "Parsed score table."
        );
        Ok(records)
    }

    pub fn find_best(table: &Path, structure_glob: &str) -> Result<ScoreRecord, EngineError> {
        let records = Self::parse_all(table, structure_glob)?;
        select_best(&records)
            .cloned()
            .ok_or_else(|| EngineError::Internal("score table yielded no records".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::project::structure_glob_in;
    use std::fs;
    use tempfile::tempdir;

    const TABLE: &str = "\
SEQUENCE:
SCORE: total_score     fa_atr  fa_rep description
SCORE:    -120.5    -300.1   40.2 complex_input_full_0001
SCORE:    -135.2    -310.0   35.0 complex_input_full_0003
SCORE:     -99.0    -250.7   nan complex_input_full_0002
";

    fn parse(content: &str) -> Result<Vec<ScoreRecord>, EngineError> {
        parse_table(content, Path::new("docking.fasc"), &BTreeMap::new())
    }

    #[test]
    fn parse_table_returns_one_record_per_data_row() {
        let records = parse(TABLE).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].desc, "complex_input_full_0001");
        assert_eq!(records[0].index, Some(1));
        assert_eq!(records[0].score, -120.5);
        assert_eq!(records[0].term("fa_atr"), Some(-300.1));
        assert_eq!(records[1].terms.len(), 3);
    }

    #[test]
    fn best_record_is_minimum_score() {
        let records = parse(TABLE).unwrap();
        let best = select_best(&records).unwrap();
        assert_eq!(best.index, Some(3));
        assert_eq!(best.score, -135.2);
    }

    #[test]
    fn nan_total_score_is_never_best() {
        let table = "SCORE: total_score description\nSCORE: -120.5 m_1\nSCORE: -135.2 m_3\nSCORE: nan m_2\n";
        let records = parse(table).unwrap();
        assert!(records[2].score.is_nan());
        assert_eq!(select_best(&records).unwrap().desc, "m_3");

        let leading = "SCORE: total_score description\nSCORE: NaN m_1\nSCORE: 2.0 m_2\n";
        let records = parse(leading).unwrap();
        assert_eq!(select_best(&records).unwrap().desc, "m_2");
    }

    #[test]
    fn infinite_scores_order_normally() {
        let table = "SCORE: total_score description\nSCORE: inf m_1\nSCORE: 3.0 m_2\nSCORE: -inf m_3\n";
        let records = parse(table).unwrap();
        assert_eq!(select_best(&records).unwrap().desc, "m_3");
    }

    #[test]
    fn rows_before_the_header_are_ignored() {
        let table = "SCORE: -999.0 stale_9\nSCORE: total_score description\nSCORE: -1.0 m_1\n";
        let records = parse(table).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(select_best(&records).unwrap().desc, "m_1");
    }

    #[test]
    fn rows_only_before_the_header_leave_no_data() {
        let table = "SCORE: -999.0 stale_9\nSCORE: total_score description\n";
        assert!(matches!(parse(table), Err(EngineError::Parse { .. })));
    }

    #[test]
    fn single_row_table_best_is_that_row() {
        let table = "SCORE: total_score description\nSCORE: 4.5 only_model_7\n";
        let records = parse(table).unwrap();
        assert_eq!(select_best(&records), Some(&records[0]));
        assert_eq!(records[0].index, Some(7));
    }

    #[test]
    fn ties_resolve_to_first_occurrence() {
        let table = "SCORE: total_score description\nSCORE: -1.0 a_2\nSCORE: -1.0 b_1\n";
        let records = parse(table).unwrap();
        assert_eq!(select_best(&records).unwrap().desc, "a_2");
    }

    #[test]
    fn short_rows_leave_trailing_columns_null() {
        let table = "SCORE: total_score fa_atr fa_rep description\nSCORE: -5.0 model_1\n";
        let record = &parse(table).unwrap()[0];
        assert_eq!(record.score, -5.0);
        assert_eq!(record.term("fa_atr"), None);
        assert_eq!(record.term("fa_rep"), None);
        assert_eq!(record.terms.len(), 3);
    }

    #[test]
    fn missing_total_score_defaults_to_zero_and_non_numeric_is_null() {
        let table = "SCORE: total_score fa_atr description\nSCORE: oops -3.0 design_12\n";
        let record = &parse(table).unwrap()[0];
        assert_eq!(record.term("total_score"), None);
        assert_eq!(record.score, 0.0);
        assert_eq!(record.term("fa_atr"), Some(-3.0));
    }

    #[test]
    fn descriptor_without_suffix_has_null_index() {
        assert_eq!(descriptor_index("complex_input_full_0042"), Some(42));
        assert_eq!(descriptor_index("model"), None);
        assert_eq!(descriptor_index("model_7b"), None);
    }

    #[test]
    fn missing_header_or_rows_is_parse_error() {
        assert!(matches!(
            parse("SCORE: -1.0 model_1\n"),
            Err(EngineError::Parse { .. })
        ));
        assert!(matches!(
            parse("SCORE: total_score description\n"),
            Err(EngineError::Parse { .. })
        ));
    }

    #[test]
    fn parse_all_resolves_structure_paths_by_index() {
        let dir = tempdir().unwrap();
        let table = dir.path().join("docking.fasc");
        fs::write(&table, TABLE).unwrap();
        for name in ["complex_input_full_0001.pdb", "complex_input_full_0003.pdb"] {
            fs::write(dir.path().join(name), "END\n").unwrap();
        }

        let glob = structure_glob_in(dir.path());
        let records = ScoreTableParser::parse_all(&table, &glob).unwrap();
        assert_eq!(
            records[0].pdb_path,
            Some(dir.path().join("complex_input_full_0001.pdb"))
        );
        assert_eq!(records[2].pdb_path, None);

        let best = ScoreTableParser::find_best(&table, &glob).unwrap();
        assert_eq!(
            best.pdb_path,
            Some(dir.path().join("complex_input_full_0003.pdb"))
        );
    }

    #[test]
    fn parse_all_reports_missing_table_as_not_found() {
        let dir = tempdir().unwrap();
        let result = ScoreTableParser::parse_all(&dir.path().join("none.fasc"), "*.pdb");
        assert!(matches!(result, Err(EngineError::NotFound { .. })));
    }
}
