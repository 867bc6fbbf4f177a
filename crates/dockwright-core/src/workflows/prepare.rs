use crate::core::io::pdb::{read_lines, write_lines};
use crate::core::utils::columns::{
    CHAIN_ID, INSERTION_CODE, RESIDUE_SEQ, column_char, is_atom_record, replace_columns,
    slice_and_trim,
};
use crate::engine::config::CleaningConfig;
use crate::engine::error::EngineError;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

pub const CHAIN_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const BLANK_CHAIN_SENTINEL: char = '_';
const DEFAULT_CHAIN: char = 'A';
const MAX_RESIDUE_NUMBER: usize = 9999;

/// Chain labels already handed out across a set of structures.
///
/// Normalizing several structures against one pool gives every chain a label that is
/// unique across all of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainLabelPool {
    used: BTreeSet<char>,
}

impl ChainLabelPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_used(labels: impl IntoIterator<Item = char>) -> Self {
        Self {
            used: labels.into_iter().collect(),
        }
    }

    pub fn contains(&self, label: char) -> bool {
        self.used.contains(&label)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = char> + '_ {
        self.used.iter().copied()
    }

    /// Takes the first unused letter of the alphabet.
    fn allocate(&mut self) -> Result<char, EngineError> {
        let label = CHAIN_ALPHABET
            .chars()
            .find(|c| !self.used.contains(c))
            .ok_or_else(|| {
                EngineError::ResourceExhausted(format!(
                    "all {} chain labels are in use",
                    CHAIN_ALPHABET.len()
                ))
            })?;
        self.used.insert(label);
        Ok(label)
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}{suffix}.pdb"))
}

/// The chain label of the first coordinate record, `A` when blank or absent.
pub fn first_chain_in(lines: &[String]) -> char {
    lines
        .iter()
        .find(|l| is_atom_record(l))
        .map(|l| column_char(l, CHAIN_ID))
        .filter(|c| !c.is_whitespace())
        .unwrap_or(DEFAULT_CHAIN)
}

pub fn detect_first_chain(path: &Path) -> Result<char, EngineError> {
    Ok(first_chain_in(&read_lines(path)?))
}

/// Relabels chains in `lines` with letters from `pool`.
pub fn normalize_chain_lines(
    lines: &[String],
    pool: &mut ChainLabelPool,
) -> Result<Vec<String>, EngineError> {
    let mut mapping: HashMap<char, char> = HashMap::new();
    lines
        .iter()
        .map(|line| {
            if !is_atom_record(line) {
                return Ok(line.clone());
            }
            let mut source = column_char(line, CHAIN_ID);
            if source.is_whitespace() {
                source = BLANK_CHAIN_SENTINEL;
            }
            let label = match mapping.get(&source) {
                Some(label) => *label,
                None => {
                    let label = pool.allocate()?;
                    mapping.insert(source, label);
                    label
                }
            };
            Ok(replace_columns(
                line,
                CHAIN_ID,
                CHAIN_ID + 1,
                &label.to_string(),
            ))
        })
        .collect()
}

/// Renumbers residues from 1 in file order and blanks insertion codes.
///
/// Numbers past 9999 wrap back to 1 so the four-column field stays aligned.
pub fn sanitize_lines(lines: &[String]) -> Vec<String> {
    let mut last_key: Option<(char, String, String)> = None;
    let mut count = 0usize;

    let renumbered: Vec<String> = lines
        .iter()
        .map(|line| {
            if !is_atom_record(line) {
                return line.clone();
            }
            let key = (
                column_char(line, CHAIN_ID),
                slice_and_trim(line, RESIDUE_SEQ.0, RESIDUE_SEQ.1).to_string(),
                slice_and_trim(line, INSERTION_CODE, INSERTION_CODE + 1).to_string(),
            );
            if last_key.as_ref() != Some(&key) {
                count += 1;
                last_key = Some(key);
            }
            let number = (count - 1) % MAX_RESIDUE_NUMBER + 1;
            replace_columns(
                line,
                RESIDUE_SEQ.0,
                INSERTION_CODE + 1,
                &format!("{number:>4} "),
            )
        })
        .collect();

    if count > MAX_RESIDUE_NUMBER {
        warn!(
            residues = count,
            "Residue numbers exceed {MAX_RESIDUE_NUMBER} and were wrapped."
        );
    }
    renumbered
}

/// Writes `<stem>_chains.pdb` next to `input` with chains relabeled from `pool`.
///
/// # Errors
///
/// Returns [`EngineError::ResourceExhausted`] when the pool runs out of letters.
#[instrument(skip_all, name = "normalize_chains", fields(input = %input.display()))]
pub fn normalize_chains(input: &Path, pool: &mut ChainLabelPool) -> Result<PathBuf, EngineError> {
    let lines = read_lines(input)?;
    let normalized = normalize_chain_lines(&lines, pool)?;
    let output = sibling_with_suffix(input, "_chains");
    write_lines(&output, &normalized)?;
    debug!(used = pool.len(), output = %output.display(), "Chains normalized.");
    Ok(output)
}

/// Writes `<stem>_fixed.pdb` next to `input` with residues renumbered from 1.
#[instrument(skip_all, name = "sanitize", fields(input = %input.display()))]
pub fn sanitize(input: &Path) -> Result<PathBuf, EngineError> {
    let lines = read_lines(input)?;
    let sanitized = sanitize_lines(&lines);
    let output = sibling_with_suffix(input, "_fixed");
    write_lines(&output, &sanitized)?;
    debug!(output = %output.display(), "Residues renumbered.");
    Ok(output)
}

/// Normalizes a receptor/binder pair against one shared pool, then sanitizes both.
pub fn prepare_pair(receptor: &Path, binder: &Path) -> Result<(PathBuf, PathBuf), EngineError> {
    let mut pool = ChainLabelPool::new();
    let receptor_chains = normalize_chains(receptor, &mut pool)?;
    let binder_chains = normalize_chains(binder, &mut pool)?;
    let prepared = (sanitize(&receptor_chains)?, sanitize(&binder_chains)?);
    info!(
        receptor = %prepared.0.display(),
        binder = %prepared.1.display(),
        "Structure pair prepared."
    );
    Ok(prepared)
}

/// Runs the external structure-cleaning tool.
pub struct StructurePreparer {
    cleaning: CleaningConfig,
}

impl StructurePreparer {
    pub fn new(cleaning: CleaningConfig) -> Self {
        Self { cleaning }
    }

    /// Cleans `input` with the external tool and moves its product to `output`.
    ///
    /// The tool runs as `<command> <input> <chain>` from the input's directory and is
    /// expected to write `<stem>_<chain>.pdb` there or in the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Process`] when the tool fails or its product is missing.
    #[instrument(skip_all, name = "clean_structure", fields(input = %input.display()))]
    pub async fn clean(&self, input: &Path, output: &Path) -> Result<PathBuf, EngineError> {
        if !input.is_file() {
            return Err(EngineError::not_found("Structure to clean", input));
        }
        let input = tokio::fs::canonicalize(input).await?;
        let chain = detect_first_chain(&input)?;
        let work_dir = input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let program = self.cleaning.command.display_name();
        info!(chain = %chain, "Running structure cleaner.");

        let status = self
            .cleaning
            .command
            .command()
            .arg(&input)
            .arg(chain.to_string())
            .current_dir(&work_dir)
            .status()
            .await
            .map_err(|e| EngineError::process(&program, format!("failed to spawn: {e}")))?;
        if !status.success() {
            return Err(EngineError::process(
                &program,
                format!("exited with {status}"),
            ));
        }

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let expected = format!("{stem}_{chain}.pdb");
        let in_work_dir = work_dir.join(&expected);
        let in_cwd = std::env::current_dir()?.join(&expected);
        let product = if in_work_dir.is_file() {
            in_work_dir
        } else if in_cwd.is_file() {
            in_cwd
        } else {
            return Err(EngineError::process(
                &program,
                format!(
                    "expected output missing: checked {} and {}",
                    in_work_dir.display(),
                    in_cwd.display()
                ),
            ));
        };

        move_file(&product, output).await?;
        info!(output = %output.display(), "Structure cleaned.");
        Ok(output.to_path_buf())
    }
}

async fn move_file(from: &Path, to: &Path) -> Result<(), EngineError> {
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::rename(from, to).await.is_err() {
        tokio::fs::copy(from, to).await?;
        tokio::fs::remove_file(from).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn atom(serial: usize, chain: char, res_seq: &str, icode: char) -> String {
        format!(
            "ATOM  {serial:>5}  CA  ALA {chain}{res_seq:>4}{icode}   {:>8.3}{:>8.3}{:>8.3}  1.00  0.00           C",
            serial as f64, 0.0, 0.0
        )
    }

    fn chains_of(lines: &[String]) -> Vec<char> {
        lines
            .iter()
            .filter(|l| is_atom_record(l))
            .map(|l| column_char(l, CHAIN_ID))
            .collect()
    }

    fn residues_of(lines: &[String]) -> Vec<String> {
        lines
            .iter()
            .filter(|l| is_atom_record(l))
            .map(|l| l[22..27].to_string())
            .collect()
    }

    #[test]
    fn first_chain_defaults_to_a_when_blank() {
        assert_eq!(first_chain_in(&[atom(1, 'H', "1", ' ')]), 'H');
        assert_eq!(first_chain_in(&[atom(1, ' ', "1", ' ')]), 'A');
        assert_eq!(first_chain_in(&["REMARK".to_string()]), 'A');
    }

    #[test]
    fn normalize_assigns_letters_in_first_appearance_order() {
        let lines = vec![
            "HEADER".to_string(),
            atom(1, 'H', "1", ' '),
            atom(2, 'L', "1", ' '),
            atom(3, 'H', "2", ' '),
            atom(4, ' ', "3", ' '),
        ];
        let mut pool = ChainLabelPool::new();
        let out = normalize_chain_lines(&lines, &mut pool).unwrap();
        assert_eq!(out[0], "HEADER");
        assert_eq!(chains_of(&out), vec!['A', 'B', 'A', 'C']);
        assert_eq!(out[1][22..], lines[1][22..]);
    }

    #[test]
    fn shared_pool_never_reuses_labels() {
        let receptor = vec![atom(1, 'A', "1", ' '), atom(2, 'B', "1", ' ')];
        let binder = vec![atom(1, 'A', "1", ' ')];
        let mut pool = ChainLabelPool::new();
        let r = normalize_chain_lines(&receptor, &mut pool).unwrap();
        let b = normalize_chain_lines(&binder, &mut pool).unwrap();
        assert_eq!(chains_of(&r), vec!['A', 'B']);
        assert_eq!(chains_of(&b), vec!['C']);
        assert_eq!(pool.labels().collect::<String>(), "ABC");
    }

    #[test]
    fn allocation_skips_labels_already_used() {
        let mut pool = ChainLabelPool::with_used(['A', 'C']);
        let out = normalize_chain_lines(&[atom(1, 'X', "1", ' '), atom(2, 'Y', "1", ' ')], &mut pool)
            .unwrap();
        assert_eq!(chains_of(&out), vec!['B', 'D']);
    }

    #[test]
    fn exhausted_alphabet_is_resource_exhausted() {
        let mut pool = ChainLabelPool::with_used(CHAIN_ALPHABET.chars());
        let result = normalize_chain_lines(&[atom(1, 'A', "1", ' ')], &mut pool);
        assert!(matches!(result, Err(EngineError::ResourceExhausted(_))));
    }

    #[test]
    fn sanitize_renumbers_runs_contiguously_and_drops_insertion_codes() {
        let lines = vec![
            atom(1, 'A', "10", ' '),
            atom(2, 'A', "10", ' '),
            atom(3, 'A', "10", 'A'),
            atom(4, 'A', "11", ' '),
            "TER".to_string(),
            atom(5, 'B', "11", ' '),
            atom(6, 'A', "10", ' '),
        ];
        let out = sanitize_lines(&lines);
        assert_eq!(
            residues_of(&out),
            vec!["   1 ", "   1 ", "   2 ", "   3 ", "   4 ", "   5 "]
        );
        assert_eq!(out[4], "TER");
        assert_eq!(out[0][27..], lines[0][27..]);
    }

    #[test]
    fn sanitize_wraps_residue_numbers_past_field_width() {
        let lines: Vec<String> = (1..=10_001)
            .map(|i| atom(i, 'A', &(i % 1000).to_string(), if i % 2 == 0 { 'A' } else { ' ' }))
            .collect();
        let out = sanitize_lines(&lines);
        assert_eq!(out.len(), lines.len());
        assert_eq!(&out[9_998][22..27], " 9999 ");
        assert_eq!(&out[9_999][22..27], "   1 ");
        assert_eq!(&out[10_000][22..27], "   2 ");
        assert!(out.iter().zip(&lines).all(|(o, i)| o.len() == i.len()));
    }

    #[test]
    fn normalize_and_sanitize_write_sibling_files() {
        let dir = tempdir().unwrap();
        let receptor = dir.path().join("receptor.pdb");
        let binder = dir.path().join("binder.pdb");
        fs::write(&receptor, format!("{}\n{}\nEND\n", atom(1, 'A', "5", ' '), atom(2, 'A', "6", ' ')))
            .unwrap();
        fs::write(&binder, format!("{}\nEND\n", atom(1, 'A', "42", 'B'))).unwrap();

        let (r, b) = prepare_pair(&receptor, &binder).unwrap();
        assert_eq!(r, dir.path().join("receptor_chains_fixed.pdb"));
        assert_eq!(b, dir.path().join("binder_chains_fixed.pdb"));
        assert!(dir.path().join("receptor_chains.pdb").exists());

        let b_lines = read_lines(&b).unwrap();
        assert_eq!(chains_of(&b_lines), vec!['B']);
        assert_eq!(residues_of(&b_lines), vec!["   1 "]);
        assert_eq!(b_lines.last().map(String::as_str), Some("END"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_moves_tool_product_to_output() {
        use crate::engine::config::ExternalCommand;

        let dir = tempdir().unwrap();
        let input = dir.path().join("raw.pdb");
        fs::write(&input, format!("{}\n", atom(1, 'H', "1", ' '))).unwrap();
        let script = dir.path().join("cleaner.sh");
        // Writes <stem>_<chain>.pdb into the working directory.
        fs::write(&script, "cp \"$1\" \"$(basename \"$1\" .pdb)_$2.pdb\"\n").unwrap();

        let preparer = StructurePreparer::new(CleaningConfig {
            command: ExternalCommand::new("sh").with_args([script.to_string_lossy()]),
        });
        let output = dir.path().join("out").join("receptor_clean.pdb");
        let cleaned = preparer.clean(&input, &output).await.unwrap();

        assert_eq!(cleaned, output);
        assert!(output.exists());
        assert!(!dir.path().join("raw_H.pdb").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_reports_missing_product_and_failed_tool() {
        use crate::engine::config::ExternalCommand;

        let dir = tempdir().unwrap();
        let input = dir.path().join("raw.pdb");
        fs::write(&input, format!("{}\n", atom(1, 'A', "1", ' '))).unwrap();
        let output = dir.path().join("clean.pdb");

        let silent = StructurePreparer::new(CleaningConfig {
            command: ExternalCommand::new("true"),
        });
        assert!(matches!(
            silent.clean(&input, &output).await,
            Err(EngineError::Process { .. })
        ));

        let failing = StructurePreparer::new(CleaningConfig {
            command: ExternalCommand::new("false"),
        });
        match failing.clean(&input, &output).await {
            Err(EngineError::Process { reason, .. }) => assert!(reason.contains("exited")),
            other => panic!("expected process error, got {other:?}"),
        }
    }
}
