use crate::cli::ResultsArgs;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use dockwright::engine::scores::ScoreRecord;
use dockwright::workflows::results::{self, ProjectResults};
use std::fmt::Write as _;

pub fn run(args: ResultsArgs, config: &AppConfig) -> Result<()> {
    let layout = config.layout();

    if args.from_log {
        let log = layout.docking_log(&args.project)?;
        let project_dir = layout.project_dir(&args.project)?;
        let best = results::best_from_log(&log, &[project_dir])?;
        if args.json {
            println!("{}", to_json(&best)?);
        } else {
            println!(
                "Best model {} (score {:.3}): {}",
                best.desc,
                best.score,
                best.pdb_path.display()
            );
        }
        return Ok(());
    }

    let results = results::project_results(&layout, &args.project)?;
    if args.json {
        println!("{}", to_json(&results)?);
    } else {
        print!("{}", render_table(&results));
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::Other(e.into()))
}

fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"))
}

/// Lists every model with its score terms; the best row is marked with `*`.
pub fn render_table(results: &ProjectResults) -> String {
    let term_names: Vec<&str> = results
        .all
        .first()
        .map(|r| r.terms.iter().map(|t| t.name.as_str()).collect())
        .unwrap_or_default();

    let mut out = String::new();
    let _ = write!(out, "  {:<32}", "model");
    for name in &term_names {
        let _ = write!(out, " {name:>14}");
    }
    out.push('\n');

    for record in &results.all {
        let marker = if is_best(record, &results.best) { '*' } else { ' ' };
        let _ = write!(out, "{marker} {:<32}", record.desc);
        for name in &term_names {
            let _ = write!(out, " {:>14}", format_value(record.term(name)));
        }
        out.push('\n');
    }

    let location = results
        .best
        .pdb_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(structure file not found)".to_string());
    let _ = writeln!(
        out,
        "\nBest: {} ({:.3}) {}",
        results.best.desc, results.best.score, location
    );
    out
}

fn is_best(record: &ScoreRecord, best: &ScoreRecord) -> bool {
    record.desc == best.desc && record.score == best.score
}
