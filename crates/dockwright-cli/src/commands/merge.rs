use crate::cli::MergeArgs;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use dockwright::workflows::merge::StructureMerger;
use tracing::info;

pub fn run(args: MergeArgs, config: &AppConfig) -> Result<()> {
    let merger = match args.gap {
        Some(gap) if gap.is_finite() && gap >= 0.0 => StructureMerger::with_gap(gap),
        Some(gap) => {
            return Err(CliError::Argument(format!(
                "--gap must be a non-negative distance, got {gap}"
            )));
        }
        None => StructureMerger::new(&config.merge),
    };

    let output = match (args.output, args.project) {
        (Some(output), _) => output,
        (None, Some(project)) => config.layout().complex_input(&project)?,
        (None, None) => {
            return Err(CliError::Argument(
                "either --project or --output is required".to_string(),
            ));
        }
    };

    info!(gap = merger.gap(), output = %output.display(), "Merging structures.");
    let result = tokio::task::block_in_place(|| {
        merger.merge(&args.pair.receptor, &args.pair.binder, &output)
    })?;

    println!(
        "✓ Complex written to: {} ({} atoms, closest contact {:.2} Å, was {:.2} Å)",
        result.output.display(),
        result.atom_count,
        result.final_min_distance,
        result.anchor_distance
    );
    Ok(())
}
