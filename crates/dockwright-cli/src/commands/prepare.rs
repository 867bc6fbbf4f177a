use crate::cli::{CleanArgs, NormalizeArgs, PairArgs, SanitizeArgs};
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use dockwright::core::models::structure::StructureRole;
use dockwright::workflows::prepare::{self, ChainLabelPool, StructurePreparer};
use tracing::info;

pub async fn clean(args: CleanArgs, config: &AppConfig) -> Result<()> {
    let destination = match (args.output, args.project, args.role) {
        (Some(output), _, _) => output,
        (None, Some(project), Some(role)) => config
            .layout()
            .cleaned_structure(&project, &StructureRole::from(role))?,
        _ => {
            return Err(CliError::Argument(
                "either --output or --project with --role is required".to_string(),
            ));
        }
    };
    let preparer = StructurePreparer::new(config.cleaning.clone());
    let output = preparer.clean(&args.input, &destination).await?;
    println!("✓ Cleaned structure written to: {}", output.display());
    Ok(())
}

pub fn normalize(args: NormalizeArgs) -> Result<()> {
    let mut pool = ChainLabelPool::new();
    for input in &args.inputs {
        let output = prepare::normalize_chains(input, &mut pool)?;
        println!("✓ {} -> {}", input.display(), output.display());
    }
    let labels: String = pool.labels().collect();
    info!(labels = %labels, "Chain letters allocated.");
    Ok(())
}

pub fn sanitize(args: SanitizeArgs) -> Result<()> {
    let output = prepare::sanitize(&args.input)?;
    println!("✓ Renumbered structure written to: {}", output.display());
    Ok(())
}

pub fn prepare(args: PairArgs) -> Result<()> {
    let (receptor, binder) = prepare::prepare_pair(&args.receptor, &args.binder)?;
    println!("✓ Receptor prepared: {}", receptor.display());
    println!("✓ Binder prepared:   {}", binder.display());
    Ok(())
}
