use crate::cli::{FetchArgs, ImportArgs, PredictArgs, SequenceSource};
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::utils::parser;
use dockwright::core::models::structure::StructureRole;
use dockwright::workflows::acquire::StructureAcquirer;
use tracing::info;

fn acquirer(config: &AppConfig) -> StructureAcquirer {
    StructureAcquirer::new(config.repository.clone(), Some(config.prediction.clone()))
}

pub async fn fetch(args: FetchArgs, config: &AppConfig) -> Result<()> {
    let accession =
        parser::parse_accession(&args.accession).map_err(|e| CliError::Argument(e.to_string()))?;
    let role: StructureRole = args.target.role.into();
    let dir = config.layout().role_dir(&args.target.project, &role)?;

    info!(accession = %accession, project = %args.target.project, "Fetching structure.");
    let path = acquirer(config).fetch(&accession, &dir).await?;
    println!("✓ {role} {accession} saved to: {}", path.display());
    Ok(())
}

pub async fn import(args: ImportArgs, config: &AppConfig) -> Result<()> {
    let role: StructureRole = args.target.role.into();
    let dir = config.layout().role_dir(&args.target.project, &role)?;
    let path = acquirer(config).copy_local(&args.input, &dir).await?;
    println!("✓ {role} imported to: {}", path.display());
    Ok(())
}

pub async fn predict(args: PredictArgs, config: &AppConfig) -> Result<()> {
    let sequence = read_sequence(&args.source).await?;
    let role: StructureRole = args.target.role.into();
    let dir = config
        .layout()
        .prediction_dir(&args.target.project, &role)?;

    println!(
        "Predicting {role} structure ({} residues); this can take a while...",
        sequence.len()
    );
    let model = acquirer(config).predict(&sequence, &role, &dir).await?;
    println!("✓ Predicted {role} model: {}", model.path.display());
    Ok(())
}

async fn read_sequence(source: &SequenceSource) -> Result<String> {
    let text = match (&source.sequence, &source.fasta) {
        (Some(sequence), _) => sequence.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path).await?,
        (None, None) => {
            return Err(CliError::Argument(
                "either --sequence or --fasta is required".to_string(),
            ));
        }
    };
    parser::parse_sequence(&text).map_err(|e| CliError::Argument(e.to_string()))
}
