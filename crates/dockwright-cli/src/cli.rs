use clap::{Args, Parser, Subcommand, ValueEnum};
use dockwright::core::models::structure::StructureRole;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "dockwright - prepare receptor/binder structures, merge them into a complex, and drive protein docking runs.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Path to a configuration file in TOML format
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S merge.gap=3.0
    #[arg(short = 'S', long = "set", global = true, value_name = "KEY=VALUE")]
    pub set_values: Vec<String>,

    /// Set the number of threads for parallel geometry computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a structure from the remote repository by accession code.
    Fetch(FetchArgs),
    /// Copy a local structure file into a project.
    Import(ImportArgs),
    /// Predict a structure from an amino-acid sequence.
    Predict(PredictArgs),
    /// Run the external cleaning tool on a structure.
    Clean(CleanArgs),
    /// Relabel chains so no letter is shared between the given files.
    Normalize(NormalizeArgs),
    /// Renumber residues sequentially from 1.
    Sanitize(SanitizeArgs),
    /// Normalize and sanitize a receptor/binder pair.
    Prepare(PairArgs),
    /// Place the binder next to the receptor and write the docking complex.
    Merge(MergeArgs),
    /// Launch a docking run and follow its progress.
    Dock(DockArgs),
    /// Show the scored models of a finished docking run.
    Results(ResultsArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleArg {
    Receptor,
    Binder,
}

impl From<RoleArg> for StructureRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Receptor => StructureRole::Receptor,
            RoleArg::Binder => StructureRole::Binder,
        }
    }
}

/// Project and role a structure belongs to.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Project identifier; its directory is created under the workspace root
    #[arg(short, long, value_name = "ID")]
    pub project: String,

    /// Role of the structure within the project
    #[arg(short, long, value_enum)]
    pub role: RoleArg,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Repository accession code (e.g., 1ABC)
    #[arg(required = true, value_name = "ACCESSION")]
    pub accession: String,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to an existing structure file
    #[arg(required = true, value_name = "PATH")]
    pub input: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub source: SequenceSource,
}

/// Where the sequence to predict comes from.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct SequenceSource {
    /// Amino-acid sequence given inline
    #[arg(long, value_name = "SEQUENCE")]
    pub sequence: Option<String>,

    /// FASTA file holding the sequence; header lines are ignored
    #[arg(long, value_name = "PATH")]
    pub fasta: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Structure file to clean
    #[arg(required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Destination of the cleaned structure
    #[arg(short, long, value_name = "PATH", required_unless_present = "project")]
    pub output: Option<PathBuf>,

    /// Store the result as the project's cleaned structure for `--role`
    #[arg(short, long, value_name = "ID", conflicts_with = "output", requires = "role")]
    pub project: Option<String>,

    #[arg(short, long, value_enum, requires = "project")]
    pub role: Option<RoleArg>,
}

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Structure files sharing one pool of chain letters, in allocation order
    #[arg(required = true, num_args = 1.., value_name = "PATH")]
    pub inputs: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SanitizeArgs {
    #[arg(required = true, value_name = "PATH")]
    pub input: PathBuf,
}

#[derive(Args, Debug)]
pub struct PairArgs {
    #[arg(required = true, value_name = "RECEPTOR")]
    pub receptor: PathBuf,

    #[arg(required = true, value_name = "BINDER")]
    pub binder: PathBuf,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// Write the complex into this project's directory
    #[arg(short, long, value_name = "ID", required_unless_present = "output")]
    pub project: Option<String>,

    /// Write the complex to an explicit path instead
    #[arg(short, long, value_name = "PATH", conflicts_with = "project")]
    pub output: Option<PathBuf>,

    /// Override the target surface gap in Angstroms
    #[arg(short, long, value_name = "FLOAT")]
    pub gap: Option<f64>,
}

#[derive(Args, Debug)]
pub struct DockArgs {
    #[arg(short, long, required = true, value_name = "ID")]
    pub project: String,

    /// Number of docking models to generate
    #[arg(short = 'n', long, value_name = "INT")]
    pub replicas: Option<usize>,

    /// Complex to dock; defaults to the project's merged complex
    #[arg(long, value_name = "PATH")]
    pub complex: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ResultsArgs {
    #[arg(short, long, required = true, value_name = "ID")]
    pub project: String,

    /// Print results as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Recover the best model from the run log instead of the score table
    #[arg(long)]
    pub from_log: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dockwright", "dock", "-p", "p1", "-n", "4", "-vv", "-S", "merge.gap=3", "-j", "2",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.set_values, vec!["merge.gap=3"]);
        assert_eq!(cli.threads, Some(2));
        let Commands::Dock(args) = cli.command else {
            panic!("expected dock command");
        };
        assert_eq!(args.project, "p1");
        assert_eq!(args.replicas, Some(4));
    }

    #[test]
    fn predict_requires_exactly_one_sequence_source() {
        assert!(
            Cli::try_parse_from(["dockwright", "predict", "-p", "p", "-r", "binder"]).is_err()
        );
        assert!(
            Cli::try_parse_from([
                "dockwright", "predict", "-p", "p", "-r", "binder", "--sequence", "MK", "--fasta",
                "x.fasta",
            ])
            .is_err()
        );
        assert!(
            Cli::try_parse_from(["dockwright", "predict", "-p", "p", "-r", "binder", "--sequence", "MK"])
                .is_ok()
        );
    }

    #[test]
    fn merge_needs_a_destination() {
        assert!(Cli::try_parse_from(["dockwright", "merge", "r.pdb", "b.pdb"]).is_err());
        assert!(Cli::try_parse_from(["dockwright", "merge", "r.pdb", "b.pdb", "-p", "p"]).is_ok());
        assert!(Cli::try_parse_from(["dockwright", "merge", "r.pdb", "b.pdb", "-o", "c.pdb"]).is_ok());
    }

    #[test]
    fn clean_targets_a_path_or_a_project_role() {
        assert!(Cli::try_parse_from(["dockwright", "clean", "in.pdb"]).is_err());
        assert!(Cli::try_parse_from(["dockwright", "clean", "in.pdb", "-p", "p"]).is_err());
        assert!(Cli::try_parse_from(["dockwright", "clean", "in.pdb", "-o", "out.pdb"]).is_ok());
        assert!(
            Cli::try_parse_from(["dockwright", "clean", "in.pdb", "-p", "p", "-r", "receptor"])
                .is_ok()
        );
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["dockwright", "-q", "-v", "sanitize", "x.pdb"]).is_err());
    }
}
