use dockwright::engine::config::{
    DEFAULT_RECOUNT_INTERVAL, DEFAULT_REPLICAS, DEFAULT_REPOSITORY_URL, DEFAULT_SURFACE_GAP,
};

pub const WORKDIR_ENV: &str = "DOCKWRIGHT_WORKDIR";
pub const TEMPLATES_DIR: &str = "templates";

pub struct DefaultsConfig {
    pub docking_engine: String,
    pub protocol_template: String,
    pub options_template: String,
    pub replicas: usize,
    pub recount_interval: usize,
    pub gap: f64,
    pub cleaning_program: String,
    pub cleaning_args: Vec<String>,
    pub prediction_program: String,
    pub repository_url: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            docking_engine: "rosetta_scripts.linuxgccrelease".to_string(),
            protocol_template: "docking_full.xml".to_string(),
            options_template: "docking.options.txt".to_string(),
            replicas: DEFAULT_REPLICAS,
            recount_interval: DEFAULT_RECOUNT_INTERVAL,
            gap: DEFAULT_SURFACE_GAP,
            cleaning_program: "python3".to_string(),
            cleaning_args: vec!["clean_pdb.py".to_string()],
            prediction_program: "colabfold_batch".to_string(),
            repository_url: DEFAULT_REPOSITORY_URL.to_string(),
        }
    }
}
