mod builder;
mod defaults;
mod file;
mod models;

pub use builder::{ConfigSources, build_config};
pub use defaults::WORKDIR_ENV;
pub use models::AppConfig;
