pub mod acquire;
pub mod merge;
pub mod prepare;
pub mod results;
