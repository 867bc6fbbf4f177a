pub mod acquire;
pub mod dock;
pub mod merge;
pub mod prepare;
pub mod results;
