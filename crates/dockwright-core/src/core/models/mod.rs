pub mod atom;
pub mod project;
pub mod structure;
