//! # dockwright Core Library
//!
//! Orchestration engine for a receptor/binder docking workflow: structure acquisition and
//! preparation, rigid-body merging of two structures at a controlled separation, supervised
//! execution of an external docking engine, and interpretation of its score table.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture so that pure logic stays testable without
//! any external programs installed.
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`, `ProjectLayout`),
//!   fixed-column PDB I/O, and geometric utilities.
//!
//! - **[`engine`]: The Logic Core.** Configuration, the error taxonomy, progress events, the
//!   score-table parser, the line-by-line progress tracker, the process-wide job registry, and
//!   the docking job manager that launches and supervises the external engine.
//!
//! - **[`workflows`]: The Public API.** Complete steps a caller strings together: acquiring
//!   structures, preparing them, merging them into a complex, and querying finished results.

pub mod core;
pub mod engine;
pub mod workflows;
