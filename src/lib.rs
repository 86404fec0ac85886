//! Reader and analysis tools for in-situ beam diagnostics.
//!
//! A particle-in-cell simulation writes reduced per-slice beam diagnostics
//! incrementally during the run, one file per rank. Each file starts with a
//! JSON `[descr, offset]` header describing its fixed binary record layout,
//! followed by one record per timestep. This crate loads all files matching
//! a glob pattern into one time-sorted [`DiagTable`](data::model::DiagTable)
//! and computes physics quantities (emittance, energy spread, charge,
//! position moments) from it:
//!
//! ```no_run
//! use beamdiag::{analysis, read_file};
//!
//! let data = read_file("diags/insitu/reduced_beam.*.txt")?;
//! let projected = analysis::emittance_x(&data.average())?;
//! let per_slice = analysis::emittance_x(&data)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod analysis;
pub mod app;
pub mod color;
pub mod data;
pub mod state;
pub mod ui;

pub use data::loader::{read_file, LoadError};
pub use data::model::{Column, DiagTable, FieldLookup, GroupView, TableError};
pub use data::schema::{RecordLayout, SchemaError};
