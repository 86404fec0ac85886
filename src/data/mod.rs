//! Data layer: the record-layout descriptor, file loading, and the table.
//!
//! Architecture:
//! ```text
//!  reduced_beam.*.txt  (JSON descriptor + binary records)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  schema   │  parse [descr, offset] → RecordLayout
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  decode records, aggregate files, sort by time
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │ DiagTable │  columns by field name, average/total group views
//!   └──────────┘
//! ```

pub mod loader;
pub mod model;
pub mod schema;
