//! # Rusty Cover
//!
//! Generates title pages for a set of project documents. A register of
//! documents (an `.xlsx` workbook) is split into groups by its section and
//! subsection marker rows, and every data row fills the placeholders of a
//! `.docx` template. The filled copies are delivered as one zip archive.
//!
//! ## Stages
//!
//! - **ПД** (project documentation): the register is hierarchical. Rows whose
//!   third cell contains `Раздел` open a section, rows containing `Подраздел`
//!   open a subsection. Each row yields a volume title page; template
//!   paragraphs whose placeholder has no value are removed.
//! - **РД** (working documentation): the register is flat. Rows after the
//!   `Генеральный план` row with a real cipher code yield one document each.
//!
//! ## Layers
//!
//! - [`spreadsheet`] reads the register into a [`table::Table`]
//! - [`table::segment`] splits it into groups
//! - [`document`] and [`substitute`] edit template copies
//! - [`batch`] names, writes and archives the documents
//! - [`pipeline`] ties the above together from [`config::Settings`]
//! - [`session`] is the chat dialogue on top of the pipeline
pub mod batch;
pub mod config;
pub mod document;
pub mod error;
mod helpers;
pub mod logging;
pub mod pipeline;
pub mod session;
pub mod spreadsheet;
pub mod stage;
pub mod substitute;
pub mod table;

pub use config::Settings;
pub use error::RustyCoverError;
pub use pipeline::Artifact;
pub use pipeline::Pipeline;
pub use stage::Stage;
