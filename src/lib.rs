//! Sheetmap - declarative, bidirectional mapping between spreadsheets and records
//!
//! A record type describes where its fields live on a sheet (a fixed cell,
//! a cell next to a label, a run of cells, or a table of rows) and the
//! [`SheetMapper`] moves values in both directions: loading fills a record
//! from a workbook, saving writes a record into a template workbook.
//!
//! # Features
//!
//! - Fixed cells, labelled cells, arrays and record tables
//! - Horizontal and vertical tables with map and array columns
//! - Merged cells, borders and comments respected on load and save
//! - Typed conversion with number/date patterns, booleans and enums
//! - Accumulated conversion errors with field paths and cell positions
//! - Formula templates with `{rowNumber}` style placeholders
//!
//! # Example
//!
//! ```no_run
//! use royalbit_sheetmap::mapping::*;
//! use royalbit_sheetmap::SheetMapper;
//!
//! #[derive(Debug, Default)]
//! struct Invoice {
//!     customer: Option<String>,
//!     total: Option<f64>,
//! }
//!
//! impl Record for Invoice {}
//!
//! impl SheetRecord for Invoice {
//!     fn sheet() -> SheetSelector {
//!         SheetSelector::name("Invoice")
//!     }
//!
//!     fn fields() -> Vec<FieldBinding<Self>> {
//!         vec![
//!             FieldBinding::labelled_cell(
//!                 "customer",
//!                 LabelledCellMapping::new("Customer"),
//!                 |r: &Invoice| r.customer.clone(),
//!                 |r: &mut Invoice, v| r.customer = v,
//!             ),
//!             FieldBinding::cell(
//!                 "total",
//!                 CellMapping::at("F20"),
//!                 |r: &Invoice| r.total,
//!                 |r: &mut Invoice, v| r.total = v,
//!             ),
//!         ]
//!     }
//! }
//!
//! let mapper = SheetMapper::new();
//! let mut invoice: Invoice = mapper.load("invoice.xlsx")?;
//! invoice.total = Some(1200.0);
//! mapper.save("template.xlsx", "out.xlsx", &mut invoice)?;
//! # Ok::<(), royalbit_sheetmap::SheetMapError>(())
//! ```

pub mod accessor;
pub mod address;
pub mod cli;
pub mod config;
pub mod converter;
pub mod error;
pub mod formatter;
pub mod mapper;
pub mod mapping;
pub mod processor;
pub mod validation;
pub mod workbook;

// Re-export commonly used types
pub use accessor::FieldMetadata;
pub use address::{CellAddress, CellRange, Direction};
pub use config::MapperConfig;
pub use converter::{ConverterRegistry, FieldOptions};
pub use error::{SheetMapError, SheetMapResult};
pub use mapper::SheetMapper;
pub use validation::{ErrorKind, FieldError, SaveReport, SheetBindingErrors};
pub use workbook::{Sheet, Workbook};
