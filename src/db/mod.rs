//! Database layer
//!
//! Connection handling, statement construction and the table manager
//! that ties them to a model.

pub mod filter;
pub mod manager;
pub mod postgres;
pub mod registry;
pub mod statements;
pub mod types;

// Re-export main types
pub use filter::{Filter, FilterOp};
pub use manager::{ObjectStream, TableManager};
pub use registry::{ManagerRegistry, ObjectResolver};
pub use types::{CellValue, ColumnDef, ColumnType, QueryResults, Row};
