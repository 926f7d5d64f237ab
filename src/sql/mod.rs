//! Statement catalog: schema, bulk loads, transformations and diagnostics

pub mod catalog;
pub mod dialect;
pub mod literal;
pub mod load;
pub mod schema;
pub mod transform;

pub use catalog::{Statement, StatementCatalog, StatementKind};
pub use dialect::Dialect;
pub use schema::Table;
