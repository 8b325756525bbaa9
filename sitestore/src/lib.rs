pub mod config;
pub mod error;
pub mod ident;
pub mod persist;
pub mod record;
pub mod registry;
pub mod sql;
pub mod store;

pub use config::{IdStrategy, StoreConfig};
pub use error::{Result, StoreError};
pub use record::{Page, Record};
pub use registry::Table;
pub use sql::{ExecResult, ResultMeta, Statement};
pub use store::{Store, TableHandle};
