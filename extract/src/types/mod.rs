mod identity;
mod table_reference;

pub use extract_mysql::types::{Cell, TableName, TableRow};
pub use identity::*;
pub use table_reference::*;
