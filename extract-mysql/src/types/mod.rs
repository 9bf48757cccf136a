mod cell;
mod index;
mod table_name;
mod table_row;

pub use cell::*;
pub use index::*;
pub use table_name::*;
pub use table_row::*;
