use crate::types::TableRow;

/// Name MySQL gives to the primary key index.
pub const PRIMARY_KEY_NAME: &str = "PRIMARY";

/// One column of one index, as listed by `SHOW INDEXES`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumn {
    /// Index name, `PRIMARY` for the primary key.
    pub key_name: String,
    /// Whether the index allows duplicate values.
    pub non_unique: bool,
    /// Position of the column within the index, starting at 1.
    pub seq_in_index: u32,
    /// Indexed column. `None` for functional key parts, which cannot be matched by value.
    pub column_name: Option<String>,
}

impl IndexColumn {
    pub fn new(
        key_name: impl Into<String>,
        non_unique: bool,
        seq_in_index: u32,
        column_name: Option<&str>,
    ) -> Self {
        Self {
            key_name: key_name.into(),
            non_unique,
            seq_in_index,
            column_name: column_name.map(str::to_owned),
        }
    }

    pub fn is_primary(&self) -> bool {
        self.key_name == PRIMARY_KEY_NAME
    }

    /// Builds an [`IndexColumn`] from a `SHOW INDEXES` result row.
    ///
    /// Returns `None` if the row lacks the `Key_name` or `Non_unique` columns.
    pub fn from_show_indexes_row(row: &TableRow) -> Option<Self> {
        let key_name = row.get("Key_name")?.as_text()?.into_owned();
        let non_unique = row.get("Non_unique")?.as_i64()? != 0;
        let seq_in_index = row
            .get("Seq_in_index")
            .and_then(|cell| cell.as_i64())
            .and_then(|seq| u32::try_from(seq).ok())
            .unwrap_or(1);
        let column_name = row
            .get("Column_name")
            .and_then(|cell| cell.as_text())
            .map(|name| name.into_owned());

        Some(Self {
            key_name,
            non_unique,
            seq_in_index,
            column_name,
        })
    }
}
