use crate::types::Cell;

/// One row as returned by the server: column names in select-list order with their values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableRow {
    columns: Vec<String>,
    values: Vec<Cell>,
}

impl TableRow {
    /// Creates a row from parallel column and value vectors.
    ///
    /// # Panics
    ///
    /// Panics if the vectors differ in length.
    pub fn new(columns: Vec<String>, values: Vec<Cell>) -> Self {
        assert_eq!(
            columns.len(),
            values.len(),
            "a table row needs exactly one value per column"
        );

        Self { columns, values }
    }

    /// Creates a row from `(column, value)` pairs.
    pub fn from_pairs<I, C, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, V)>,
        C: Into<String>,
        V: Into<Cell>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(column, value)| (column.into(), value.into()))
            .unzip();

        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the value of the first column called `column`.
    ///
    /// Column names are compared case-insensitively, as MySQL does.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
            .map(|index| &self.values[index])
    }

    /// Iterates over `(column, value)` pairs in select-list order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}
