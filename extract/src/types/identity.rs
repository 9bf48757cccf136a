use extract_mysql::types::TableRow;

use crate::types::TableReference;

/// Ordered, non-empty list of columns that uniquely identify a row of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityColumnSet {
    columns: Vec<String>,
}

impl IdentityColumnSet {
    /// Returns `None` when `columns` is empty.
    pub fn new(columns: Vec<String>) -> Option<Self> {
        if columns.is_empty() {
            return None;
        }

        Some(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }
}

/// Synthetic output column bound to one identity column of one FROM occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAlias {
    /// Name of the output column in the augmented statement.
    pub name: String,
    /// Position of the table occurrence in the FROM clause.
    pub occurrence: usize,
    /// Identity column the alias reads.
    pub column: String,
}

/// Identity values of one table occurrence, read from one row of the augmented statement.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityTupleGroup {
    /// Position of the table occurrence in the FROM clause.
    pub occurrence: usize,
    pub table: TableReference,
    /// One value per identity column, in identity column order.
    pub identity: TableRow,
}

/// Identity tuple groups of one result row, one group per FROM occurrence.
pub type LocatedRow = Vec<IdentityTupleGroup>;

/// Identity tuple groups of every result row of an augmented statement.
pub type LocatedRows = Vec<LocatedRow>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identity_sets_are_rejected() {
        assert!(IdentityColumnSet::new(vec![]).is_none());

        let set = IdentityColumnSet::new(vec!["tenant_id".to_owned(), "id".to_owned()]).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["tenant_id", "id"]);
        assert_eq!(set.len(), 2);
    }
}
