use std::fmt;

use extract_mysql::types::{TableName, quote_identifier};

/// One table occurrence in the FROM clause of a SELECT statement.
///
/// Two occurrences of the same physical table are distinct references, they only share the
/// [`TableName`] returned by [`TableReference::table_name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableReference {
    /// Database holding the table, the default database when the statement did not name one.
    pub database: String,
    /// Table name without quotes.
    pub name: String,
    /// Alias given in the statement, taken verbatim.
    pub alias: Option<String>,
    /// Whether the statement qualified the table with its database.
    pub database_explicit: bool,
}

impl TableReference {
    /// Creates a reference to a table the statement named without a database.
    pub fn unqualified(
        default_database: impl Into<String>,
        name: impl Into<String>,
        alias: Option<String>,
    ) -> Self {
        Self {
            database: default_database.into(),
            name: name.into(),
            alias,
            database_explicit: false,
        }
    }

    /// Creates a reference to a `database.table` name.
    pub fn qualified(
        database: impl Into<String>,
        name: impl Into<String>,
        alias: Option<String>,
    ) -> Self {
        Self {
            database: database.into(),
            name: name.into(),
            alias,
            database_explicit: true,
        }
    }

    /// Returns the physical table this reference points to.
    pub fn table_name(&self) -> TableName {
        TableName::new(&self.database, &self.name)
    }

    /// Returns the quoted prefix that selects a column of this occurrence.
    ///
    /// Matches the way the statement spelled the table: the alias if there is one, otherwise the
    /// table name, qualified with its database only when the statement did so.
    pub fn column_qualifier(&self) -> String {
        match &self.alias {
            Some(alias) => quote_identifier(alias),
            None if self.database_explicit => self.table_name().as_quoted_identifier(),
            None => quote_identifier(&self.name),
        }
    }
}

impl fmt::Display for TableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.name)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifier_follows_the_statement_spelling() {
        let aliased = TableReference::unqualified("shop", "users", Some("u".to_owned()));
        assert_eq!(aliased.column_qualifier(), "`u`");

        let bare = TableReference::unqualified("shop", "users", None);
        assert_eq!(bare.column_qualifier(), "`users`");

        let qualified = TableReference::qualified("crm", "users", None);
        assert_eq!(qualified.column_qualifier(), "`crm`.`users`");
    }

    #[test]
    fn references_point_to_their_physical_table() {
        let reference = TableReference::qualified("crm", "users", Some("x".to_owned()));

        assert_eq!(reference.table_name(), TableName::new("crm", "users"));
        assert_eq!(reference.to_string(), "crm.users AS x");
    }
}
