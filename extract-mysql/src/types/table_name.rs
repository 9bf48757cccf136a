use std::fmt;

/// Quotes a MySQL identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(identifier: &str) -> String {
    let mut quoted = String::with_capacity(identifier.len() + 2);
    quoted.push('`');
    for c in identifier.chars() {
        if c == '`' {
            quoted.push('`');
        }
        quoted.push(c);
    }
    quoted.push('`');

    quoted
}

/// A fully qualified MySQL table name: the database holding the table and the table itself.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TableName {
    /// The database containing the table.
    pub database: String,
    /// The name of the table within the database.
    pub name: String,
}

impl TableName {
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> TableName {
        Self {
            database: database.into(),
            name: name.into(),
        }
    }

    /// Returns the same table in another database.
    pub fn in_database(&self, database: impl Into<String>) -> TableName {
        Self {
            database: database.into(),
            name: self.name.clone(),
        }
    }

    /// Returns the table name as a quoted identifier, e.g. `` `shop`.`users` ``.
    pub fn as_quoted_identifier(&self) -> String {
        format!(
            "{}.{}",
            quote_identifier(&self.database),
            quote_identifier(&self.name)
        )
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_plain_identifiers() {
        assert_eq!(quote_identifier("users"), "`users`");
        assert_eq!(
            TableName::new("shop", "users").as_quoted_identifier(),
            "`shop`.`users`"
        );
    }

    #[test]
    fn doubles_embedded_backticks() {
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
        assert_eq!(quote_identifier("``"), "``````");
    }

    #[test]
    fn moves_table_to_other_database() {
        let table = TableName::new("shop", "orders");
        assert_eq!(table.in_database("shop_copy"), TableName::new("shop_copy", "orders"));
        assert_eq!(table.to_string(), "shop.orders");
    }
}
