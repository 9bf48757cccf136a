//! Analysis and rewriting of logged SELECT statements.
//!
//! Parsing is delegated to [`sqlparser`] with the MySQL dialect. Only single-level SELECT
//! statements are accepted: sub-queries and table functions in the FROM clause, as well as set
//! operations, are rejected with [`ErrorKind::UnsupportedNestedQuery`].

use sqlparser::ast::{
    ObjectName, Query, Select, SelectItem, SetExpr, Statement, TableAlias, TableFactor,
    TableWithJoins,
};
use std::borrow::Cow;

use sqlparser::dialect::MySqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::{Parser, ParserError, ParserOptions};
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::bail;
use crate::error::{ErrorKind, ExtractResult};
use crate::extract_error;
use crate::types::TableReference;

/// Select modifiers that only steer the server. They are dropped before parsing.
const SELECT_MODIFIERS: &[&str] = &[
    "HIGH_PRIORITY",
    "STRAIGHT_JOIN",
    "SQL_SMALL_RESULT",
    "SQL_BIG_RESULT",
    "SQL_BUFFER_RESULT",
    "SQL_NO_CACHE",
    "SQL_CACHE",
    "SQL_CALC_FOUND_ROWS",
];

/// A parsed SELECT statement together with the text it was parsed from.
#[derive(Debug, Clone)]
pub struct ParsedStatement {
    text: String,
    query: Box<Query>,
    mutated: bool,
}

impl ParsedStatement {
    /// Returns the text the statement was parsed from.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns whether output columns were appended since parsing.
    pub fn is_mutated(&self) -> bool {
        self.mutated
    }

    /// Returns the aliases of the select list, lowercased.
    pub fn output_aliases(&self) -> Vec<String> {
        let Ok(select) = top_select(&self.query) else {
            return Vec::new();
        };

        select
            .projection
            .iter()
            .filter_map(|item| match item {
                SelectItem::ExprWithAlias { alias, .. } => Some(alias.value.to_lowercase()),
                _ => None,
            })
            .collect()
    }
}

/// Parses `text` as a single SELECT statement.
///
/// Fails with [`ErrorKind::NotASelect`] unless the trimmed text starts with `SELECT`, optionally
/// preceded by opening parentheses. Text passing that check but not parsing as exactly one
/// SELECT fails with [`ErrorKind::InvalidStatement`].
///
/// Select modifiers such as `SQL_NO_CACHE` are not kept in the parsed statement, so a mutated
/// statement renders without them.
pub fn parse(text: &str) -> ExtractResult<ParsedStatement> {
    let trimmed = text.trim();
    if !starts_with_select(trimmed) {
        bail!(
            ErrorKind::NotASelect,
            "Statement is not a SELECT",
            preview(trimmed)
        );
    }

    let sql = strip_select_modifiers(trimmed);
    let mut statements = parse_statements(&sql).map_err(|err| {
        extract_error!(
            ErrorKind::InvalidStatement,
            "SELECT statement could not be parsed",
            err.to_string(),
            source: err
        )
    })?;

    if statements.len() != 1 {
        bail!(
            ErrorKind::InvalidStatement,
            "Log entry must hold exactly one statement",
            format!("found {} statements", statements.len())
        );
    }

    let Some(Statement::Query(query)) = statements.pop() else {
        bail!(
            ErrorKind::InvalidStatement,
            "Statement did not parse as a query",
            preview(trimmed)
        );
    };

    let select = top_select(&query)?;
    if select.from.is_empty() && has_top_level_from(&sql) {
        bail!(
            ErrorKind::InvalidStatement,
            "FROM clause could not be read",
            preview(trimmed)
        );
    }

    Ok(ParsedStatement {
        text: trimmed.to_owned(),
        query,
        mutated: false,
    })
}

/// Returns the tables of the top-level FROM clause in textual order.
///
/// Joined tables and parenthesised join groups are walked in order. Tables without a database
/// qualifier are placed in `default_database`.
pub fn extract_tables(
    statement: &ParsedStatement,
    default_database: &str,
) -> ExtractResult<Vec<TableReference>> {
    let select = top_select(&statement.query)?;

    let mut tables = Vec::new();
    for table_with_joins in &select.from {
        collect_tables(table_with_joins, default_database, &mut tables)?;
    }

    Ok(tables)
}

/// Appends the select-list `fragment` after the existing select-list items.
///
/// The fragment is parsed on its own, e.g. `` `u`.`id` AS `x`, `o`.`id` AS `y` ``.
pub fn append_output_columns(
    mut statement: ParsedStatement,
    fragment: &str,
) -> ExtractResult<ParsedStatement> {
    let mut items = parse_select_list(fragment)?;

    let Some(select) = top_select_mut(&mut statement.query) else {
        bail!(
            ErrorKind::InvalidState,
            "Parsed statement lost its select list",
            statement.text
        );
    };

    select.projection.append(&mut items);
    statement.mutated = true;

    Ok(statement)
}

/// Renders `statement` back to SQL.
///
/// Statements that were not mutated render to the exact text they were parsed from.
pub fn render(statement: &ParsedStatement) -> String {
    if !statement.mutated {
        return statement.text.clone();
    }

    statement.query.to_string()
}

fn starts_with_select(text: &str) -> bool {
    let text = text.trim_start_matches(|c: char| c == '(' || c.is_whitespace());

    let Some(keyword) = text.get(..6) else {
        return false;
    };

    if !keyword.eq_ignore_ascii_case("SELECT") {
        return false;
    }

    !text[6..]
        .chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Removes the select modifiers following the leading `SELECT`, keeping `DISTINCT` and `ALL`.
fn strip_select_modifiers(text: &str) -> Cow<'_, str> {
    let prefix = text.trim_start_matches(|c: char| c == '(' || c.is_whitespace());
    let head_end = text.len() - prefix.len() + "SELECT".len();
    let Some(mut rest) = text.get(head_end..) else {
        return Cow::Borrowed(text);
    };

    let mut kept = String::new();
    let mut stripped = false;
    loop {
        let word_start = rest.trim_start();
        let word_len = word_start
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(word_start.len());
        let word = &word_start[..word_len];

        if SELECT_MODIFIERS
            .iter()
            .any(|modifier| modifier.eq_ignore_ascii_case(word))
        {
            stripped = true;
        } else if word.eq_ignore_ascii_case("DISTINCT") || word.eq_ignore_ascii_case("ALL") {
            kept.push(' ');
            kept.push_str(word);
        } else {
            break;
        }

        rest = &word_start[word_len..];
    }

    if !stripped {
        return Cow::Borrowed(text);
    }

    Cow::Owned(format!("{}{kept} {}", &text[..head_end], rest.trim_start()))
}

/// Returns whether `sql` has a `FROM` keyword at the nesting level of its first `SELECT`.
fn has_top_level_from(sql: &str) -> bool {
    let Ok(tokens) = Tokenizer::new(&MySqlDialect {}, sql)
        .with_unescape(false)
        .tokenize()
    else {
        return false;
    };

    let mut depth = 0usize;
    let mut select_depth = None;
    for token in tokens {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Word(word) if word.keyword == Keyword::SELECT && select_depth.is_none() => {
                select_depth = Some(depth);
            }
            Token::Word(word) if word.keyword == Keyword::FROM && select_depth == Some(depth) => {
                return true;
            }
            _ => {}
        }
    }

    false
}

/// Parses `sql` keeping string literals exactly as written, backslash escapes included.
fn parse_statements(sql: &str) -> Result<Vec<Statement>, ParserError> {
    Parser::new(&MySqlDialect {})
        .with_options(ParserOptions::new().with_unescape(false))
        .try_with_sql(sql)?
        .parse_statements()
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 80;

    if text.chars().count() <= MAX_CHARS {
        return text.to_owned();
    }

    let mut preview: String = text.chars().take(MAX_CHARS).collect();
    preview.push_str("...");
    preview
}

fn top_select(query: &Query) -> ExtractResult<&Select> {
    match query.body.as_ref() {
        SetExpr::Select(select) => Ok(&**select),
        SetExpr::Query(inner) => top_select(inner),
        SetExpr::SetOperation { op, .. } => bail!(
            ErrorKind::UnsupportedNestedQuery,
            "Set operations are not supported",
            op.to_string()
        ),
        other => bail!(
            ErrorKind::InvalidStatement,
            "Statement does not select from tables",
            other.to_string()
        ),
    }
}

fn top_select_mut(query: &mut Query) -> Option<&mut Select> {
    match query.body.as_mut() {
        SetExpr::Select(select) => Some(&mut **select),
        SetExpr::Query(inner) => top_select_mut(inner),
        _ => None,
    }
}

fn parse_select_list(fragment: &str) -> ExtractResult<Vec<SelectItem>> {
    let sql = format!("SELECT {fragment}");
    let mut statements = parse_statements(&sql).map_err(|err| {
        extract_error!(
            ErrorKind::InvalidStatement,
            "Output columns could not be parsed",
            format!("{err}\nFragment: {fragment}"),
            source: err
        )
    })?;

    let Some(Statement::Query(mut query)) = statements.pop() else {
        bail!(
            ErrorKind::InvalidStatement,
            "Output columns could not be parsed",
            fragment
        );
    };

    match top_select_mut(&mut query) {
        Some(select) if statements.is_empty() && select.from.is_empty() => {
            Ok(std::mem::take(&mut select.projection))
        }
        _ => bail!(
            ErrorKind::InvalidStatement,
            "Output columns must form a plain select list",
            fragment
        ),
    }
}

fn collect_tables(
    table_with_joins: &TableWithJoins,
    default_database: &str,
    tables: &mut Vec<TableReference>,
) -> ExtractResult<()> {
    collect_table_factor(&table_with_joins.relation, default_database, tables)?;
    for join in &table_with_joins.joins {
        collect_table_factor(&join.relation, default_database, tables)?;
    }

    Ok(())
}

fn collect_table_factor(
    factor: &TableFactor,
    default_database: &str,
    tables: &mut Vec<TableReference>,
) -> ExtractResult<()> {
    match factor {
        TableFactor::Table {
            name, alias, args, ..
        } => {
            if args.is_some() {
                bail!(
                    ErrorKind::UnsupportedNestedQuery,
                    "Table functions in FROM are not supported",
                    factor.to_string()
                );
            }

            tables.push(table_reference(name, alias.as_ref(), default_database)?);
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => collect_tables(table_with_joins, default_database, tables)?,
        TableFactor::Derived { .. } => bail!(
            ErrorKind::UnsupportedNestedQuery,
            "Sub-queries in FROM are not supported",
            factor.to_string()
        ),
        _ => bail!(
            ErrorKind::UnsupportedNestedQuery,
            "Only plain tables are supported in FROM",
            factor.to_string()
        ),
    }

    Ok(())
}

fn table_reference(
    name: &ObjectName,
    alias: Option<&TableAlias>,
    default_database: &str,
) -> ExtractResult<TableReference> {
    let alias = alias.map(|alias| alias.name.value.clone());
    let parts: Vec<String> = name
        .0
        .iter()
        .map(|part| unquote_identifier(&part.to_string()))
        .collect();

    match parts.as_slice() {
        [table] => Ok(TableReference::unqualified(
            default_database,
            table.as_str(),
            alias,
        )),
        [database, table] => Ok(TableReference::qualified(
            database.as_str(),
            table.as_str(),
            alias,
        )),
        _ => bail!(
            ErrorKind::InvalidStatement,
            "Table names take at most a database qualifier",
            name.to_string()
        ),
    }
}

/// Strips the quotes of a rendered identifier and undoubles embedded quotes.
fn unquote_identifier(identifier: &str) -> String {
    for quote in ['`', '"'] {
        if identifier.len() >= 2 && identifier.starts_with(quote) && identifier.ends_with(quote) {
            let inner = &identifier[1..identifier.len() - 1];
            return inner.replace(&format!("{quote}{quote}"), &quote.to_string());
        }
    }

    identifier.to_owned()
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    fn tables(sql: &str) -> Vec<TableReference> {
        let statement = parse(sql).unwrap();
        extract_tables(&statement, "app").unwrap()
    }

    #[test]
    fn non_select_statements_are_rejected() {
        for sql in [
            "UPDATE users SET x = 1",
            "  insert into users values (1)",
            "SELECTED",
            "",
            "(  ",
            "WITH t AS (SELECT 1) SELECT * FROM t",
        ] {
            let err = parse(sql).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotASelect, "{sql}");
        }
    }

    #[test]
    fn select_prefix_is_case_insensitive_and_may_be_parenthesised() {
        assert!(parse("select * from users").is_ok());
        assert!(parse("  ( SELECT * FROM users )").is_ok());
        assert!(parse("SELECT\n*\nFROM users").is_ok());
    }

    #[test]
    fn unparsable_selects_are_invalid_statements() {
        let err = parse("SELECT * FROM users WHERE (").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStatement);

        let err = parse("SELECT 1; SELECT 2").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStatement);
    }

    #[test]
    fn set_operations_are_nested_queries() {
        let err = parse("SELECT id FROM users UNION SELECT id FROM admins").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedNestedQuery);
    }

    #[test]
    fn tables_are_listed_in_from_order_with_default_database() {
        assert_eq!(
            tables(
                "SELECT u.name, o.total FROM shop.users AS u JOIN orders o ON o.user_id = u.id"
            ),
            vec![
                TableReference::qualified("shop", "users", Some("u".to_owned())),
                TableReference::unqualified("app", "orders", Some("o".to_owned())),
            ]
        );
    }

    #[test]
    fn comma_joins_and_join_groups_are_walked() {
        assert_eq!(
            tables("SELECT * FROM a, (b JOIN c ON b.id = c.b_id) LEFT JOIN d ON d.id = a.d_id"),
            vec![
                TableReference::unqualified("app", "a", None),
                TableReference::unqualified("app", "b", None),
                TableReference::unqualified("app", "c", None),
                TableReference::unqualified("app", "d", None),
            ]
        );
    }

    #[test]
    fn quoted_identifiers_are_unquoted() {
        assert_eq!(
            tables("SELECT * FROM `my db`.`users` `U`"),
            vec![TableReference::qualified(
                "my db",
                "users",
                Some("U".to_owned())
            )]
        );
    }

    #[test]
    fn repeated_tables_stay_separate() {
        assert_eq!(
            tables("SELECT * FROM users a JOIN users b ON a.referrer_id = b.id"),
            vec![
                TableReference::unqualified("app", "users", Some("a".to_owned())),
                TableReference::unqualified("app", "users", Some("b".to_owned())),
            ]
        );
    }

    #[test]
    fn statements_without_from_have_no_tables() {
        assert!(tables("SELECT 1").is_empty());
    }

    #[test]
    fn sub_queries_in_from_are_rejected() {
        let statement = parse("SELECT * FROM (SELECT id FROM users) AS t").unwrap();
        let err = extract_tables(&statement, "app").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedNestedQuery);

        let statement =
            parse("SELECT * FROM users u JOIN (SELECT user_id FROM orders) o ON o.user_id = u.id")
                .unwrap();
        let err = extract_tables(&statement, "app").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedNestedQuery);
    }

    #[test]
    fn unmutated_statements_render_verbatim() {
        let statement = parse("  select  *   FROM users where id=5  ").unwrap();
        assert_eq!(render(&statement), "select  *   FROM users where id=5");
        assert!(!statement.is_mutated());
    }

    #[test]
    fn appended_columns_follow_the_original_select_list() {
        let statement = parse("SELECT * FROM users WHERE id = 5").unwrap();
        let statement =
            append_output_columns(statement, "`users`.`id` AS `__extract_id_0`").unwrap();

        assert!(statement.is_mutated());
        assert_snapshot!(render(&statement), @"SELECT *, `users`.`id` AS `__extract_id_0` FROM users WHERE id = 5");
    }

    #[test]
    fn appended_columns_keep_every_original_item_in_order() {
        let statement = parse("SELECT name, email AS contact, 1 + 1 FROM users").unwrap();
        let statement = append_output_columns(
            statement,
            "`users`.`id` AS `x_0`, `users`.`tenant` AS `x_1`",
        )
        .unwrap();

        assert_eq!(
            render(&statement),
            "SELECT name, email AS contact, 1 + 1, `users`.`id` AS `x_0`, `users`.`tenant` AS `x_1` FROM users"
        );
    }

    #[test]
    fn appended_columns_keep_backslash_escapes_in_literals() {
        for sql in [
            r"SELECT * FROM users WHERE name LIKE 'a\_b'",
            r"SELECT * FROM users WHERE path = 'C:\\tmp'",
        ] {
            let statement = parse(sql).unwrap();
            let statement = append_output_columns(statement, "`users`.`id` AS `x`").unwrap();

            let rendered = render(&statement);
            let (_, original_where) = sql.split_once(" WHERE ").unwrap();
            assert!(
                rendered.ends_with(&format!(" WHERE {original_where}")),
                "{rendered}"
            );
        }
    }

    #[test]
    fn select_modifiers_do_not_hide_the_from_clause() {
        assert_eq!(
            tables("SELECT SQL_NO_CACHE * FROM users"),
            vec![TableReference::unqualified("app", "users", None)]
        );
        assert_eq!(
            tables("select distinct sql_calc_found_rows high_priority id FROM shop.orders o"),
            vec![TableReference::qualified("shop", "orders", Some("o".to_owned()))]
        );
        assert_eq!(
            tables("(SELECT STRAIGHT_JOIN SQL_BUFFER_RESULT * FROM a JOIN b ON a.id = b.a_id)"),
            vec![
                TableReference::unqualified("app", "a", None),
                TableReference::unqualified("app", "b", None),
            ]
        );
    }

    #[test]
    fn modifiers_are_kept_until_the_statement_is_mutated() {
        let statement = parse("SELECT SQL_NO_CACHE * FROM users WHERE id = 5").unwrap();
        assert_eq!(
            render(&statement),
            "SELECT SQL_NO_CACHE * FROM users WHERE id = 5"
        );

        let statement = append_output_columns(statement, "`users`.`id` AS `x`").unwrap();
        assert_snapshot!(render(&statement), @"SELECT *, `users`.`id` AS `x` FROM users WHERE id = 5");
    }

    #[test]
    fn misread_from_clauses_are_invalid_statements() {
        let err = parse("SELECT SQL_UNKNOWN_HINT * FROM users").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStatement);

        assert!(tables("SELECT EXTRACT(YEAR FROM NOW())").is_empty());
    }

    #[test]
    fn invalid_fragments_are_rejected() {
        let statement = parse("SELECT * FROM users").unwrap();
        let err = append_output_columns(statement.clone(), "id FROM users").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStatement);

        let err = append_output_columns(statement, "(").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStatement);
    }

    #[test]
    fn output_aliases_are_collected() {
        let statement = parse("SELECT id AS Ident, name, email AS `mail` FROM users").unwrap();
        assert_eq!(statement.output_aliases(), vec!["ident", "mail"]);
    }
}
