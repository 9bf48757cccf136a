use std::borrow::Cow;
use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::mysql::types::MySqlTime;

/// A single MySQL value, typed after the column it was read from.
///
/// Cells carry identity values from the augmented query to the row lookup, and full rows from
/// the source table to the destination insert. Values are always sent back to the server as bound
/// parameters, never interpolated.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Numeric(BigDecimal),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    /// A `TIME` value, which spans -838:59:59 to 838:59:59.
    Time(MySqlTime),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Returns the value as text when it is a string, or bytes holding valid UTF-8.
    ///
    /// Metadata statements such as `SHOW INDEXES` may return binary strings depending on the
    /// server collation, so both representations are accepted.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Cell::String(value) => Some(Cow::Borrowed(value.as_str())),
            Cell::Bytes(value) => std::str::from_utf8(value).ok().map(Cow::Borrowed),
            _ => None,
        }
    }

    /// Returns the value as a signed integer when it is an integral type that fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::I64(value) => Some(*value),
            Cell::U64(value) => i64::try_from(*value).ok(),
            Cell::String(_) | Cell::Bytes(_) => self.as_text()?.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("NULL"),
            Cell::I64(value) => write!(f, "{value}"),
            Cell::U64(value) => write!(f, "{value}"),
            Cell::F32(value) => write!(f, "{value}"),
            Cell::F64(value) => write!(f, "{value}"),
            Cell::Numeric(value) => write!(f, "{value}"),
            Cell::String(value) => write!(f, "{value:?}"),
            Cell::Bytes(value) => {
                f.write_str("0x")?;
                for byte in value {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Cell::Date(value) => write!(f, "'{value}'"),
            Cell::Time(value) => write!(f, "'{value}'"),
            Cell::DateTime(value) => write!(f, "'{value}'"),
            Cell::Timestamp(value) => write!(f, "'{}'", value.naive_utc()),
            Cell::Json(value) => write!(f, "{value}"),
        }
    }
}

/// Renders bound parameters for diagnostics, e.g. `[5, "alice", NULL]`.
pub fn format_params(params: &[Cell]) -> String {
    let rendered: Vec<String> = params.iter().map(ToString::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::I64(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::String(value.to_owned())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::String(value)
    }
}

impl<T> From<Option<T>> for Cell
where
    T: Into<Cell>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

#[cfg(test)]
mod tests {
    use sqlx::mysql::types::MySqlTimeSign;

    use super::*;

    #[test]
    fn text_is_read_from_strings_and_utf8_bytes() {
        assert_eq!(Cell::from("PRIMARY").as_text().as_deref(), Some("PRIMARY"));
        assert_eq!(
            Cell::Bytes(b"email_unique".to_vec()).as_text().as_deref(),
            Some("email_unique")
        );
        assert_eq!(Cell::Bytes(vec![0xff, 0xfe]).as_text(), None);
        assert_eq!(Cell::I64(1).as_text(), None);
    }

    #[test]
    fn integers_are_read_from_numeric_and_text_cells() {
        assert_eq!(Cell::I64(0).as_i64(), Some(0));
        assert_eq!(Cell::U64(1).as_i64(), Some(1));
        assert_eq!(Cell::U64(u64::MAX).as_i64(), None);
        assert_eq!(Cell::from("1").as_i64(), Some(1));
        assert_eq!(Cell::Null.as_i64(), None);
    }

    #[test]
    fn params_render_for_diagnostics() {
        let params = vec![
            Cell::I64(5),
            Cell::from("alice"),
            Cell::Null,
            Cell::Bytes(vec![0xab, 0x01]),
        ];
        assert_eq!(format_params(&params), r#"[5, "alice", NULL, 0xab01]"#);
    }

    #[test]
    fn times_beyond_a_day_render_as_durations() {
        let span = MySqlTime::new(MySqlTimeSign::Positive, 100, 0, 0, 0).unwrap();
        assert!(format_params(&[Cell::Time(span)]).contains("100:00:00"));
    }

    #[test]
    fn options_map_to_null() {
        assert_eq!(Cell::from(None::<i64>), Cell::Null);
        assert_eq!(Cell::from(Some(7_i64)), Cell::I64(7));
    }
}
