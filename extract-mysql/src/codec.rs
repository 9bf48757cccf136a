//! Conversion between [`sqlx`] MySQL rows and [`Cell`] values.
//!
//! Rows are decoded by looking at the type the server reports for each column, so that any
//! table can be copied without knowing its schema up front.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::mysql::types::MySqlTime;
use sqlx::mysql::{MySqlArguments, MySqlRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Column, MySql, Row, TypeInfo, ValueRef};

use crate::types::{Cell, TableRow};

/// A MySQL query with positional arguments.
pub type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

/// Decodes every column of `row` into a [`TableRow`].
pub fn decode_row(row: &MySqlRow) -> Result<TableRow, sqlx::Error> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for (index, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_owned());
        values.push(decode_cell(row, index)?);
    }

    Ok(TableRow::new(columns, values))
}

fn decode_cell(row: &MySqlRow, index: usize) -> Result<Cell, sqlx::Error> {
    let type_name = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Cell::Null);
        }

        raw.type_info().name().to_owned()
    };

    let cell = match type_name.as_str() {
        // `TINYINT(1)` is reported as BOOLEAN but stores the full byte.
        "BOOLEAN" => match row.try_get::<i8, _>(index) {
            Ok(value) => Cell::I64(i64::from(value)),
            Err(_) => Cell::U64(u64::from(row.try_get::<u8, _>(index)?)),
        },
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => Cell::I64(row.try_get(index)?),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => Cell::U64(row.try_get(index)?),
        "YEAR" => Cell::U64(u64::from(row.try_get_unchecked::<u16, _>(index)?)),
        "FLOAT" => Cell::F32(row.try_get(index)?),
        "DOUBLE" => Cell::F64(row.try_get(index)?),
        "DECIMAL" => Cell::Numeric(row.try_get::<BigDecimal, _>(index)?),
        "DATE" => Cell::Date(row.try_get::<NaiveDate, _>(index)?),
        "TIME" => Cell::Time(row.try_get::<MySqlTime, _>(index)?),
        "DATETIME" => Cell::DateTime(row.try_get::<NaiveDateTime, _>(index)?),
        "TIMESTAMP" => Cell::Timestamp(row.try_get::<DateTime<Utc>, _>(index)?),
        "JSON" => Cell::Json(row.try_get::<Json<serde_json::Value>, _>(index)?.0),
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            Cell::String(row.try_get_unchecked::<String, _>(index)?)
        }
        // BINARY, VARBINARY, BLOB variants, BIT, GEOMETRY and anything unknown keep their bytes.
        _ => Cell::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
    };

    Ok(cell)
}

/// Binds `cell` as the next positional argument of `query`.
pub fn bind_cell<'q>(query: MySqlQuery<'q>, cell: &'q Cell) -> MySqlQuery<'q> {
    match cell {
        Cell::Null => query.bind(None::<String>),
        Cell::I64(value) => query.bind(*value),
        Cell::U64(value) => query.bind(*value),
        Cell::F32(value) => query.bind(*value),
        Cell::F64(value) => query.bind(*value),
        Cell::Numeric(value) => query.bind(value),
        Cell::String(value) => query.bind(value.as_str()),
        Cell::Bytes(value) => query.bind(value.as_slice()),
        Cell::Date(value) => query.bind(*value),
        Cell::Time(value) => query.bind(value),
        Cell::DateTime(value) => query.bind(*value),
        Cell::Timestamp(value) => query.bind(*value),
        Cell::Json(value) => query.bind(Json(value)),
    }
}

/// Binds all `cells` in order.
pub fn bind_cells<'q>(query: MySqlQuery<'q>, cells: &'q [Cell]) -> MySqlQuery<'q> {
    cells.iter().fold(query, bind_cell)
}
