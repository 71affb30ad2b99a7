use anyhow::Result;
use serde_json::{json, Value};
use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo};

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

/// SQL dialect: identifier quoting, catalog queries and SELECT building.
///
/// Implemented per driver. Pure string manipulation, no connection needed.
pub trait QueryDialect: Send + Sync {
    /// Return the driver name as a lowercase string ("postgres", "mysql", …).
    fn name(&self) -> &'static str;

    /// Return `true` if this dialect supports `information_schema.columns`
    /// introspection, enabling the typed SELECT path.
    fn needs_introspection(&self) -> bool {
        true
    }

    /// Quote an identifier (table, column, schema) per dialect.
    /// - MySQL / MariaDB → backtick: `` `col` ``
    /// - PostgreSQL / SQLite → double-quote: `"col"`
    fn quote_ident(&self, s: &str) -> String;

    /// Return the `schema.` prefix for a qualified table reference.
    /// SQLite has no schema namespace, so it returns `""`.
    fn schema_prefix(&self, schema: &str) -> String {
        format!("{}.", self.quote_ident(schema))
    }

    /// Cast expression that makes an unsupported column type readable by
    /// `sqlx::AnyRow`.
    fn cast_to_text(&self, col_quoted: &str) -> String;

    /// Return `true` if `data_type` (an `information_schema.data_type` value)
    /// is natively decodable by `sqlx::AnyRow` without any explicit cast.
    fn is_native_type(&self, data_type: &str) -> bool;

    /// Query returning the connection's default schema, if the driver has one.
    fn default_schema_sql(&self) -> Option<&'static str>;

    /// Query listing base table names, one per row. Takes the schema as its
    /// single bind parameter whenever [`default_schema_sql`] is `Some`.
    ///
    /// [`default_schema_sql`]: QueryDialect::default_schema_sql
    fn list_tables_sql(&self) -> &'static str;

    /// The SQL to introspect `(column_name, data_type)` pairs, binding schema
    /// then table.
    fn introspect_sql(&self) -> &'static str;
}

/// Row decoder: read a single `AnyRow` column into a `serde_json::Value`.
pub trait RowDecoder: Send + Sync {
    /// Decode the column at `idx` using `type_hint` (an `information_schema`
    /// `data_type` string) to reconstruct the correct `Value` variant.
    fn decode_column(&self, row: &AnyRow, idx: usize, type_hint: &str) -> Result<Value>;
}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ─────────────────────────────────────────────────────────────────────────────

pub struct PostgresDialect;

impl QueryDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("\"{}\"", s.replace('"', "\"\""))
    }

    fn cast_to_text(&self, col_quoted: &str) -> String {
        format!("{}::TEXT AS {}", col_quoted, col_quoted)
    }

    fn is_native_type(&self, data_type: &str) -> bool {
        matches!(
            data_type.to_lowercase().as_str(),
            "boolean" | "smallint" | "integer" | "bigint" | "real" | "double precision"
        )
    }

    fn default_schema_sql(&self) -> Option<&'static str> {
        Some("SELECT current_schema()::TEXT")
    }

    fn list_tables_sql(&self) -> &'static str {
        "SELECT table_name::TEXT \
         FROM information_schema.tables \
         WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
         ORDER BY table_name"
    }

    fn introspect_sql(&self) -> &'static str {
        "SELECT column_name::TEXT, data_type::TEXT \
         FROM information_schema.columns \
         WHERE table_schema = $1 AND table_name = $2 \
         ORDER BY ordinal_position"
    }
}

impl RowDecoder for PostgresDialect {
    fn decode_column(&self, row: &AnyRow, idx: usize, type_hint: &str) -> Result<Value> {
        col_to_json(row, idx, type_hint)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MySQL / MariaDB
// ─────────────────────────────────────────────────────────────────────────────

pub struct MysqlDialect {
    name: &'static str,
}

impl MysqlDialect {
    pub fn mysql() -> Self {
        Self { name: "mysql" }
    }

    /// MariaDB shares MySQL's wire protocol and AnyRow behaviour.
    pub fn mariadb() -> Self {
        Self { name: "mariadb" }
    }
}

impl QueryDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        self.name
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("`{}`", s.replace('`', "``"))
    }

    fn cast_to_text(&self, col_quoted: &str) -> String {
        // Comes back as BLOB to AnyRow either way; the decoder reads bytes.
        format!("CONVERT({} USING utf8mb4) AS {}", col_quoted, col_quoted)
    }

    fn is_native_type(&self, data_type: &str) -> bool {
        matches!(
            data_type.to_lowercase().as_str(),
            "int" | "mediumint" | "bigint" | "float" | "double"
        )
    }

    fn default_schema_sql(&self) -> Option<&'static str> {
        Some("SELECT DATABASE()")
    }

    fn list_tables_sql(&self) -> &'static str {
        "SELECT table_name \
         FROM information_schema.tables \
         WHERE table_schema = ? AND table_type = 'BASE TABLE' \
         ORDER BY table_name"
    }

    fn introspect_sql(&self) -> &'static str {
        "SELECT column_name, data_type \
         FROM information_schema.columns \
         WHERE table_schema = ? AND table_name = ? \
         ORDER BY ordinal_position"
    }
}

impl RowDecoder for MysqlDialect {
    fn decode_column(&self, row: &AnyRow, idx: usize, type_hint: &str) -> Result<Value> {
        let anyrow_type = row.column(idx).type_info().name();
        if anyrow_type == "BLOB" {
            blob_to_json(row, idx, type_hint)
        } else {
            col_to_json(row, idx, type_hint)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite
// ─────────────────────────────────────────────────────────────────────────────

pub struct SqliteDialect;

impl QueryDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn needs_introspection(&self) -> bool {
        false
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("\"{}\"", s.replace('"', "\"\""))
    }

    fn schema_prefix(&self, _schema: &str) -> String {
        String::new()
    }

    fn cast_to_text(&self, col_quoted: &str) -> String {
        format!("CAST({} AS TEXT) AS {}", col_quoted, col_quoted)
    }

    fn is_native_type(&self, data_type: &str) -> bool {
        matches!(
            data_type.to_uppercase().as_str(),
            "INTEGER" | "INT" | "REAL" | "NUMERIC" | "TEXT" | "BLOB"
        )
    }

    fn default_schema_sql(&self) -> Option<&'static str> {
        None
    }

    fn list_tables_sql(&self) -> &'static str {
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
         ORDER BY name"
    }

    fn introspect_sql(&self) -> &'static str {
        // Never used: needs_introspection() is false.
        ""
    }
}

impl RowDecoder for SqliteDialect {
    fn decode_column(&self, row: &AnyRow, idx: usize, type_hint: &str) -> Result<Value> {
        col_to_json(row, idx, type_hint)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Combined supertrait so callers only store one object.
pub trait Dialect: QueryDialect + RowDecoder {}
impl Dialect for PostgresDialect {}
impl Dialect for MysqlDialect {}
impl Dialect for SqliteDialect {}

/// Resolve the dialect from a driver name string. Unknown names fall back to
/// PostgreSQL.
pub fn from_driver(driver: &str) -> Box<dyn Dialect> {
    match driver {
        "mysql" => Box::new(MysqlDialect::mysql()),
        "mariadb" => Box::new(MysqlDialect::mariadb()),
        "sqlite" => Box::new(SqliteDialect),
        _ => Box::new(PostgresDialect),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared decoding helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Read a text column that MySQL may hand back as BLOB (information_schema
/// strings, `DATABASE()`).
pub fn blob_or_string(row: &AnyRow, idx: usize) -> Result<String> {
    if row.column(idx).type_info().name() == "BLOB" {
        let bytes: Vec<u8> = row.try_get(idx)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Ok(row.try_get(idx)?)
    }
}

/// MySQL/MariaDB non-native types arrive as BLOB: read the bytes as UTF-8
/// and reinterpret them with the `information_schema` type hint.
fn blob_to_json(row: &AnyRow, idx: usize, type_hint: &str) -> Result<Value> {
    let bytes: Option<Vec<u8>> = row.try_get(idx)?;
    let Some(b) = bytes else {
        return Ok(Value::Null);
    };
    let s = String::from_utf8_lossy(&b).into_owned();
    Ok(match type_hint.to_uppercase().as_str() {
        "DECIMAL" | "NUMERIC" => parse_number(s),
        "JSON" | "JSONB" => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        _ => Value::String(s),
    })
}

/// DECIMAL/NUMERIC text as a JSON number when that is lossless, the original
/// text otherwise.
fn parse_number(s: String) -> Value {
    if let Ok(i) = s.parse::<i64>() {
        return json!(i);
    }
    if let Ok(u) = s.parse::<u64>() {
        return json!(u);
    }
    s.parse::<f64>()
        .ok()
        .filter(|f| f.to_string() == trim_fraction_zeros(&s))
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::String(s))
}

/// `"12.500"` → `"12.5"`, `"3.00"` → `"3"`. Text without a fraction is
/// returned unchanged.
fn trim_fraction_zeros(s: &str) -> &str {
    if !s.contains('.') {
        return s;
    }
    s.trim_end_matches('0').trim_end_matches('.')
}

/// Decode a column that AnyRow supports natively or that was cast to TEXT in
/// the SELECT. Dates, times, UUIDs and binary-as-text stay strings.
fn col_to_json(row: &AnyRow, idx: usize, type_name: &str) -> Result<Value> {
    let v = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(idx)?
            .map_or(Value::Null, Value::Bool),

        "INT2" | "SMALLINT" | "SMALLSERIAL" | "INT4" | "INT" | "INTEGER" | "SERIAL" => row
            .try_get::<Option<i32>, _>(idx)?
            .map_or(Value::Null, |v| json!(v)),

        "TINYINT" => match row.try_get::<Option<String>, _>(idx)? {
            None => Value::Null,
            Some(s) => s
                .parse::<i32>()
                .map(|v| json!(v))
                .unwrap_or_else(|_| Value::String(s)),
        },

        "INT8" | "BIGINT" | "BIGSERIAL" => row
            .try_get::<Option<i64>, _>(idx)?
            .map_or(Value::Null, |v| json!(v)),

        "FLOAT4" | "REAL" | "FLOAT" => row
            .try_get::<Option<f32>, _>(idx)?
            .map_or(Value::Null, |v| json!(v as f64)),

        "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(idx)?
            .map_or(Value::Null, |v| json!(v)),

        "NUMERIC" | "DECIMAL" => row
            .try_get::<Option<String>, _>(idx)?
            .map_or(Value::Null, parse_number),

        "JSON" | "JSONB" => match row.try_get::<Option<String>, _>(idx)? {
            None => Value::Null,
            Some(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        },

        _ => row
            .try_get::<Option<String>, _>(idx)?
            .map_or(Value::Null, Value::String),
    };
    Ok(v)
}
