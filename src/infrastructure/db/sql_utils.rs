use crate::domain::value_objects::{ColumnName, Schema, TableName};
use crate::infrastructure::db::dialect::QueryDialect;

/// `<tenant>.<table>` when a tenant is given, the bare quoted table otherwise.
pub fn qualified_table<D: QueryDialect + ?Sized>(
    tenant: Option<&Schema>,
    table: &TableName,
    dialect: &D,
) -> String {
    let prefix = tenant
        .map(|s| dialect.schema_prefix(&s.0))
        .unwrap_or_default();
    format!("{}{}", prefix, dialect.quote_ident(&table.0))
}

fn order_clause<D: QueryDialect + ?Sized>(order_by: Option<&ColumnName>, dialect: &D) -> String {
    order_by
        .map(|c| format!(" ORDER BY {}", dialect.quote_ident(&c.0)))
        .unwrap_or_default()
}

/// Build `SELECT * FROM <table> [ORDER BY <col>]`.
/// Used for SQLite, where AnyRow decodes every storage class natively.
pub fn build_select_query<D: QueryDialect + ?Sized>(
    tenant: Option<&Schema>,
    table: &TableName,
    order_by: Option<&ColumnName>,
    dialect: &D,
) -> String {
    format!(
        "SELECT * FROM {}{}",
        qualified_table(tenant, table, dialect),
        order_clause(order_by, dialect)
    )
}

/// Build a typed SELECT where every column whose `information_schema.data_type`
/// is not natively supported by `sqlx::AnyRow` is wrapped in the dialect cast.
///
/// `col_types` is a vec of `(column_name, data_type)` pairs in ordinal order.
pub fn build_typed_select_query<D: QueryDialect + ?Sized>(
    tenant: Option<&Schema>,
    table: &TableName,
    order_by: Option<&ColumnName>,
    col_types: &[(String, String)],
    dialect: &D,
) -> String {
    let col_exprs: Vec<String> = col_types
        .iter()
        .map(|(col_name, data_type)| {
            let q = dialect.quote_ident(col_name);
            if dialect.is_native_type(data_type) {
                q
            } else {
                dialect.cast_to_text(&q)
            }
        })
        .collect();

    format!(
        "SELECT {} FROM {}{}",
        col_exprs.join(", "),
        qualified_table(tenant, table, dialect),
        order_clause(order_by, dialect)
    )
}
