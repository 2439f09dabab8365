//! Relational rows of one agent.
//!
//! Reads always go through one `input LEFT JOIN output` query.  The joined
//! row is split positionally (the id, then the input columns, then the
//! output columns) into one [`FlatRow`] per side, and each side is rebuilt
//! by [`unflatten`], which reads only its own schema's fields.

use mnemos_schema::{ID_COLUMN, column_name, flatten, quote_ident, unflatten};
use mnemos_types::{ColumnValue, Fields, FlatRow, Record, RecordId, Result, Side};
use rusqlite::{Connection, params_from_iter};
use rusqlite::types::Value as SqlValue;
use tracing::debug;

use crate::db::{from_sql, storage, to_sql};
use crate::registry::CompiledAgent;

/// One joined row before reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub id: RecordId,
    pub input: FlatRow,
    pub output: FlatRow,
}

impl JoinedRow {
    /// Rebuild and validate both sides.
    pub fn reconstruct(&self, agent: &CompiledAgent) -> Result<Record> {
        Ok(Record {
            id: self.id.clone(),
            input: unflatten(&self.input, &agent.input.schema)?,
            output: unflatten(&self.output, &agent.output.schema)?,
        })
    }
}

/// Insert the flattened `record` as a new row of `side`'s table.
pub fn insert(conn: &Connection, agent: &CompiledAgent, side: Side, id: &RecordId, record: &Fields) -> Result<()> {
    let compiled = agent.compiled(side);
    let row = flatten(record, &compiled.schema);
    let mut names = vec![quote_ident(ID_COLUMN)];
    let mut values = vec![SqlValue::Text(id.as_str().to_string())];
    for column in &compiled.columns {
        names.push(quote_ident(&column.name));
        values.push(to_sql(row.get(&column.name).unwrap_or(&ColumnValue::Null)));
    }
    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(agent.table(side)),
        names.join(", "),
        placeholders.join(", ")
    );
    conn.execute(&sql, params_from_iter(values)).map_err(storage)?;
    Ok(())
}

/// Overwrite every column of `side`'s row for `id`.  Returns `false` when the
/// row does not exist.
pub fn update(conn: &Connection, agent: &CompiledAgent, side: Side, id: &RecordId, record: &Fields) -> Result<bool> {
    let compiled = agent.compiled(side);
    let row = flatten(record, &compiled.schema);
    let mut assignments = Vec::with_capacity(compiled.columns.len());
    let mut values = Vec::with_capacity(compiled.columns.len() + 1);
    for (i, column) in compiled.columns.iter().enumerate() {
        assignments.push(format!("{} = ?{}", quote_ident(&column.name), i + 1));
        values.push(to_sql(row.get(&column.name).unwrap_or(&ColumnValue::Null)));
    }
    if assignments.is_empty() {
        return exists(conn, agent, side, id);
    }
    values.push(SqlValue::Text(id.as_str().to_string()));
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?{}",
        quote_ident(agent.table(side)),
        assignments.join(", "),
        quote_ident(ID_COLUMN),
        values.len()
    );
    let changed = conn.execute(&sql, params_from_iter(values)).map_err(storage)?;
    Ok(changed > 0)
}

fn exists(conn: &Connection, agent: &CompiledAgent, side: Side, id: &RecordId) -> Result<bool> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ?1",
        quote_ident(agent.table(side)),
        quote_ident(ID_COLUMN)
    );
    let n: i64 = conn
        .query_row(&sql, [id.as_str()], |row| row.get(0))
        .map_err(storage)?;
    Ok(n > 0)
}

/// Delete `id` from both tables.  Returns `true` when a row was removed.
pub fn delete(conn: &Connection, agent: &CompiledAgent, id: &RecordId) -> Result<bool> {
    let mut removed = 0;
    for side in [Side::Input, Side::Output] {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote_ident(agent.table(side)),
            quote_ident(ID_COLUMN)
        );
        removed += conn.execute(&sql, [id.as_str()]).map_err(storage)?;
    }
    Ok(removed > 0)
}

pub fn count(conn: &Connection, agent: &CompiledAgent) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&agent.input_table));
    let n: i64 = conn.query_row(&sql, [], |row| row.get(0)).map_err(storage)?;
    Ok(usize::try_from(n).unwrap_or(0))
}

// ─────────────────────────────────────────────────────────────────────────────
// Joined reads
// ─────────────────────────────────────────────────────────────────────────────

/// Equality filter on the columns of one side.
#[derive(Debug, Clone, Default)]
pub struct Filter<'a> {
    pub input: Option<&'a Fields>,
    pub output: Option<&'a Fields>,
}

/// Joined row of `id`, if any.
pub fn fetch(conn: &Connection, agent: &CompiledAgent, id: &RecordId) -> Result<Option<JoinedRow>> {
    let clause = format!("i.{} = ?1", quote_ident(ID_COLUMN));
    let mut rows = select(conn, agent, &clause, vec![SqlValue::Text(id.as_str().to_string())])?;
    Ok(rows.pop())
}

/// Every joined row matching `filter`, in insertion order.
///
/// A filter value is compared with the stored column after flattening, so
/// composite fields match on their canonical JSON text.
pub fn find(conn: &Connection, agent: &CompiledAgent, filter: &Filter<'_>) -> Result<Vec<JoinedRow>> {
    let mut clauses = Vec::new();
    let mut values = Vec::new();
    for (side, alias, fields) in [
        (Side::Input, "i", filter.input),
        (Side::Output, "o", filter.output),
    ] {
        let Some(fields) = fields else { continue };
        let schema = &agent.compiled(side).schema;
        let row = flatten(fields, schema);
        for field in schema.iter().filter(|f| fields.contains_key(&f.name)) {
            let column = column_name(&field.name, &field.descriptor);
            let target = format!("{alias}.{}", quote_ident(&column));
            match row.get(&column) {
                None | Some(ColumnValue::Null) => clauses.push(format!("{target} IS NULL")),
                Some(value) => {
                    values.push(to_sql(value));
                    clauses.push(format!("{target} = ?{}", values.len()));
                }
            }
        }
    }
    let clause = if clauses.is_empty() {
        "1 = 1".to_string()
    } else {
        clauses.join(" AND ")
    };
    select(conn, agent, &clause, values)
}

fn select(conn: &Connection, agent: &CompiledAgent, clause: &str, values: Vec<SqlValue>) -> Result<Vec<JoinedRow>> {
    let input_cols: Vec<&str> = agent.input.column_names().collect();
    let output_cols: Vec<&str> = agent.output.column_names().collect();
    let mut projection = vec![format!("i.{}", quote_ident(ID_COLUMN))];
    projection.extend(input_cols.iter().map(|c| format!("i.{}", quote_ident(c))));
    projection.extend(output_cols.iter().map(|c| format!("o.{}", quote_ident(c))));
    let sql = format!(
        "SELECT {} FROM {} i LEFT JOIN {} o ON o.{id} = i.{id} WHERE {clause} ORDER BY i.rowid",
        projection.join(", "),
        quote_ident(&agent.input_table),
        quote_ident(&agent.output_table),
        id = quote_ident(ID_COLUMN),
    );
    debug!(agent = %agent.name.as_str(), %sql, "joined select");

    let mut stmt = conn.prepare(&sql).map_err(storage)?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| {
            let id: String = row.get(0)?;
            let mut input = FlatRow::new();
            for (i, name) in input_cols.iter().enumerate() {
                input.insert(*name, from_sql(row.get_ref(1 + i)?));
            }
            let mut output = FlatRow::new();
            for (j, name) in output_cols.iter().enumerate() {
                output.insert(*name, from_sql(row.get_ref(1 + input_cols.len() + j)?));
            }
            Ok(JoinedRow {
                id: RecordId::from(id),
                input,
                output,
            })
        })
        .map_err(storage)?;
    rows.collect::<std::result::Result<Vec<_>, _>>().map_err(storage)
}
