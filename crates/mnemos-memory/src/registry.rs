//! Agent registry.
//!
//! The `mnemos_agents` table records, per agent, both schemas as JSON and
//! the names of its two record tables.  [`Registry`] caches the compiled
//! form of every agent opened during the life of the process:
//!
//! * entries are created by `init` or on the first `open` of an agent,
//! * entries are immutable (an agent's schema never changes after creation),
//! * the entry is removed when the agent is erased.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use mnemos_schema::{CompiledSchema, ID_COLUMN, compile, quote_ident};
use mnemos_types::{AgentName, MnemosError, RecordSchema, Result, Side};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::db::storage;

// ─────────────────────────────────────────────────────────────────────────────
// CompiledAgent
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime state of one agent: both compiled schemas plus table names.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledAgent {
    pub name: AgentName,
    pub input: CompiledSchema,
    pub output: CompiledSchema,
    pub input_table: String,
    pub output_table: String,
    pub created_at: DateTime<Utc>,
}

impl CompiledAgent {
    pub fn new(name: AgentName, input: &RecordSchema, output: &RecordSchema) -> Result<Self> {
        Ok(Self {
            input_table: name.input_table(),
            output_table: name.output_table(),
            input: compile(input)?,
            output: compile(output)?,
            name,
            created_at: Utc::now(),
        })
    }

    pub fn compiled(&self, side: Side) -> &CompiledSchema {
        match side {
            Side::Input => &self.input,
            Side::Output => &self.output,
        }
    }

    pub fn table(&self, side: Side) -> &str {
        match side {
            Side::Input => &self.input_table,
            Side::Output => &self.output_table,
        }
    }

    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            name: self.name.clone(),
            input: self.input.schema.clone(),
            output: self.output.schema.clone(),
            created_at: self.created_at,
        }
    }
}

/// Public description of a registered agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: AgentName,
    pub input: RecordSchema,
    pub output: RecordSchema,
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry cache
// ─────────────────────────────────────────────────────────────────────────────

/// Process-wide map from agent name to compiled agent state.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Mutex<HashMap<AgentName, Arc<CompiledAgent>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<AgentName, Arc<CompiledAgent>>>> {
        self.entries
            .lock()
            .map_err(|e| MnemosError::Storage(format!("registry lock poisoned: {e}")))
    }

    pub fn get(&self, name: &AgentName) -> Result<Option<Arc<CompiledAgent>>> {
        Ok(self.lock()?.get(name).cloned())
    }

    /// Cache `agent`, returning the entry that ends up in the map.  An entry
    /// already present wins so every caller shares one instance.
    pub fn insert(&self, agent: CompiledAgent) -> Result<Arc<CompiledAgent>> {
        let mut entries = self.lock()?;
        Ok(entries
            .entry(agent.name.clone())
            .or_insert_with(|| Arc::new(agent))
            .clone())
    }

    pub fn invalidate(&self, name: &AgentName) -> Result<()> {
        self.lock()?.remove(name);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

/// Create both record tables of `agent` and its registry row.  A table left
/// behind under either name is an error, never reused.
pub(crate) fn create(conn: &Connection, agent: &CompiledAgent) -> Result<()> {
    for side in [Side::Input, Side::Output] {
        let columns: Vec<String> = agent
            .compiled(side)
            .columns
            .iter()
            .map(|c| c.definition())
            .collect();
        let mut definition = format!("{} TEXT NOT NULL PRIMARY KEY", quote_ident(ID_COLUMN));
        for column in &columns {
            definition.push_str(", ");
            definition.push_str(column);
        }
        conn.execute_batch(&format!(
            "CREATE TABLE {} ({definition});",
            quote_ident(agent.table(side))
        ))
        .map_err(storage)?;
    }
    conn.execute(
        "INSERT INTO mnemos_agents
            (name, input_schema, output_schema, input_table, output_table, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            agent.name.as_str(),
            serde_json::to_string(&agent.input.schema)?,
            serde_json::to_string(&agent.output.schema)?,
            agent.input_table,
            agent.output_table,
            agent.created_at.to_rfc3339(),
        ],
    )
    .map_err(storage)?;
    Ok(())
}

/// Load and compile the registry row of `name`.
pub(crate) fn load(conn: &Connection, name: &AgentName) -> Result<Option<CompiledAgent>> {
    let row = conn
        .query_row(
            "SELECT input_schema, output_schema, input_table, output_table, created_at
             FROM mnemos_agents WHERE name = ?1",
            params![name.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()
        .map_err(storage)?;
    let Some((input, output, input_table, output_table, created_at)) = row else {
        return Ok(None);
    };
    let input: RecordSchema = serde_json::from_str(&input)?;
    let output: RecordSchema = serde_json::from_str(&output)?;
    Ok(Some(CompiledAgent {
        name: name.clone(),
        input: compile(&input)?,
        output: compile(&output)?,
        input_table,
        output_table,
        created_at: parse_timestamp(&created_at)?,
    }))
}

/// A registered agent whose name equals `name` ignoring ASCII case but is
/// spelled differently.  SQLite table names are case-insensitive, so such an
/// agent would share `name`'s tables.
pub(crate) fn conflicting(conn: &Connection, name: &AgentName) -> Result<Option<String>> {
    conn.query_row(
        "SELECT name FROM mnemos_agents
         WHERE name = ?1 COLLATE NOCASE AND name <> ?1
         LIMIT 1",
        params![name.as_str()],
        |row| row.get(0),
    )
    .optional()
    .map_err(storage)
}

/// Every registered agent, ordered by name.
pub(crate) fn list(conn: &Connection) -> Result<Vec<AgentInfo>> {
    let mut stmt = conn
        .prepare(
            "SELECT name, input_schema, output_schema, created_at
             FROM mnemos_agents ORDER BY name ASC",
        )
        .map_err(storage)?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(storage)?;

    let mut agents = Vec::new();
    for row in rows {
        let (name, input, output, created_at) = row.map_err(storage)?;
        agents.push(AgentInfo {
            name: AgentName::parse(name)?,
            input: serde_json::from_str(&input)?,
            output: serde_json::from_str(&output)?,
            created_at: parse_timestamp(&created_at)?,
        });
    }
    Ok(agents)
}

/// Drop both record tables and the registry row.  Returns `false` when the
/// agent was not registered.
pub(crate) fn drop_agent(conn: &Connection, name: &AgentName) -> Result<bool> {
    let tables: Option<(String, String)> = conn
        .query_row(
            "SELECT input_table, output_table FROM mnemos_agents WHERE name = ?1",
            params![name.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(storage)?;
    let Some((input_table, output_table)) = tables else {
        return Ok(false);
    };
    for table in [input_table, output_table] {
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(&table)))
            .map_err(storage)?;
    }
    conn.execute("DELETE FROM mnemos_agents WHERE name = ?1", params![name.as_str()])
        .map_err(storage)?;
    Ok(true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| MnemosError::Serialization(format!("bad created_at '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use mnemos_types::FieldDescriptor;

    fn agent(name: &str) -> CompiledAgent {
        CompiledAgent::new(
            AgentName::parse(name).unwrap(),
            &RecordSchema::new().field("question", FieldDescriptor::string()),
            &RecordSchema::new()
                .field("answer", FieldDescriptor::string())
                .field("tags", FieldDescriptor::array(FieldDescriptor::string())),
        )
        .unwrap()
    }

    #[test]
    fn create_then_load_roundtrips() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock().unwrap();
        let original = agent("qa");
        create(&conn, &original).unwrap();

        let loaded = load(&conn, &original.name).unwrap().unwrap();
        assert_eq!(loaded.input, original.input);
        assert_eq!(loaded.output_table, "qa_output");
        assert_eq!(loaded.created_at.timestamp(), original.created_at.timestamp());
    }

    #[test]
    fn tables_have_one_column_per_field() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock().unwrap();
        create(&conn, &agent("qa")).unwrap();
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info('qa_output')").unwrap();
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(names, vec!["id", "answer", "tags_json"]);
    }

    #[test]
    fn list_and_drop() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock().unwrap();
        create(&conn, &agent("b_agent")).unwrap();
        create(&conn, &agent("a_agent")).unwrap();
        let names: Vec<String> = list(&conn).unwrap().into_iter().map(|a| a.name.as_str().to_string()).collect();
        assert_eq!(names, vec!["a_agent", "b_agent"]);

        assert!(drop_agent(&conn, &AgentName::parse("a_agent").unwrap()).unwrap());
        assert!(!drop_agent(&conn, &AgentName::parse("a_agent").unwrap()).unwrap());
        assert_eq!(list(&conn).unwrap().len(), 1);
    }

    #[test]
    fn conflicting_matches_other_spellings_only() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock().unwrap();
        create(&conn, &agent("qa")).unwrap();
        assert_eq!(conflicting(&conn, &AgentName::parse("QA").unwrap()).unwrap().as_deref(), Some("qa"));
        assert_eq!(conflicting(&conn, &AgentName::parse("qa").unwrap()).unwrap(), None);
        assert_eq!(conflicting(&conn, &AgentName::parse("qb").unwrap()).unwrap(), None);
    }

    #[test]
    fn create_refuses_leftover_tables() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock().unwrap();
        conn.execute_batch("CREATE TABLE stale_input (id TEXT PRIMARY KEY);").unwrap();
        let err = create(&conn, &agent("stale")).unwrap_err();
        assert!(matches!(err, MnemosError::Storage(_)));
    }

    #[test]
    fn cache_shares_first_instance_and_invalidates() {
        let registry = Registry::new();
        let first = registry.insert(agent("qa")).unwrap();
        let second = registry.insert(agent("qa")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        registry.invalidate(&first.name).unwrap();
        assert!(registry.get(&first.name).unwrap().is_none());
        assert!(registry.is_empty());
    }
}
