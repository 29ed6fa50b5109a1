use crate::{str_arg, tool_error};
use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use warroom_core::{ToolCall, ToolResult, WarroomError, WarroomResult};
use warroom_security::Capability;
use warroom_skills::{Skill, SkillDescriptor};

const SAMPLE_ROWS: usize = 5;

/// A tabular query store reachable by table name.
///
/// Both operations are infallible at the type level: failures come back as
/// JSON so the calling agent can read them and correct its query.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Schema and a small sample of `table`, or `{"error": ...}`.
    async fn explore_schema(&self, table: &str) -> serde_json::Value;

    /// Rows of `sql` as JSON objects, or a single `{"error": ...}` row.
    async fn run_query(&self, sql: &str) -> Vec<serde_json::Value>;
}

/// [`TabularStore`] backed by SQLite.
///
/// Tables live in a database attached under the dataset name, so queries
/// address them as `dataset.TABLE`.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    dataset: String,
}

impl SqliteStore {
    /// Open a store whose dataset is persisted at `path`.
    pub fn open(path: &Path, dataset: &str) -> WarroomResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::attach(&path.to_string_lossy(), dataset)
    }

    /// A store whose dataset lives in memory.
    pub fn in_memory(dataset: &str) -> WarroomResult<Self> {
        Self::attach(":memory:", dataset)
    }

    fn attach(location: &str, dataset: &str) -> WarroomResult<Self> {
        if !is_identifier(dataset) {
            return Err(WarroomError::Config(format!(
                "invalid dataset name '{dataset}'"
            )));
        }
        let conn = Connection::open_in_memory().map_err(db_error)?;
        conn.execute(&format!("ATTACH DATABASE ?1 AS {dataset}"), [location])
            .map_err(db_error)?;
        info!(dataset = %dataset, location = %location, "Tabular store attached");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dataset: dataset.to_string(),
        })
    }

    /// The dataset name tables are qualified with.
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Drop and recreate the demo tables: a vendor catalog mapping SKUs to
    /// internal reference ids, and a legacy inventory table with cryptic
    /// columns and stock parked in quarantine/hold bins.
    pub fn seed_demo(&self) -> WarroomResult<()> {
        let ds = &self.dataset;
        let script = format!(
            "DROP TABLE IF EXISTS {ds}.REF_CATALOG_DUMP;
             DROP TABLE IF EXISTS {ds}.LEGACY_INV_MAIN_V2;
             CREATE TABLE {ds}.REF_CATALOG_DUMP (
                 VENDOR_SKU TEXT NOT NULL,
                 ITEM_REF_ID TEXT NOT NULL,
                 ITEM_DESC TEXT,
                 VENDOR_NM TEXT
             );
             INSERT INTO {ds}.REF_CATALOG_DUMP VALUES
                 ('NV-H100-PCIE', 'REF_GPU_H100_PCIE_80G', 'NVIDIA H100 PCIe 80GB', 'NVIDIA CORP'),
                 ('NV-H100-SXM5', 'REF_GPU_H100_SXM5_80G', 'NVIDIA H100 SXM5 80GB', 'NVIDIA CORP'),
                 ('NV-A100-PCIE', 'REF_GPU_A100_PCIE_40G', 'NVIDIA A100 PCIe 40GB', 'NVIDIA CORP'),
                 ('NV-L40S', 'REF_GPU_L40S_48G', 'NVIDIA L40S 48GB', 'NVIDIA CORP');
             CREATE TABLE {ds}.LEGACY_INV_MAIN_V2 (
                 LOC_ID TEXT NOT NULL,
                 BIN_CD TEXT NOT NULL,
                 ITEM_REF_ID TEXT NOT NULL,
                 QTY_OH INTEGER NOT NULL,
                 STAT_CD INTEGER NOT NULL,
                 HOLD_RSN TEXT,
                 LST_UPD_DT TEXT
             );
             INSERT INTO {ds}.LEGACY_INV_MAIN_V2 VALUES
                 ('WH-SJC-01', 'A-12-03', 'REF_GPU_H100_PCIE_80G', 0, 0, NULL, '2024-11-02'),
                 ('WH-SJC-01', 'QUARANTINE', 'REF_GPU_H100_PCIE_80G', 800, 9, 'HOLD_LEGAL', '2024-09-17'),
                 ('WH-AUS-02', 'HOLD', 'REF_GPU_H100_PCIE_80G', 150, 9, 'HOLD_LEGAL', '2024-10-05'),
                 ('WH-AUS-02', 'B-04-11', 'REF_GPU_A100_PCIE_40G', 40, 0, NULL, '2024-10-28'),
                 ('WH-SJC-01', 'C-01-07', 'REF_GPU_L40S_48G', 12, 1, 'VIP_RESERVE', '2024-11-01'),
                 ('WH-RNO-03', 'A-02-01', 'REF_GPU_H100_SXM5_80G', 0, 0, NULL, '2024-08-30');"
        );
        let conn = self.conn.lock();
        conn.execute_batch(&script).map_err(db_error)?;
        info!(dataset = %ds, "Demo tables seeded");
        Ok(())
    }

    /// Blocking query on an already locked connection.
    fn query_rows(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<serde_json::Value>> {
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut object = serde_json::Map::new();
            for (i, column) in columns.iter().enumerate() {
                object.insert(column.clone(), to_json(row.get_ref(i)?));
            }
            out.push(serde_json::Value::Object(object));
        }
        Ok(out)
    }

    fn explore_blocking(
        conn: &Connection,
        dataset: &str,
        table: &str,
    ) -> Result<serde_json::Value, String> {
        let cleaned = table.replace(';', "").replace("--", "");
        let cleaned = cleaned.trim().trim_matches('`');
        let full_id = if cleaned.contains('.') {
            cleaned.to_string()
        } else {
            format!("{dataset}.{cleaned}")
        };

        let (schema, name) = full_id
            .rsplit_once('.')
            .ok_or_else(|| format!("Malformed table name '{full_id}'"))?;
        // Tolerate project-qualified ids by keeping the last two parts.
        let schema = schema.rsplit('.').next().unwrap_or(schema);
        if !is_identifier(schema) || !is_identifier(name) {
            return Err(format!("Malformed table name '{full_id}'"));
        }
        let full_id = format!("{schema}.{name}");

        let fields = Self::query_rows(conn, &format!("PRAGMA {schema}.table_info({name})"))
            .map_err(|e| e.to_string())?;
        if fields.is_empty() {
            return Err(format!("Table {full_id} not found"));
        }
        let schema_fields: Vec<String> = fields
            .iter()
            .map(|f| {
                format!(
                    "{} ({})",
                    f["name"].as_str().unwrap_or_default(),
                    f["type"].as_str().unwrap_or_default()
                )
            })
            .collect();

        let sample_rows = Self::query_rows(
            conn,
            &format!("SELECT * FROM {full_id} LIMIT {SAMPLE_ROWS}"),
        )
        .map_err(|e| e.to_string())?;

        Ok(serde_json::json!({
            "table_name": cleaned,
            "fully_qualified_id": full_id,
            "schema_fields": schema_fields,
            "sample_rows": sample_rows,
            "note": format!("IMPORTANT: When writing SQL, use this table name: `{full_id}`"),
        }))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Value::from(f),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::String(format!("<blob {} bytes>", b.len())),
    }
}

fn db_error(e: rusqlite::Error) -> WarroomError {
    WarroomError::Database(e.to_string())
}

#[async_trait]
impl TabularStore for SqliteStore {
    async fn explore_schema(&self, table: &str) -> serde_json::Value {
        info!(table = %table, "Exploring schema");
        let conn = self.conn.clone();
        let dataset = self.dataset.clone();
        let table = table.to_string();
        let joined = tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            Self::explore_blocking(&conn, &dataset, &table)
        })
        .await;

        match joined {
            Ok(Ok(schema)) => schema,
            Ok(Err(e)) => {
                error!(error = %e, "Schema exploration failed");
                serde_json::json!({
                    "error": format!("Exception while loading the database schema: {e}")
                })
            }
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        }
    }

    async fn run_query(&self, sql: &str) -> Vec<serde_json::Value> {
        info!(sql = %sql, "Executing SQL");
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let joined = tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            Self::query_rows(&conn, &sql)
        })
        .await;

        match joined {
            Ok(Ok(rows)) => {
                info!(rows = rows.len(), "Query succeeded");
                rows
            }
            Ok(Err(e)) => {
                error!(error = %e, "Query failed");
                vec![serde_json::json!({ "error": e.to_string() })]
            }
            Err(e) => vec![serde_json::json!({ "error": e.to_string() })],
        }
    }
}

/// `explore_schema`: columns and sample rows of one table.
pub struct ExploreSchemaSkill {
    descriptor: SkillDescriptor,
    store: Arc<dyn TabularStore>,
}

impl ExploreSchemaSkill {
    /// Skill over `store`.
    pub fn new(store: Arc<dyn TabularStore>) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: "explore_schema".to_string(),
                description: "Return the schema and a sample of 5 rows of a table.".to_string(),
                parameters_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "table_name": {"type": "string", "description": "Table name, optionally dataset-qualified"}
                    },
                    "required": ["table_name"]
                }),
                required_capabilities: vec![Capability::DatabaseQuery],
            },
            store,
        }
    }
}

#[async_trait]
impl Skill for ExploreSchemaSkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> WarroomResult<ToolResult> {
        let Some(table) = str_arg(&call, "table_name") else {
            return Ok(tool_error(&call, "Missing 'table_name'"));
        };
        let schema = self.store.explore_schema(table).await;
        let content = serde_json::to_string(&schema)?;
        if schema.get("error").is_some() {
            Ok(ToolResult::error(&call.id, content))
        } else {
            Ok(ToolResult::success(&call.id, content))
        }
    }
}

/// `run_query`: execute one SQL statement.
pub struct RunQuerySkill {
    descriptor: SkillDescriptor,
    store: Arc<dyn TabularStore>,
}

impl RunQuerySkill {
    /// Skill over `store`.
    pub fn new(store: Arc<dyn TabularStore>) -> Self {
        Self {
            descriptor: SkillDescriptor {
                name: "run_query".to_string(),
                description: "Execute a standard SQL query and return the rows.".to_string(),
                parameters_schema: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "sql_query": {"type": "string"}
                    },
                    "required": ["sql_query"]
                }),
                required_capabilities: vec![Capability::DatabaseQuery],
            },
            store,
        }
    }
}

#[async_trait]
impl Skill for RunQuerySkill {
    fn descriptor(&self) -> &SkillDescriptor {
        &self.descriptor
    }

    async fn execute(&self, call: ToolCall) -> WarroomResult<ToolResult> {
        let Some(sql) = str_arg(&call, "sql_query") else {
            return Ok(tool_error(&call, "Missing 'sql_query'"));
        };
        let rows = self.store.run_query(sql).await;
        let failed = matches!(rows.as_slice(), [only] if only.get("error").is_some());
        let content = serde_json::to_string(&rows)?;
        if failed {
            Ok(ToolResult::error(&call.id, content))
        } else {
            Ok(ToolResult::success(&call.id, content))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn seeded() -> SqliteStore {
        let store = SqliteStore::in_memory("gpu_procurement_db").unwrap();
        store.seed_demo().unwrap();
        store
    }

    #[test]
    fn test_invalid_dataset_rejected() {
        assert!(matches!(
            SqliteStore::in_memory("bad name; DROP").err().unwrap(),
            WarroomError::Config(_)
        ));
    }

    #[tokio::test]
    async fn test_explore_qualifies_bare_names() {
        let store = seeded();
        let schema = store.explore_schema("LEGACY_INV_MAIN_V2").await;
        assert_eq!(schema["table_name"], "LEGACY_INV_MAIN_V2");
        assert_eq!(
            schema["fully_qualified_id"],
            "gpu_procurement_db.LEGACY_INV_MAIN_V2"
        );
        let fields = schema["schema_fields"].as_array().unwrap();
        assert!(fields.iter().any(|f| f == "QTY_OH (INTEGER)"));
        assert_eq!(schema["sample_rows"].as_array().unwrap().len(), 5);
        assert!(schema["note"].as_str().unwrap().contains("IMPORTANT"));
    }

    #[tokio::test]
    async fn test_explore_strips_injection_tokens() {
        let store = seeded();
        let schema = store.explore_schema("REF_CATALOG_DUMP; -- drop").await;
        assert!(schema.get("error").is_some());

        let schema = store.explore_schema("REF_CATALOG_DUMP;--").await;
        assert_eq!(schema["fully_qualified_id"], "gpu_procurement_db.REF_CATALOG_DUMP");
    }

    #[tokio::test]
    async fn test_explore_unknown_table() {
        let store = seeded();
        let schema = store.explore_schema("NOPE").await;
        assert!(schema["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_run_query_rows_and_errors() {
        let store = seeded();
        let rows = store
            .run_query(
                "SELECT SUM(QTY_OH) AS HELD FROM gpu_procurement_db.LEGACY_INV_MAIN_V2 \
                 WHERE HOLD_RSN = 'HOLD_LEGAL'",
            )
            .await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["HELD"], 950);

        let rows = store.run_query("SELECT * FROM missing_table").await;
        assert_eq!(rows.len(), 1);
        assert!(rows[0]["error"].as_str().unwrap().contains("no such table"));
    }

    #[tokio::test]
    async fn test_seed_is_repeatable() {
        let store = seeded();
        store.seed_demo().unwrap();
        let rows = store
            .run_query("SELECT COUNT(*) AS N FROM gpu_procurement_db.REF_CATALOG_DUMP")
            .await;
        assert_eq!(rows[0]["N"], 4);
    }
}
