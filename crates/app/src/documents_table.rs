//! SQL layer for the Dolt-side `documents` and `sync_log` tables.
//!
//! Values are embedded in SQL text: strings double single quotes, JSON
//! payloads additionally double backslashes (the SQL parser consumes one
//! escaping level before the JSON parser sees the remainder).

use embranch_domain::{
    CollectionName, Document, DocumentId, DocumentRef, escape_sql_json, escape_sql_string,
};
use embranch_ports::{DoltPort, DoltRow};
use embranch_shared::{RequestContext, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Name of the documents table.
pub const DOCUMENTS_TABLE: &str = "documents";
/// Name of the sync audit table.
pub const SYNC_LOG_TABLE: &str = "sync_log";

/// Tables owned by embranch; everything else is user data.
pub const SCHEMA_TABLES: &[&str] = &[DOCUMENTS_TABLE, SYNC_LOG_TABLE];

/// SQL creating the documents table.
pub const CREATE_DOCUMENTS_SQL: &str = "CREATE TABLE IF NOT EXISTS documents (\
     id VARCHAR(255) NOT NULL, \
     collection VARCHAR(255) NOT NULL, \
     content LONGTEXT NOT NULL, \
     metadata_json LONGTEXT, \
     updated_at DATETIME, \
     PRIMARY KEY (collection, id))";

/// SQL creating the sync audit table.
pub const CREATE_SYNC_LOG_SQL: &str = "CREATE TABLE IF NOT EXISTS sync_log (\
     id BIGINT NOT NULL AUTO_INCREMENT, \
     collection VARCHAR(255) NOT NULL, \
     op VARCHAR(32) NOT NULL, \
     at DATETIME, \
     PRIMARY KEY (id))";

/// List the user tables present in the repository.
pub async fn list_tables(ctx: &RequestContext, dolt: &Arc<dyn DoltPort>) -> Result<Vec<String>> {
    let rows = dolt.query(ctx, "SHOW TABLES".to_owned()).await?;
    Ok(rows
        .iter()
        .flat_map(DoltRow::values)
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect())
}

/// True when the documents table exists.
pub async fn schema_exists(ctx: &RequestContext, dolt: &Arc<dyn DoltPort>) -> Result<bool> {
    let tables = list_tables(ctx, dolt).await?;
    Ok(tables.iter().any(|table| table == DOCUMENTS_TABLE))
}

/// Create the embranch tables when absent.
pub async fn ensure_schema(ctx: &RequestContext, dolt: &Arc<dyn DoltPort>) -> Result<()> {
    dolt.execute(ctx, CREATE_DOCUMENTS_SQL.to_owned()).await?;
    dolt.execute(ctx, CREATE_SYNC_LOG_SQL.to_owned()).await?;
    Ok(())
}

/// Read every row of the documents table.
pub async fn read_all_documents(
    ctx: &RequestContext,
    dolt: &Arc<dyn DoltPort>,
) -> Result<Vec<Document>> {
    let rows = dolt
        .query(
            ctx,
            "SELECT id, collection, content, metadata_json FROM documents".to_owned(),
        )
        .await?;
    Ok(rows.iter().filter_map(document_from_row).collect())
}

/// Collections with at least one sync_log entry (evidence both stores were
/// reconciled for that collection before).
pub async fn synced_collections(
    ctx: &RequestContext,
    dolt: &Arc<dyn DoltPort>,
) -> Result<BTreeSet<String>> {
    let rows = dolt
        .query(ctx, "SELECT DISTINCT collection FROM sync_log".to_owned())
        .await?;
    Ok(rows
        .iter()
        .filter_map(|row| row.get("collection").and_then(Value::as_str))
        .map(str::to_owned)
        .collect())
}

/// Upsert statement for one document.
#[must_use]
pub fn upsert_document_sql(document: &Document) -> String {
    let metadata = document.metadata.as_ref().map_or_else(
        || "NULL".to_owned(),
        |value| {
            format!(
                "'{}'",
                escape_sql_json(&embranch_domain::canonicalize_json(value))
            )
        },
    );
    format!(
        "INSERT INTO documents (id, collection, content, metadata_json, updated_at) \
         VALUES ('{id}', '{collection}', '{content}', {metadata}, NOW()) \
         ON DUPLICATE KEY UPDATE content = VALUES(content), \
         metadata_json = VALUES(metadata_json), updated_at = VALUES(updated_at)",
        id = escape_sql_string(document.id.as_str()),
        collection = escape_sql_string(document.collection.as_str()),
        content = escape_sql_string(&document.content),
    )
}

/// Delete statement for one document identity.
#[must_use]
pub fn delete_document_sql(reference: &DocumentRef) -> String {
    format!(
        "DELETE FROM documents WHERE collection = '{collection}' AND id = '{id}'",
        collection = escape_sql_string(reference.collection.as_str()),
        id = escape_sql_string(reference.id.as_str()),
    )
}

/// Audit entry statement.
#[must_use]
pub fn sync_log_sql(collection: &CollectionName, op: &str) -> String {
    format!(
        "INSERT INTO sync_log (collection, op, at) VALUES ('{collection}', '{op}', NOW())",
        collection = escape_sql_string(collection.as_str()),
        op = escape_sql_string(op),
    )
}

fn document_from_row(row: &DoltRow) -> Option<Document> {
    let id = DocumentId::parse(row.get("id")?.as_str()?).ok()?;
    let collection = CollectionName::parse(row.get("collection")?.as_str()?).ok()?;
    let content = row
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let metadata = match row.get("metadata_json") {
        Some(Value::String(text)) if !text.trim().is_empty() => {
            serde_json::from_str(text).ok()
        },
        _ => None,
    };
    Some(Document {
        id,
        collection,
        content,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(collection: &str, id: &str, content: &str, metadata: Option<Value>) -> Document {
        Document {
            id: DocumentId::parse(id).expect("id"),
            collection: CollectionName::parse(collection).expect("collection"),
            content: content.to_owned(),
            metadata,
        }
    }

    #[test]
    fn upsert_escapes_quotes_in_strings() {
        let sql = upsert_document_sql(&doc("notes", "d1", "it's fine", None));
        assert!(sql.contains("'it''s fine'"));
        assert!(sql.contains("NULL"));
        assert!(sql.contains("ON DUPLICATE KEY UPDATE"));
    }

    #[test]
    fn upsert_escapes_backslashes_in_json() {
        let sql = upsert_document_sql(&doc(
            "notes",
            "d1",
            "body",
            Some(json!({"path": "c:\\dir"})),
        ));
        // One JSON backslash becomes two in the SQL literal.
        assert!(sql.contains(r#"{"path":"c:\\\\dir"}"#), "sql was: {sql}");
    }

    #[test]
    fn upsert_canonicalizes_metadata_keys() {
        let sql = upsert_document_sql(&doc(
            "notes",
            "d1",
            "body",
            Some(json!({"z": 1, "a": 2})),
        ));
        assert!(sql.contains(r#"{"a":2,"z":1}"#));
    }

    #[test]
    fn delete_targets_identity() {
        let sql = delete_document_sql(&doc("notes", "d1", "", None).as_ref_key());
        assert_eq!(
            sql,
            "DELETE FROM documents WHERE collection = 'notes' AND id = 'd1'"
        );
    }

    #[test]
    fn row_parsing_reads_metadata_json() {
        let mut row = DoltRow::new();
        row.insert("id".to_owned(), json!("d1"));
        row.insert("collection".to_owned(), json!("notes"));
        row.insert("content".to_owned(), json!("body"));
        row.insert("metadata_json".to_owned(), json!(r#"{"k":1}"#));

        let document = document_from_row(&row).expect("parse");
        assert_eq!(document.metadata, Some(json!({"k": 1})));

        row.insert("metadata_json".to_owned(), Value::Null);
        let document = document_from_row(&row).expect("parse");
        assert_eq!(document.metadata, None);
    }
}
