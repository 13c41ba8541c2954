use super::{Db, models::*, serialize_vector};
use rusqlite::{OptionalExtension, Result, Transaction, params};

/// Writes one document row plus its chunks and vectors inside `tx`.
fn write_document(tx: &Transaction<'_>, doc: &NewDocument<'_>) -> Result<()> {
    // One vector per chunk
    if doc.chunks.len() != doc.embeddings.len() {
        return Err(rusqlite::Error::InvalidParameterCount(
            doc.embeddings.len(),
            doc.chunks.len(),
        ));
    }

    // Insert or update document and get the stable ID
    let doc_id: i64 = tx.query_row(
        r#"
        INSERT INTO documents (filename, page_count, modified_at, indexed_at)
        VALUES (?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(filename) DO UPDATE SET
            page_count = excluded.page_count,
            modified_at = excluded.modified_at,
            indexed_at = CURRENT_TIMESTAMP
        RETURNING id
        "#,
        params![doc.filename, doc.page_count as i64, doc.modified_at],
        |row| row.get(0),
    )?;

    // Clean up old contents if any (re-indexing)
    tx.execute(
        "DELETE FROM vec_chunks WHERE rowid IN (SELECT id FROM chunks WHERE document_id = ?)",
        params![doc_id],
    )?;
    tx.execute("DELETE FROM chunks WHERE document_id = ?", params![doc_id])?;

    for (chunk, embedding) in doc.chunks.iter().zip(doc.embeddings) {
        tx.execute(
            "INSERT INTO chunks (document_id, position, page, content) VALUES (?, ?, ?, ?)",
            params![doc_id, chunk.position as i64, chunk.page, chunk.content],
        )?;
        let chunk_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO vec_chunks (rowid, embedding) VALUES (?, ?)",
            params![chunk_id, serialize_vector(embedding)],
        )?;
    }

    Ok(())
}

impl Db {
    /// Lists indexed documents with their chunk counts, ordered by filename.
    pub fn list_documents(&self) -> Result<Vec<DocumentInfo>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT d.filename, d.page_count, d.modified_at, COUNT(c.id)
            FROM documents d
            LEFT JOIN chunks c ON c.document_id = d.id
            GROUP BY d.id
            ORDER BY d.filename
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DocumentInfo {
                filename: row.get(0)?,
                page_count: row.get::<_, i64>(1)? as usize,
                modified_at: row.get(2)?,
                chunk_count: row.get::<_, i64>(3)? as usize,
            })
        })?;

        rows.collect()
    }

    /// Total number of chunks in the index.
    pub fn chunk_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Deletes a document and its associated chunks from the database
    pub fn delete_document(&self, filename: &str) -> Result<bool> {
        let doc_id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM documents WHERE filename = ?",
                params![filename],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(doc_id) = doc_id {
            // Virtual table cascade deletion workaround
            self.conn.execute(
                "DELETE FROM vec_chunks WHERE rowid IN (SELECT id FROM chunks WHERE document_id = ?)",
                params![doc_id],
            )?;

            let rows = self
                .conn
                .execute("DELETE FROM documents WHERE id = ?", params![doc_id])?;
            Ok(rows > 0)
        } else {
            Ok(false)
        }
    }

    /// Inserts or updates a single document with its chunks and embeddings
    pub fn insert_document(&mut self, doc: &NewDocument<'_>) -> Result<()> {
        let tx = self.conn.transaction()?;
        write_document(&tx, doc)?;
        tx.commit()
    }

    /// Replaces the whole index with `docs` in one transaction.
    ///
    /// Readers on other connections see either the previous index or the
    /// new one; an error rolls everything back.
    pub fn replace_all(&mut self, docs: &[NewDocument<'_>]) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute("DELETE FROM vec_chunks", [])?;
        tx.execute("DELETE FROM chunks", [])?;
        tx.execute("DELETE FROM documents", [])?;

        for doc in docs {
            write_document(&tx, doc)?;
        }

        tx.commit()
    }
}
