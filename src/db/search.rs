use super::{Db, serialize_vector};
use rusqlite::{Result, params};

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document_name: String,
    pub chunk_content: String,
    pub similarity: f64,
    pub position: usize,
    pub page: Option<u32>,
    pub chunk_id: i64,
}

fn map_search_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchResult> {
    let distance: f64 = row.get(5)?;
    let similarity = 1.0 - (distance / 2.0);

    Ok(SearchResult {
        document_name: row.get(0)?,
        chunk_content: row.get(1)?,
        position: row.get::<_, i64>(2)? as usize,
        page: row.get(3)?,
        chunk_id: row.get(4)?,
        similarity,
    })
}

impl Db {
    /// Perform vector similarity search using cosine distance
    pub fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                d.filename,
                c.content,
                c.position,
                c.page,
                c.id as chunk_id,
                vec_distance_cosine(v.embedding, ?) as distance
            FROM vec_chunks v
            JOIN chunks c ON v.rowid = c.id
            JOIN documents d ON c.document_id = d.id
            ORDER BY distance ASC
            LIMIT ?
            "#,
        )?;

        let rows = stmt.query_map(
            params![serialize_vector(query_vector), top_k as i64],
            map_search_row,
        )?;

        rows.collect()
    }
}
