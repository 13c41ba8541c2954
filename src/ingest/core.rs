use crate::db::Db;
use crate::db::models::{Chunk, NewDocument};
use crate::embedder::Embedder;
use crate::error::{AppError, Result};
use crate::ingest::pdf;
use crate::ingest::splitter::RecursiveSplitter;
use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::{info, warn};

/// Counts from a completed ingestion.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub files: usize,
    pub failed: usize,
    pub pages: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The documents directory did not exist and has been created.
    NoDocumentsDir,
    /// The documents directory holds no PDF files.
    NoPdfs,
    Ingested(IngestReport),
}

/// Result of scanning and embedding, before anything is written.
#[derive(Debug)]
pub enum Preparation {
    DocumentsDirCreated,
    NoPdfs,
    Ready(PreparedIndex),
}

/// One text chunk, cut from a single page.
#[derive(Debug, Clone)]
struct PreparedChunk {
    page: u32,
    content: String,
}

#[derive(Debug, Clone)]
struct PreparedDocument {
    filename: String,
    modified_at: DateTime<Utc>,
    page_count: usize,
    chunks: Vec<PreparedChunk>,
    embeddings: Vec<Vec<f32>>,
}

/// Loaded, chunked and embedded documents waiting to be swapped in.
#[derive(Debug, Default)]
pub struct PreparedIndex {
    documents: Vec<PreparedDocument>,
    pub report: IngestReport,
}

impl PreparedIndex {
    /// Replace the whole index with these documents in one transaction.
    pub fn write_to(&self, db: &mut Db) -> Result<()> {
        let chunk_rows: Vec<Vec<Chunk<'_>>> = self
            .documents
            .iter()
            .map(|doc| {
                doc.chunks
                    .iter()
                    .enumerate()
                    .map(|(position, c)| Chunk {
                        position,
                        page: Some(c.page),
                        content: c.content.as_str(),
                    })
                    .collect()
            })
            .collect();

        let new_docs: Vec<NewDocument<'_>> = self
            .documents
            .iter()
            .zip(&chunk_rows)
            .map(|(doc, chunks)| NewDocument {
                filename: &doc.filename,
                modified_at: doc.modified_at,
                page_count: doc.page_count,
                chunks,
                embeddings: &doc.embeddings,
            })
            .collect();

        db.replace_all(&new_docs)?;
        Ok(())
    }
}

/// Rebuilds the vector index from the PDFs under a documents directory.
#[derive(Clone)]
pub struct Ingestor {
    documents_dir: PathBuf,
    splitter: RecursiveSplitter,
    embedder: Arc<dyn Embedder>,
}

impl Ingestor {
    pub fn new(
        documents_dir: impl Into<PathBuf>,
        splitter: RecursiveSplitter,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            documents_dir: documents_dir.into(),
            splitter,
            embedder,
        }
    }

    /// PDF files under the documents directory, sorted by path.
    pub fn find_pdfs(&self) -> Vec<PathBuf> {
        let walker = WalkBuilder::new(&self.documents_dir)
            .standard_filters(false)
            .build();

        let mut files: Vec<PathBuf> = walker
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && is_pdf(p))
            .collect();
        files.sort();
        files
    }

    /// Load, split and embed every PDF without touching the index.
    ///
    /// CPU-bound; call from a blocking context.
    pub fn prepare(&self) -> Result<Preparation> {
        if !self.documents_dir.exists() {
            std::fs::create_dir_all(&self.documents_dir)?;
            info!(
                "No documents folder found. Created one at {}",
                self.documents_dir.display()
            );
            return Ok(Preparation::DocumentsDirCreated);
        }

        let pdfs = self.find_pdfs();
        if pdfs.is_empty() {
            info!("No PDF files found in {}", self.documents_dir.display());
            return Ok(Preparation::NoPdfs);
        }

        info!("Found {} PDF files", pdfs.len());

        let mut index = PreparedIndex::default();
        for path in &pdfs {
            match self.prepare_file(path) {
                Ok(doc) => {
                    index.report.files += 1;
                    index.report.pages += doc.page_count;
                    index.report.chunks += doc.chunks.len();
                    info!(
                        "  - {} ({} pages, {} chunks)",
                        doc.filename,
                        doc.page_count,
                        doc.chunks.len()
                    );
                    index.documents.push(doc);
                }
                Err(AppError::Pdf(e)) => {
                    warn!("Skipping unreadable PDF: {e}");
                    index.report.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if index.documents.is_empty() {
            return Err(AppError::Ingest(format!(
                "none of the {} PDF files could be read",
                pdfs.len()
            )));
        }

        Ok(Preparation::Ready(index))
    }

    fn prepare_file(&self, path: &Path) -> Result<PreparedDocument> {
        let pdf = pdf::load_pdf(path)?;

        let chunks: Vec<PreparedChunk> = pdf
            .pages
            .iter()
            .flat_map(|page| {
                self.splitter
                    .split_text(&page.text)
                    .into_iter()
                    .map(|content| PreparedChunk {
                        page: page.page_number,
                        content,
                    })
            })
            .collect();

        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;

        let modified_at: DateTime<Utc> = std::fs::metadata(path)?.modified()?.into();

        Ok(PreparedDocument {
            filename: self.relative_name(path),
            modified_at,
            page_count: pdf.page_count,
            chunks,
            embeddings,
        })
    }

    /// Path relative to the documents directory, with forward slashes.
    fn relative_name(&self, path: &Path) -> String {
        path.strip_prefix(&self.documents_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Rebuild the index behind `db`.
    ///
    /// Loading and embedding run on the blocking pool; the database lock is
    /// held only while the prepared index is written.
    pub async fn run(&self, db: &TokioMutex<Db>) -> Result<IngestOutcome> {
        let ingestor = self.clone();
        let prepared = tokio::task::spawn_blocking(move || ingestor.prepare()).await??;

        let index = match prepared {
            Preparation::DocumentsDirCreated => return Ok(IngestOutcome::NoDocumentsDir),
            Preparation::NoPdfs => return Ok(IngestOutcome::NoPdfs),
            Preparation::Ready(index) => index,
        };

        {
            let mut db_guard = db.lock().await;
            index.write_to(&mut db_guard)?;
        }

        let report = index.report;
        info!(
            "Ingested {} chunks from {} pages in {} PDFs ({} failed)",
            report.chunks, report.pages, report.files, report.failed
        );
        Ok(IngestOutcome::Ingested(report))
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
