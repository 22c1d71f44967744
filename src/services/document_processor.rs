//! Document ingestion: find, extract, chunk, embed, store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use ignore::WalkBuilder;
use serde::Serialize;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::embedder::Embedder;
use crate::error::{RagError, Result};
use crate::extract::chunking::{chunk_text, truncate_chars};
use crate::extract::{self, DocumentKind, ExtractOptions};
use crate::store::Store;
use crate::telemetry::MetricsCollector;
use crate::utils::files::{
    dotted_extension, ensure_directory, file_hash, file_size_mb, is_supported_file, safe_filename,
};

/// Characters of parsed text echoed back in results.
const PREVIEW_CHARS: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct DocumentOptions {
    pub extract: ExtractOptions,
    pub output_dir: Option<PathBuf>,
    /// Re-index even when the content hash is unchanged.
    pub force: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryOptions {
    /// Extensions with leading dot; `None` uses the configured list.
    pub extensions: Option<Vec<String>>,
    pub recursive: bool,
    pub extract: ExtractOptions,
    pub max_workers: Option<usize>,
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParsedContent {
    pub text: String,
    pub images: Option<Vec<String>>,
    pub tables: Option<Vec<String>>,
    pub equations: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingOptions {
    pub image_processing: bool,
    pub table_processing: bool,
    pub equation_processing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingMetadata {
    pub parse_method: String,
    pub processing_options: ProcessingOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDocument {
    pub file_path: String,
    pub file_name: String,
    pub file_size_mb: f64,
    pub file_extension: String,
    pub file_hash: String,
    pub chunks: usize,
    pub parsed_content: ParsedContent,
    pub metadata: ProcessingMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
}

/// Per-file result, serialized with a `status` field.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DocumentOutcome {
    Success(ProcessedDocument),
    Skipped { file_path: String, reason: String },
    Error { file_path: String, error: String },
}

impl DocumentOutcome {
    #[must_use]
    pub fn file_path(&self) -> &str {
        match self {
            Self::Success(doc) => &doc.file_path,
            Self::Skipped { file_path, .. } | Self::Error { file_path, .. } => file_path,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectoryReport {
    pub status: String,
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub skipped_files: usize,
    pub errors: Vec<DocumentOutcome>,
    /// Indexed documents dropped because their files were deleted.
    #[serde(skip_serializing_if = "is_zero")]
    pub removed_files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    /// Every file's outcome, in scan order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<DocumentOutcome>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl DirectoryReport {
    fn empty() -> Self {
        Self {
            status: "completed".to_string(),
            total_files: 0,
            processed_files: 0,
            failed_files: 0,
            skipped_files: 0,
            errors: Vec::new(),
            removed_files: 0,
            working_directory: None,
            results: Vec::new(),
        }
    }

    fn from_results(results: Vec<DocumentOutcome>, working_dir: &Path) -> Self {
        let count = |f: fn(&DocumentOutcome) -> bool| results.iter().filter(|r| f(r)).count();
        Self {
            status: "completed".to_string(),
            total_files: results.len(),
            processed_files: count(|r| matches!(r, DocumentOutcome::Success(_))),
            failed_files: count(|r| matches!(r, DocumentOutcome::Error { .. })),
            skipped_files: count(|r| matches!(r, DocumentOutcome::Skipped { .. })),
            errors: results
                .iter()
                .filter(|r| matches!(r, DocumentOutcome::Error { .. }))
                .cloned()
                .collect(),
            removed_files: 0,
            working_directory: Some(working_dir.display().to_string()),
            results,
        }
    }
}

pub struct DocumentProcessor {
    settings: Arc<Settings>,
    embedder: Arc<dyn Embedder>,
    store: Arc<TokioMutex<Store>>,
    metrics: Arc<MetricsCollector>,
}

impl DocumentProcessor {
    pub fn new(
        settings: Arc<Settings>,
        embedder: Arc<dyn Embedder>,
        store: Arc<TokioMutex<Store>>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        info!("Document processor initialized");
        Self {
            settings,
            embedder,
            store,
            metrics,
        }
    }

    /// Process every matching file under `dir`.
    ///
    /// Per-file failures are reported in the result rather than returned.
    pub async fn process_directory(
        &self,
        dir: &Path,
        working_dir: &Path,
        options: &DirectoryOptions,
    ) -> Result<DirectoryReport> {
        let extensions = options
            .extensions
            .clone()
            .unwrap_or_else(|| self.settings.files.supported_extensions.clone());

        let removed = self.prune_removed(dir).await?;

        info!("Scanning directory: {}", dir.display());
        let files = find_files(dir, &extensions, options.recursive);
        info!("Found {} files to process", files.len());

        if files.is_empty() {
            return Ok(DirectoryReport {
                removed_files: removed,
                ..DirectoryReport::empty()
            });
        }

        let workers = options
            .max_workers
            .unwrap_or(self.settings.rag.max_workers)
            .max(1);
        let doc_options = DocumentOptions {
            extract: options.extract,
            output_dir: None,
            force: options.force,
        };

        let results: Vec<DocumentOutcome> = stream::iter(files)
            .map(|file| {
                let doc_options = &doc_options;
                async move {
                    match self.process_single_document(&file, doc_options).await {
                        Ok(outcome) => outcome,
                        Err(e) => DocumentOutcome::Error {
                            file_path: file.display().to_string(),
                            error: e.to_string(),
                        },
                    }
                }
            })
            .buffered(workers)
            .collect()
            .await;

        let mut report = DirectoryReport::from_results(results, working_dir);
        report.removed_files = removed;
        info!(
            "Directory processing completed: {} processed, {} failed, {} skipped of {}",
            report.processed_files, report.failed_files, report.skipped_files, report.total_files
        );
        Ok(report)
    }

    /// Drop indexed documents under `dir` whose files no longer exist.
    async fn prune_removed(&self, dir: &Path) -> Result<usize> {
        let prefix = format!("{}/", store_key(dir).trim_end_matches('/'));
        let mut store = self.store.lock().await;
        let gone: Vec<String> = store
            .list_documents()?
            .into_iter()
            .map(|doc| doc.filename)
            .filter(|name| name.starts_with(&prefix) && !Path::new(name).exists())
            .collect();

        let mut removed = 0;
        for filename in &gone {
            if store.delete_document(filename)? {
                info!("Removed deleted file from index: {filename}");
                removed += 1;
            }
        }
        if removed > 0 {
            self.metrics
                .increment_by("document_processor.documents.removed", removed as u64, &[]);
        }
        Ok(removed)
    }

    /// Index one file.
    ///
    /// A missing or oversized file is an error; extraction and embedding
    /// failures come back as `DocumentOutcome::Error`.
    pub async fn process_single_document(
        &self,
        path: &Path,
        options: &DocumentOptions,
    ) -> Result<DocumentOutcome> {
        let file_path = path.display().to_string();
        if !path.is_file() {
            return Err(RagError::FileNotFound(format!("File not found: {file_path}")));
        }

        let size_mb = file_size_mb(path)?;
        let max_mb = self.settings.files.max_file_size_mb;
        if size_mb > max_mb as f64 {
            return Err(RagError::FileTooLarge { size_mb, max_mb });
        }

        let kind = DocumentKind::from_path(path);
        if matches!(kind, DocumentKind::Pptx | DocumentKind::Other) {
            warn!("Skipping unsupported file: {file_path}");
            return Ok(DocumentOutcome::Skipped {
                file_path,
                reason: format!("unsupported file type: {}", dotted_extension(path)),
            });
        }

        info!("Processing document: {file_path}");
        self.metrics.increment("document_processor.documents.started");
        let _timer = self.metrics.start_timer("document_processor.process_document");

        match self.index(path, size_mb, options).await {
            Ok(outcome) => {
                if outcome.is_success() {
                    self.metrics.increment("document_processor.documents.success");
                    info!("Document processed successfully: {file_path}");
                }
                Ok(outcome)
            }
            Err(e) => {
                self.metrics.increment("document_processor.documents.error");
                error!("Error processing document {file_path}: {e}");
                Ok(DocumentOutcome::Error {
                    file_path,
                    error: e.to_string(),
                })
            }
        }
    }

    async fn index(
        &self,
        path: &Path,
        size_mb: f64,
        options: &DocumentOptions,
    ) -> Result<DocumentOutcome> {
        let file_path = path.display().to_string();
        let key = store_key(path);

        let owned = path.to_path_buf();
        let hash = tokio::task::spawn_blocking(move || file_hash(&owned))
            .await
            .map_err(|e| RagError::Extraction(format!("hashing task failed: {e}")))??;

        if !options.force {
            let stored = self.store.lock().await.document_hash(&key)?;
            if stored.as_deref() == Some(hash.as_str()) {
                debug!("Unchanged since last indexing: {file_path}");
                return Ok(DocumentOutcome::Skipped {
                    file_path,
                    reason: "unchanged since last indexing".to_string(),
                });
            }
        }

        let owned = path.to_path_buf();
        let extract_options = options.extract;
        let extracted =
            tokio::task::spawn_blocking(move || extract::extract(&owned, &extract_options))
                .await
                .map_err(|e| RagError::Extraction(format!("extraction task failed: {e}")))??;

        let chunks = chunk_text(
            &extracted.text,
            self.settings.rag.chunk_size,
            self.settings.rag.chunk_overlap,
        );
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&texts).await?
        };

        let modified_at: DateTime<Utc> = std::fs::metadata(path)?.modified()?.into();
        self.store
            .lock()
            .await
            .upsert_document(&key, &hash, modified_at, &chunks, &embeddings)?;

        let output_file = match &options.output_dir {
            Some(dir) => Some(write_parsed_text(dir, path, &extracted.text)?),
            None => None,
        };

        let opts = &options.extract;
        Ok(DocumentOutcome::Success(ProcessedDocument {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            file_path,
            file_size_mb: size_mb,
            file_extension: dotted_extension(path),
            file_hash: hash,
            chunks: chunks.len(),
            parsed_content: ParsedContent {
                text: truncate_chars(&extracted.text, PREVIEW_CHARS),
                images: extracted.images,
                tables: extracted.tables,
                equations: extracted.equations,
            },
            metadata: ProcessingMetadata {
                parse_method: opts.parse_method.as_str().to_string(),
                processing_options: ProcessingOptions {
                    image_processing: opts.images,
                    table_processing: opts.tables,
                    equation_processing: opts.equations,
                },
            },
            output_file: output_file.map(|p| p.display().to_string()),
        }))
    }
}

/// Key a document by its path, with forward slashes on every platform.
fn store_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn write_parsed_text(output_dir: &Path, source: &Path, text: &str) -> Result<PathBuf> {
    ensure_directory(output_dir)?;
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let target = output_dir.join(format!("{}.txt", safe_filename(&stem)));
    std::fs::write(&target, text)?;
    Ok(target)
}

/// Files under `dir` with one of `extensions`, sorted and deduplicated.
///
/// Honors `.gitignore`; hidden files are included.
pub fn find_files(dir: &Path, extensions: &[String], recursive: bool) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(dir);
    builder.hidden(false);
    if !recursive {
        builder.max_depth(Some(1));
    }

    let mut files: Vec<PathBuf> = builder
        .build()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
        .map(|e| e.into_path())
        .filter(|p| is_supported_file(p, extensions))
        .collect();
    files.sort();
    files.dedup();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashEmbedder;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn processor(max_file_size_mb: u64) -> (DocumentProcessor, Arc<MetricsCollector>) {
        let mut settings = Settings::default();
        settings.files.max_file_size_mb = max_file_size_mb;
        settings.rag.chunk_size = 200;
        settings.rag.chunk_overlap = 20;
        let metrics = MetricsCollector::shared(true);
        let store = Store::open_in_memory(64).unwrap();
        let p = DocumentProcessor::new(
            Arc::new(settings),
            Arc::new(HashEmbedder::new(64)),
            Arc::new(TokioMutex::new(store)),
            metrics.clone(),
        );
        (p, metrics)
    }

    fn sample_dir() -> TempDir {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.md"), "# Alpha\n\nAlpha document about rust.").unwrap();
        fs::write(temp.path().join("b.txt"), "Beta notes on cargo.").unwrap();
        fs::write(temp.path().join("c.pptx"), "not a real deck").unwrap();
        fs::write(temp.path().join("ignored.rs"), "fn main() {}").unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/d.md"), "Delta in a subfolder.").unwrap();
        temp
    }

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_find_files_recursive_and_flat() {
        let temp = sample_dir();
        let all = find_files(temp.path(), &exts(&[".md", ".txt", ".pptx"]), true);
        let names: Vec<String> = all
            .iter()
            .map(|p| p.strip_prefix(temp.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt", "c.pptx", "sub/d.md"]);

        let flat = find_files(temp.path(), &exts(&[".md"]), false);
        assert_eq!(flat.len(), 1);
    }

    #[tokio::test]
    async fn test_process_directory_counts_and_order() {
        let temp = sample_dir();
        let (p, metrics) = processor(100);
        let options = DirectoryOptions {
            extensions: Some(exts(&[".md", ".txt", ".pptx"])),
            recursive: true,
            max_workers: Some(2),
            ..DirectoryOptions::default()
        };
        let report = p
            .process_directory(temp.path(), Path::new("/tmp/work"), &options)
            .await
            .unwrap();

        assert_eq!(report.total_files, 4);
        assert_eq!(report.processed_files, 3);
        assert_eq!(report.skipped_files, 1);
        assert_eq!(report.failed_files, 0);
        assert_eq!(
            report.processed_files + report.failed_files + report.skipped_files,
            report.total_files
        );
        assert!(report.results[0].file_path().ends_with("a.md"));
        assert!(report.results[3].file_path().ends_with("d.md"));
        assert_eq!(report.working_directory.as_deref(), Some("/tmp/work"));
        assert_eq!(metrics.counter("document_processor.documents.success", &[]), 3);
    }

    #[tokio::test]
    async fn test_empty_directory_report() {
        let temp = tempdir().unwrap();
        let (p, _) = processor(100);
        let report = p
            .process_directory(temp.path(), Path::new("/tmp/work"), &DirectoryOptions::default())
            .await
            .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "completed",
                "total_files": 0,
                "processed_files": 0,
                "failed_files": 0,
                "skipped_files": 0,
                "errors": [],
            })
        );
    }

    #[tokio::test]
    async fn test_deleted_files_are_dropped_from_index() {
        let temp = sample_dir();
        let (p, metrics) = processor(100);
        let options = DirectoryOptions {
            extensions: Some(exts(&[".md", ".txt"])),
            recursive: true,
            ..DirectoryOptions::default()
        };
        p.process_directory(temp.path(), Path::new("/tmp/work"), &options)
            .await
            .unwrap();
        assert_eq!(p.store.lock().await.list_documents().unwrap().len(), 3);

        fs::remove_file(temp.path().join("b.txt")).unwrap();
        fs::remove_file(temp.path().join("sub/d.md")).unwrap();
        let report = p
            .process_directory(temp.path(), Path::new("/tmp/work"), &options)
            .await
            .unwrap();

        assert_eq!(report.removed_files, 2);
        assert_eq!(report.skipped_files, 1);
        let docs = p.store.lock().await.list_documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].filename.ends_with("a.md"));
        assert_eq!(metrics.counter("document_processor.documents.removed", &[]), 2);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["removed_files"], 2);
    }

    #[tokio::test]
    async fn test_unchanged_file_is_skipped_unless_forced() {
        let temp = sample_dir();
        let (p, _) = processor(100);
        let path = temp.path().join("a.md");

        let first = p.process_single_document(&path, &DocumentOptions::default()).await.unwrap();
        assert!(first.is_success());

        let second = p.process_single_document(&path, &DocumentOptions::default()).await.unwrap();
        assert!(matches!(second, DocumentOutcome::Skipped { .. }));

        let forced = DocumentOptions {
            force: true,
            ..DocumentOptions::default()
        };
        let third = p.process_single_document(&path, &forced).await.unwrap();
        assert!(third.is_success());
    }

    #[tokio::test]
    async fn test_single_document_result_shape() {
        let temp = sample_dir();
        let out = tempdir().unwrap();
        let (p, _) = processor(100);
        let options = DocumentOptions {
            output_dir: Some(out.path().to_path_buf()),
            extract: ExtractOptions {
                tables: false,
                ..ExtractOptions::default()
            },
            ..DocumentOptions::default()
        };
        let outcome = p
            .process_single_document(&temp.path().join("a.md"), &options)
            .await
            .unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["file_name"], "a.md");
        assert_eq!(json["file_extension"], ".md");
        assert_eq!(json["chunks"], 1);
        assert_eq!(json["file_hash"].as_str().unwrap().len(), 64);
        assert!(json["parsed_content"]["tables"].is_null());
        assert_eq!(json["parsed_content"]["images"], serde_json::json!([]));
        assert_eq!(json["metadata"]["parse_method"], "auto");
        assert_eq!(json["metadata"]["processing_options"]["table_processing"], false);

        let written = fs::read_to_string(out.path().join("a.txt")).unwrap();
        assert!(written.contains("Alpha document about rust."));
    }

    #[tokio::test]
    async fn test_missing_and_oversized_files() {
        let temp = tempdir().unwrap();
        let (p, _) = processor(0);

        let err = p
            .process_single_document(&temp.path().join("nope.md"), &DocumentOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::FileNotFound(_)));

        let big = temp.path().join("big.txt");
        fs::write(&big, vec![b'x'; 64 * 1024]).unwrap();
        let err = p
            .process_single_document(&big, &DocumentOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("File too large: 0.06MB (max: 0MB)"));
    }

    #[tokio::test]
    async fn test_corrupt_file_becomes_error_entry() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("broken.pdf"), "not a pdf").unwrap();
        let (p, metrics) = processor(100);
        let options = DirectoryOptions {
            extensions: Some(exts(&[".pdf"])),
            recursive: true,
            ..DirectoryOptions::default()
        };
        let report = p
            .process_directory(temp.path(), Path::new("/tmp/work"), &options)
            .await
            .unwrap();
        assert_eq!(report.failed_files, 1);
        assert_eq!(report.errors.len(), 1);
        let json = serde_json::to_value(&report.errors[0]).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json["error"].as_str().unwrap().contains("extraction failed"));
        assert_eq!(metrics.counter("document_processor.documents.error", &[]), 1);
    }
}
