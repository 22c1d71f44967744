//! Per-directory RAG instances and their lifecycle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::document_processor::{
    DirectoryOptions, DirectoryReport, DocumentOptions, DocumentOutcome, DocumentProcessor,
};
use super::query_service::{MultimodalQueryResult, QueryResult, QueryService};
use crate::config::{Provider, Settings};
use crate::error::{RagError, Result};
use crate::store::{DB_FILE_NAME, Store};
use crate::telemetry::MetricsCollector;
use crate::utils::files::{ensure_directory, safe_filename, validate_path};
use crate::utils::validation::{validate_api_key, validate_directory_path, validate_file_path};
use crate::{embedder, llm};

/// Where an instance keeps its data and which API endpoint it talks to.
#[derive(Debug, Clone, Default)]
pub struct InstanceOptions {
    pub working_dir: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceInfo {
    pub directory_path: String,
    pub working_dir: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub is_processing: bool,
    pub is_initialized: bool,
    pub document_count: usize,
    pub chunk_count: usize,
}

/// State and services for one indexed directory.
pub struct RagInstance {
    pub directory_path: PathBuf,
    pub working_dir: PathBuf,
    created_at: DateTime<Utc>,
    last_accessed_ms: AtomicI64,
    is_processing: AtomicBool,
    is_initialized: AtomicBool,
    store: Arc<TokioMutex<Store>>,
    processor: DocumentProcessor,
    query_service: QueryService,
}

impl RagInstance {
    fn new(
        directory_path: PathBuf,
        working_dir: PathBuf,
        api_key: &str,
        settings: Arc<Settings>,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Self> {
        ensure_directory(&working_dir)?;

        let embedder = embedder::from_settings(&settings, api_key)?;
        let generator = llm::from_settings(&settings, api_key)?;
        let store = Store::open(working_dir.join(DB_FILE_NAME), embedder.dimensions())?;
        let store = Arc::new(TokioMutex::new(store));

        let processor = DocumentProcessor::new(
            settings.clone(),
            embedder.clone(),
            store.clone(),
            metrics.clone(),
        );
        let query_service = QueryService::new(
            settings,
            working_dir.clone(),
            embedder,
            generator,
            store.clone(),
            metrics,
        );

        let now = Utc::now();
        info!("RAG instance created for: {}", directory_path.display());
        Ok(Self {
            directory_path,
            working_dir,
            created_at: now,
            last_accessed_ms: AtomicI64::new(now.timestamp_millis()),
            is_processing: AtomicBool::new(false),
            is_initialized: AtomicBool::new(false),
            store,
            processor,
            query_service,
        })
    }

    pub fn touch(&self) {
        self.last_accessed_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn last_accessed(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_accessed_ms.load(Ordering::Relaxed))
            .unwrap_or(self.created_at)
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.is_processing.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.is_initialized.load(Ordering::SeqCst)
    }

    fn mark_initialized(&self) {
        self.is_initialized.store(true, Ordering::SeqCst);
    }

    /// Claim the processing flag, or `None` when another task holds it.
    fn begin_processing(&self) -> Option<ProcessingGuard<'_>> {
        self.is_processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ProcessingGuard(&self.is_processing))
    }

    pub async fn info(&self) -> Result<InstanceInfo> {
        let stats = self.store.lock().await.stats()?;
        Ok(InstanceInfo {
            directory_path: self.directory_path.display().to_string(),
            working_dir: self.working_dir.display().to_string(),
            created_at: self.created_at,
            last_accessed: self.last_accessed(),
            is_processing: self.is_processing(),
            is_initialized: self.is_initialized(),
            document_count: stats.documents,
            chunk_count: stats.chunks,
        })
    }

    #[cfg(test)]
    fn backdate(&self, by: Duration) {
        let ms = by.as_millis() as i64;
        self.last_accessed_ms.fetch_sub(ms, Ordering::Relaxed);
    }
}

/// Clears the processing flag when dropped.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// `<dir name>-<8 hex of the path hash>`, so equal names in different
/// places get separate storage.
fn instance_dir_name(directory: &Path) -> String {
    let name = directory
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "root".to_string());
    let digest = Sha256::digest(directory.to_string_lossy().as_bytes());
    format!("{}-{}", safe_filename(&name), &hex::encode(digest)[..8])
}

pub struct RagManager {
    settings: Arc<Settings>,
    metrics: Arc<MetricsCollector>,
    instances: TokioMutex<HashMap<PathBuf, Arc<RagInstance>>>,
}

impl RagManager {
    pub fn new(settings: Arc<Settings>, metrics: Arc<MetricsCollector>) -> Self {
        metrics.set_gauge("rag_manager.instances", 0.0);
        info!("RAG manager initialized");
        Self {
            settings,
            metrics,
            instances: TokioMutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Return the cached instance for `directory`, creating it on first use.
    ///
    /// A cached instance keeps the API key and options it was created with.
    pub async fn get_or_create_instance(
        &self,
        directory: &str,
        api_key: &str,
        options: &InstanceOptions,
    ) -> Result<Arc<RagInstance>> {
        let path = validate_path(directory)?;
        let mut instances = self.instances.lock().await;

        if let Some(instance) = instances.get(&path) {
            instance.touch();
            debug!("Reusing cached RAG instance: {}", path.display());
            self.metrics.increment("rag_manager.cache.hit");
            return Ok(instance.clone());
        }

        if self.settings.rag.provider == Provider::Openai {
            validate_api_key(api_key)?;
        }

        let working_dir = match options.working_dir.as_deref().filter(|w| !w.trim().is_empty()) {
            Some(w) => validate_path(w)?,
            None => self.settings.rag.working_dir.join(instance_dir_name(&path)),
        };
        let settings = match options.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => {
                let mut custom = (*self.settings).clone();
                custom.openai.base_url = url.trim().to_string();
                Arc::new(custom)
            }
            None => self.settings.clone(),
        };

        let instance = Arc::new(RagInstance::new(
            path.clone(),
            working_dir,
            api_key,
            settings,
            self.metrics.clone(),
        )?);
        instances.insert(path.clone(), instance.clone());

        self.metrics.increment("rag_manager.cache.miss");
        self.metrics
            .set_gauge("rag_manager.instances", instances.len() as f64);
        info!("Created new RAG instance: {}", path.display());
        Ok(instance)
    }

    async fn existing_instance(&self, directory: &str) -> Result<Arc<RagInstance>> {
        let path = validate_path(directory)?;
        let instances = self.instances.lock().await;
        let instance = instances
            .get(&path)
            .cloned()
            .ok_or_else(|| RagError::NotProcessed(directory.to_string()))?;
        instance.touch();
        Ok(instance)
    }

    pub async fn process_directory(
        &self,
        directory: &str,
        api_key: &str,
        instance_options: &InstanceOptions,
        options: &DirectoryOptions,
    ) -> Result<DirectoryReport> {
        validate_directory_path(directory)?;
        let instance = self
            .get_or_create_instance(directory, api_key, instance_options)
            .await?;

        let Some(_guard) = instance.begin_processing() else {
            return Err(RagError::AlreadyProcessing(directory.to_string()));
        };
        self.metrics.increment("rag_manager.processing.started");

        match instance
            .processor
            .process_directory(&instance.directory_path, &instance.working_dir, options)
            .await
        {
            Ok(report) => {
                instance.mark_initialized();
                if report.processed_files > 0 || report.removed_files > 0 {
                    instance.query_service.invalidate_cache();
                }
                self.metrics.increment("rag_manager.processing.completed");
                info!("Directory processing completed: {directory}");
                Ok(report)
            }
            Err(e) => {
                error!("Error processing directory {directory}: {e}");
                self.metrics.increment("rag_manager.processing.error");
                Err(e)
            }
        }
    }

    /// Index one file into the instance of its parent directory.
    pub async fn process_single_document(
        &self,
        file_path: &str,
        api_key: &str,
        instance_options: &InstanceOptions,
        options: &DocumentOptions,
    ) -> Result<DocumentOutcome> {
        validate_file_path(file_path)?;
        let file = validate_path(file_path)?;
        let parent = file
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .ok_or_else(|| RagError::validation(format!("File has no parent directory: {file_path}")))?;

        let instance = self
            .get_or_create_instance(&parent, api_key, instance_options)
            .await?;
        self.metrics.increment("rag_manager.document.started");

        match instance.processor.process_single_document(&file, options).await {
            Ok(outcome) => {
                if outcome.is_success() {
                    instance.mark_initialized();
                    instance.query_service.invalidate_cache();
                }
                self.metrics.increment("rag_manager.document.completed");
                info!("Document processing completed: {file_path}");
                Ok(outcome)
            }
            Err(e) => {
                error!("Error processing document {file_path}: {e}");
                self.metrics.increment("rag_manager.document.error");
                Err(e)
            }
        }
    }

    pub async fn query_directory(
        &self,
        directory: &str,
        query: &str,
        mode: &str,
    ) -> Result<QueryResult> {
        let instance = self.existing_instance(directory).await?;
        if !instance.is_initialized() {
            return Err(RagError::NotInitialized(directory.to_string()));
        }

        self.metrics.increment("rag_manager.query.started");
        match instance.query_service.query(query, mode).await {
            Ok(result) => {
                self.metrics.increment("rag_manager.query.completed");
                Ok(result)
            }
            Err(e) => {
                error!("Error querying directory {directory}: {e}");
                self.metrics.increment("rag_manager.query.error");
                Err(e)
            }
        }
    }

    pub async fn query_with_multimodal(
        &self,
        directory: &str,
        query: &str,
        items: &[Value],
        mode: &str,
    ) -> Result<MultimodalQueryResult> {
        let instance = self.existing_instance(directory).await?;

        self.metrics.increment("rag_manager.multimodal_query.started");
        match instance
            .query_service
            .query_with_multimodal(query, items, mode)
            .await
        {
            Ok(result) => {
                self.metrics.increment("rag_manager.multimodal_query.completed");
                Ok(result)
            }
            Err(e) => {
                error!("Error in multimodal query: {e}");
                self.metrics.increment("rag_manager.multimodal_query.error");
                Err(e)
            }
        }
    }

    /// Info for every cached instance, ordered by directory path.
    pub async fn list_processed_directories(&self) -> Result<Vec<InstanceInfo>> {
        let mut instances: Vec<Arc<RagInstance>> =
            self.instances.lock().await.values().cloned().collect();
        instances.sort_by(|a, b| a.directory_path.cmp(&b.directory_path));

        let mut infos = Vec::with_capacity(instances.len());
        for instance in instances {
            infos.push(instance.info().await?);
        }
        Ok(infos)
    }

    pub async fn get_rag_info(&self, directory: &str) -> Result<Option<InstanceInfo>> {
        let path = validate_path(directory)?;
        let instance = self.instances.lock().await.get(&path).cloned();
        match instance {
            Some(instance) => Ok(Some(instance.info().await?)),
            None => Ok(None),
        }
    }

    /// Drop instances idle for longer than `ttl` that are not processing.
    /// Returns how many were removed.
    pub async fn cleanup_stale_instances(&self, ttl: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
        else {
            return 0;
        };
        let mut instances = self.instances.lock().await;

        let stale: Vec<PathBuf> = instances
            .iter()
            .filter(|(_, i)| i.last_accessed() < cutoff && !i.is_processing())
            .map(|(k, _)| k.clone())
            .collect();

        for key in &stale {
            info!("Removing stale RAG instance: {}", key.display());
            instances.remove(key);
            self.metrics.increment("rag_manager.cleanup.removed");
        }
        self.metrics
            .set_gauge("rag_manager.instances", instances.len() as f64);
        stale.len()
    }

    /// Sweep stale instances every `interval` until `token` is cancelled.
    pub fn spawn_cleanup_task(
        self: &Arc<Self>,
        interval: Duration,
        ttl: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Stale instance sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = manager.cleanup_stale_instances(ttl).await;
                        if removed > 0 {
                            info!("Removed {removed} stale RAG instance(s)");
                        }
                    }
                }
            }
        })
    }

    /// Drop every instance.
    pub async fn cleanup(&self) {
        info!("Cleaning up RAG manager...");
        let mut instances = self.instances.lock().await;
        for key in instances.keys() {
            debug!("Cleaning up instance: {}", key.display());
        }
        instances.clear();
        self.metrics.set_gauge("rag_manager.instances", 0.0);
        info!("RAG manager cleanup completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    const KEY: &str = "local-test-key";

    fn manager(storage: &TempDir) -> Arc<RagManager> {
        let mut settings = Settings::default();
        settings.rag.provider = Provider::Local;
        settings.rag.working_dir = storage.path().to_path_buf();
        settings.openai.embedding_dim = 64;
        Arc::new(RagManager::new(
            Arc::new(settings),
            MetricsCollector::shared(true),
        ))
    }

    fn docs_dir() -> TempDir {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("guide.md"), "# Guide\n\nInstall with cargo install.").unwrap();
        fs::write(temp.path().join("notes.txt"), "Remember to run the tests.").unwrap();
        temp
    }

    fn dir_str(dir: &TempDir) -> String {
        dir.path().to_string_lossy().to_string()
    }

    fn all_files() -> DirectoryOptions {
        DirectoryOptions {
            recursive: true,
            ..DirectoryOptions::default()
        }
    }

    #[test]
    fn test_instance_dir_name_separates_same_names() {
        let a = instance_dir_name(Path::new("/one/docs"));
        let b = instance_dir_name(Path::new("/two/docs"));
        assert!(a.starts_with("docs-"));
        assert_eq!(a.len(), "docs-".len() + 8);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_instance_is_cached() {
        let storage = tempdir().unwrap();
        let docs = docs_dir();
        let m = manager(&storage);
        let opts = InstanceOptions::default();

        let a = m.get_or_create_instance(&dir_str(&docs), KEY, &opts).await.unwrap();
        let b = m.get_or_create_instance(&dir_str(&docs), "other-key", &opts).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.working_dir.starts_with(storage.path()));
        assert!(a.working_dir.join(DB_FILE_NAME).exists());
        assert_eq!(m.metrics().counter("rag_manager.cache.miss", &[]), 1);
        assert_eq!(m.metrics().counter("rag_manager.cache.hit", &[]), 1);
        assert_eq!(m.metrics().gauge("rag_manager.instances"), Some(1.0));
    }

    #[tokio::test]
    async fn test_openai_provider_checks_api_key() {
        let storage = tempdir().unwrap();
        let docs = docs_dir();
        let mut settings = Settings::default();
        settings.rag.working_dir = storage.path().to_path_buf();
        let m = RagManager::new(Arc::new(settings), MetricsCollector::shared(false));
        let err = m
            .get_or_create_instance(&dir_str(&docs), "short", &InstanceOptions::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "API key appears to be too short");
    }

    #[tokio::test]
    async fn test_process_then_query() {
        let storage = tempdir().unwrap();
        let docs = docs_dir();
        let m = manager(&storage);
        let dir = dir_str(&docs);

        let report = m
            .process_directory(&dir, KEY, &InstanceOptions::default(), &all_files())
            .await
            .unwrap();
        assert_eq!(report.total_files, 2);
        assert_eq!(report.processed_files, 2);

        let info = m.get_rag_info(&dir).await.unwrap().unwrap();
        assert!(info.is_initialized);
        assert!(!info.is_processing);
        assert_eq!(info.document_count, 2);

        let result = m.query_directory(&dir, "cargo install", "naive").await.unwrap();
        assert!(result.sources[0].document.ends_with("guide.md"));
    }

    #[tokio::test]
    async fn test_reindexing_refreshes_cached_answers() {
        let storage = tempdir().unwrap();
        let docs = tempdir().unwrap();
        let file = docs.path().join("launch.md");
        fs::write(&file, "The launch code is alpha.").unwrap();
        let m = manager(&storage);
        let dir = dir_str(&docs);

        m.process_directory(&dir, KEY, &InstanceOptions::default(), &all_files())
            .await
            .unwrap();
        let first = m.query_directory(&dir, "launch code", "naive").await.unwrap();
        assert!(first.sources[0].excerpt.contains("alpha"));

        fs::write(&file, "The launch code is omega.").unwrap();
        let report = m
            .process_directory(&dir, KEY, &InstanceOptions::default(), &all_files())
            .await
            .unwrap();
        assert_eq!(report.processed_files, 1);

        let second = m.query_directory(&dir, "launch code", "naive").await.unwrap();
        assert!(second.sources[0].excerpt.contains("omega"));
        assert!(second.response.contains("omega"));

        fs::write(&file, "The launch code is delta.").unwrap();
        let outcome = m
            .process_single_document(
                &file.to_string_lossy(),
                KEY,
                &InstanceOptions::default(),
                &DocumentOptions::default(),
            )
            .await
            .unwrap();
        assert!(outcome.is_success());
        let third = m.query_directory(&dir, "launch code", "naive").await.unwrap();
        assert!(third.sources[0].excerpt.contains("delta"));
    }

    #[tokio::test]
    async fn test_query_unknown_directory() {
        let storage = tempdir().unwrap();
        let docs = docs_dir();
        let m = manager(&storage);
        let err = m
            .query_directory(&dir_str(&docs), "anything", "hybrid")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NotProcessed(_)));
        assert!(err.to_string().starts_with("Directory not processed: "));

        let err = m
            .query_with_multimodal(&dir_str(&docs), "anything", &[], "hybrid")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NotProcessed(_)));
    }

    #[tokio::test]
    async fn test_query_before_initialized() {
        let storage = tempdir().unwrap();
        let docs = docs_dir();
        let m = manager(&storage);
        m.get_or_create_instance(&dir_str(&docs), KEY, &InstanceOptions::default())
            .await
            .unwrap();
        let err = m
            .query_directory(&dir_str(&docs), "anything", "hybrid")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NotInitialized(_)));
    }

    #[tokio::test]
    async fn test_concurrent_processing_is_rejected() {
        let storage = tempdir().unwrap();
        let docs = docs_dir();
        let m = manager(&storage);
        let dir = dir_str(&docs);
        let instance = m
            .get_or_create_instance(&dir, KEY, &InstanceOptions::default())
            .await
            .unwrap();

        let guard = instance.begin_processing().unwrap();
        let err = m
            .process_directory(&dir, KEY, &InstanceOptions::default(), &all_files())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::AlreadyProcessing(_)));
        drop(guard);

        assert!(
            m.process_directory(&dir, KEY, &InstanceOptions::default(), &all_files())
                .await
                .is_ok()
        );
        assert!(!instance.is_processing());
    }

    #[tokio::test]
    async fn test_single_document_uses_parent_instance() {
        let storage = tempdir().unwrap();
        let docs = docs_dir();
        let m = manager(&storage);
        let file = docs.path().join("guide.md");

        let outcome = m
            .process_single_document(
                &file.to_string_lossy(),
                KEY,
                &InstanceOptions::default(),
                &DocumentOptions::default(),
            )
            .await
            .unwrap();
        assert!(outcome.is_success());

        let info = m.get_rag_info(&dir_str(&docs)).await.unwrap().unwrap();
        assert!(info.is_initialized);
        assert_eq!(info.document_count, 1);

        let err = m
            .process_single_document(
                &docs.path().join("missing.md").to_string_lossy(),
                KEY,
                &InstanceOptions::default(),
                &DocumentOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_custom_working_dir() {
        let storage = tempdir().unwrap();
        let custom = tempdir().unwrap();
        let docs = docs_dir();
        let m = manager(&storage);
        let opts = InstanceOptions {
            working_dir: Some(custom.path().join("rag").to_string_lossy().to_string()),
            base_url: None,
        };
        let instance = m.get_or_create_instance(&dir_str(&docs), KEY, &opts).await.unwrap();
        assert!(instance.working_dir.starts_with(custom.path()));
        assert!(instance.working_dir.join(DB_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_cleanup_stale_instances() {
        let storage = tempdir().unwrap();
        let idle = docs_dir();
        let busy = docs_dir();
        let fresh = docs_dir();
        let m = manager(&storage);
        let opts = InstanceOptions::default();

        let idle_i = m.get_or_create_instance(&dir_str(&idle), KEY, &opts).await.unwrap();
        let busy_i = m.get_or_create_instance(&dir_str(&busy), KEY, &opts).await.unwrap();
        m.get_or_create_instance(&dir_str(&fresh), KEY, &opts).await.unwrap();

        idle_i.backdate(Duration::from_secs(7200));
        busy_i.backdate(Duration::from_secs(7200));
        let _guard = busy_i.begin_processing().unwrap();

        let removed = m.cleanup_stale_instances(Duration::from_secs(3600)).await;
        assert_eq!(removed, 1);
        assert!(m.get_rag_info(&dir_str(&idle)).await.unwrap().is_none());
        assert!(m.get_rag_info(&dir_str(&busy)).await.unwrap().is_some());
        assert_eq!(m.list_processed_directories().await.unwrap().len(), 2);
        assert_eq!(m.metrics().gauge("rag_manager.instances"), Some(2.0));

        m.cleanup().await;
        assert!(m.list_processed_directories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_task_stops_on_cancel() {
        let storage = tempdir().unwrap();
        let m = manager(&storage);
        let token = CancellationToken::new();
        let handle = m.spawn_cleanup_task(
            Duration::from_millis(10),
            Duration::from_secs(3600),
            token.clone(),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
