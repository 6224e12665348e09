//! Per-conversation GraphRAG workspace.
//!
//! Layout: `{data_dir}/{conversation_id}/{input,output,cache}/` plus `settings.yaml`.
//! Indexing and querying shell out to the `graphrag` CLI; only one index build per
//! conversation runs at a time (see [`IndexingGuard`]). Changes that arrive while a build
//! runs are queued with [`GraphRagService::request_index`] and picked up by
//! [`GraphRagService::finish_build`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::GraphRagConfig;
use crate::error::{GraphRagError, Result};
use crate::graph::{self, GraphSummary, KnowledgeGraph};
use crate::search::keyword_search;
use crate::settings::settings_yaml;
use crate::text::{input_file_name, prepare_content, with_suffix, SHORT_DOCUMENT_CHARS};

const MIN_INDEX_CHARS: usize = 50;
const LOW_INDEX_CHARS: usize = 200;
const ERROR_TAIL_CHARS: usize = 1000;
const DEBUG_PREVIEW_CHARS: usize = 300;

/// GraphRAG search method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    #[default]
    Local,
    Global,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMethod::Local => "local",
            SearchMethod::Global => "global",
        }
    }

    /// Parses a method name; anything unrecognised becomes [`SearchMethod::Local`].
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(method = %value, "Invalid GraphRAG method, using 'local'");
            SearchMethod::Local
        })
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(SearchMethod::Local),
            "global" => Ok(SearchMethod::Global),
            other => Err(format!("unknown search method '{}'", other)),
        }
    }
}

/// A document written to a workspace's input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDocument {
    pub file_name: String,
    pub path: PathBuf,
    pub char_count: usize,
}

/// Outcome of a successful index build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub document_count: usize,
    pub total_characters: usize,
    pub artifact_count: usize,
    /// Input file names the build read.
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub has_index: bool,
    pub has_documents: bool,
    pub document_count: usize,
    pub total_characters: usize,
    pub artifact_count: usize,
    pub indexing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildState {
    Running,
    /// Documents changed after the running build listed its input.
    RebuildRequested,
    /// The conversation was deleted; the workspace goes once the build ends.
    Discard,
}

type ActiveBuilds = Arc<Mutex<HashMap<Uuid, BuildState>>>;

fn lock_builds(builds: &ActiveBuilds) -> std::sync::MutexGuard<'_, HashMap<Uuid, BuildState>> {
    builds.lock().unwrap_or_else(|e| e.into_inner())
}

/// Marks a conversation as being indexed until dropped or handed to
/// [`GraphRagService::finish_build`].
#[derive(Debug)]
pub struct IndexingGuard {
    conversation_id: Uuid,
    active: ActiveBuilds,
    released: bool,
}

impl IndexingGuard {
    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }
}

impl Drop for IndexingGuard {
    fn drop(&mut self) {
        if !self.released {
            lock_builds(&self.active).remove(&self.conversation_id);
        }
    }
}

/// Manages every conversation's GraphRAG workspace under one data directory.
#[derive(Debug, Clone)]
pub struct GraphRagService {
    config: GraphRagConfig,
    indexing: ActiveBuilds,
}

fn tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        text.trim().to_string()
    } else {
        text.chars().skip(count - max).collect::<String>().trim().to_string()
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

impl GraphRagService {
    pub fn new(config: GraphRagConfig) -> Self {
        Self {
            config,
            indexing: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &GraphRagConfig {
        &self.config
    }

    /// Creates the data directory.
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.data_dir).await?;
        info!(data_dir = %self.config.data_dir.display(), "GraphRAG data directory ready");
        Ok(())
    }

    pub fn conversation_dir(&self, conversation_id: Uuid) -> PathBuf {
        self.config.data_dir.join(conversation_id.to_string())
    }

    pub fn input_dir(&self, conversation_id: Uuid) -> PathBuf {
        self.conversation_dir(conversation_id).join("input")
    }

    pub fn output_dir(&self, conversation_id: Uuid) -> PathBuf {
        self.conversation_dir(conversation_id).join("output")
    }

    pub fn cache_dir(&self, conversation_id: Uuid) -> PathBuf {
        self.conversation_dir(conversation_id).join("cache")
    }

    pub fn settings_path(&self, conversation_id: Uuid) -> PathBuf {
        self.conversation_dir(conversation_id).join("settings.yaml")
    }

    async fn ensure_dirs(&self, conversation_id: Uuid) -> Result<()> {
        for dir in [
            self.input_dir(conversation_id),
            self.output_dir(conversation_id),
            self.cache_dir(conversation_id),
        ] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// Writes `content` as a `.txt` input file. An existing file with the same name is kept
    /// and the new one gets a short random suffix.
    pub async fn save_document(
        &self,
        conversation_id: Uuid,
        filename: &str,
        content: &str,
    ) -> Result<SavedDocument> {
        self.ensure_dirs(conversation_id).await?;
        let input_dir = self.input_dir(conversation_id);

        let mut file_name = input_file_name(filename);
        if tokio::fs::try_exists(input_dir.join(&file_name)).await? {
            let suffix = Uuid::new_v4().simple().to_string();
            file_name = with_suffix(&file_name, &suffix[..8]);
        }

        let text = prepare_content(content);
        let char_count = text.chars().count();
        if content.trim().chars().count() < SHORT_DOCUMENT_CHARS {
            warn!(
                conversation_id = %conversation_id,
                file = %file_name,
                chars = content.trim().chars().count(),
                "Document is very short (minimum ~100 characters recommended)"
            );
        }

        let path = input_dir.join(&file_name);
        tokio::fs::write(&path, text.as_bytes()).await?;
        info!(
            conversation_id = %conversation_id,
            file = %file_name,
            chars = char_count,
            "Saved document"
        );
        Ok(SavedDocument {
            file_name,
            path,
            char_count,
        })
    }

    /// `.txt` files in the input directory, sorted by name.
    async fn input_files(&self, conversation_id: Uuid) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(self.input_dir(conversation_id)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "txt") && entry.file_type().await?.is_file()
            {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_input(path: &Path) -> Result<(String, String)> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok((name, content)),
            Err(source) => Err(GraphRagError::ReadDocument { file: name, source }),
        }
    }

    /// `(file name, character count)` for each input document.
    pub async fn list_documents(&self, conversation_id: Uuid) -> Result<Vec<(String, usize)>> {
        let mut documents = Vec::new();
        for path in self.input_files(conversation_id).await? {
            let (name, content) = Self::read_input(&path).await?;
            documents.push((name, content.chars().count()));
        }
        Ok(documents)
    }

    pub async fn has_documents(&self, conversation_id: Uuid) -> bool {
        self.input_files(conversation_id)
            .await
            .map(|files| !files.is_empty())
            .unwrap_or(false)
    }

    async fn parquet_count(dir: &Path) -> usize {
        let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
            return 0;
        };
        let mut count = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.path().extension().is_some_and(|ext| ext == "parquet") {
                count += 1;
            }
        }
        count
    }

    /// Number of parquet artifacts in `output/` (and `output/artifacts/`).
    pub async fn artifact_count(&self, conversation_id: Uuid) -> usize {
        let output = self.output_dir(conversation_id);
        Self::parquet_count(&output).await + Self::parquet_count(&output.join("artifacts")).await
    }

    pub async fn has_index(&self, conversation_id: Uuid) -> bool {
        self.artifact_count(conversation_id).await > 0
    }

    pub fn is_indexing(&self, conversation_id: Uuid) -> bool {
        lock_builds(&self.indexing).contains_key(&conversation_id)
    }

    fn claim(&self, active: &mut HashMap<Uuid, BuildState>, conversation_id: Uuid) -> IndexingGuard {
        active.insert(conversation_id, BuildState::Running);
        IndexingGuard {
            conversation_id,
            active: Arc::clone(&self.indexing),
            released: false,
        }
    }

    /// Claims the conversation for indexing; `None` when a build is already running.
    pub fn try_begin_indexing(&self, conversation_id: Uuid) -> Option<IndexingGuard> {
        let mut active = lock_builds(&self.indexing);
        if active.contains_key(&conversation_id) {
            return None;
        }
        Some(self.claim(&mut active, conversation_id))
    }

    /// Like [`Self::try_begin_indexing`], but when a build is already running it is told to
    /// run again once it finishes, so the change that triggered this call gets indexed.
    pub fn request_index(&self, conversation_id: Uuid) -> Option<IndexingGuard> {
        let mut active = lock_builds(&self.indexing);
        match active.get_mut(&conversation_id) {
            Some(state) => {
                if *state == BuildState::Running {
                    *state = BuildState::RebuildRequested;
                }
                None
            }
            None => Some(self.claim(&mut active, conversation_id)),
        }
    }

    /// Ends a build. Hands the claim back when a rebuild was requested meanwhile, otherwise
    /// releases it. A conversation deleted during the build loses its workspace here.
    pub async fn finish_build(&self, mut guard: IndexingGuard) -> Option<IndexingGuard> {
        let conversation_id = guard.conversation_id;
        let previous = {
            let mut active = lock_builds(&self.indexing);
            let previous = active.get(&conversation_id).copied();
            match previous {
                Some(BuildState::RebuildRequested) => {
                    active.insert(conversation_id, BuildState::Running);
                }
                Some(BuildState::Discard) => {}
                _ => {
                    active.remove(&conversation_id);
                }
            }
            previous
        };
        match previous {
            Some(BuildState::RebuildRequested) => {
                info!(conversation_id = %conversation_id, "Documents changed during the build, rebuilding");
                Some(guard)
            }
            Some(BuildState::Discard) => {
                // Claim is held until the workspace is gone; dropping the guard releases it.
                if let Err(e) = self.delete_conversation_data(conversation_id).await {
                    warn!(conversation_id = %conversation_id, error = %e, "Failed to remove workspace after build");
                }
                None
            }
            _ => {
                guard.released = true;
                None
            }
        }
    }

    /// Logs size, line and paragraph counts and a preview of every input file.
    pub async fn debug_input_files(&self, conversation_id: Uuid) {
        let files = match self.input_files(conversation_id).await {
            Ok(files) => files,
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "Failed to list input files");
                return;
            }
        };
        if files.is_empty() {
            info!(conversation_id = %conversation_id, "DEBUG: no .txt files in input directory");
            return;
        }
        for path in files {
            match Self::read_input(&path).await {
                Ok((name, content)) => {
                    let preview: String = content.chars().take(DEBUG_PREVIEW_CHARS).collect();
                    info!(
                        conversation_id = %conversation_id,
                        file = %name,
                        chars = content.chars().count(),
                        newlines = content.matches('\n').count(),
                        paragraphs = content.matches("\n\n").count(),
                        truncated = content.chars().count() > DEBUG_PREVIEW_CHARS,
                        preview = %preview,
                        "DEBUG: input file"
                    );
                }
                Err(e) => warn!(conversation_id = %conversation_id, error = %e, "DEBUG: failed to read input file"),
            }
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.config.bin);
        command
            .env("GRAPHRAG_API_KEY", &self.config.api_key)
            .env("OPENAI_API_KEY", &self.config.api_key)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(base_url) = &self.config.base_url {
            command.env("OPENAI_BASE_URL", base_url);
        }
        command
    }

    async fn run(&self, mut command: Command) -> Result<Output> {
        command.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                error!(bin = %self.config.bin, "GraphRAG CLI not found in PATH");
                GraphRagError::CliNotFound(self.config.bin.clone())
            } else {
                GraphRagError::Io(e)
            }
        })
    }

    /// Builds the index unless another build for the conversation is running.
    pub async fn build_index(&self, conversation_id: Uuid) -> Result<IndexReport> {
        let guard = self
            .try_begin_indexing(conversation_id)
            .ok_or(GraphRagError::AlreadyIndexing(conversation_id))?;
        self.build_index_guarded(&guard).await
    }

    /// Builds the index for the conversation claimed by `guard`.
    pub async fn build_index_guarded(&self, guard: &IndexingGuard) -> Result<IndexReport> {
        let conversation_id = guard.conversation_id();
        info!(conversation_id = %conversation_id, "step: GraphRAG build_index start");
        self.ensure_dirs(conversation_id).await?;

        let files = self.input_files(conversation_id).await?;
        if files.is_empty() {
            warn!(conversation_id = %conversation_id, "No documents to index");
            return Err(GraphRagError::NoDocuments);
        }

        let mut total_characters = 0;
        let mut names = Vec::with_capacity(files.len());
        for path in &files {
            let (name, content) = Self::read_input(path).await?;
            let chars = content.chars().count();
            total_characters += chars;
            info!(conversation_id = %conversation_id, file = %name, chars, "Validated input file");
            names.push(name);
        }
        info!(
            conversation_id = %conversation_id,
            total_characters,
            document_count = files.len(),
            "step: GraphRAG input validated"
        );

        if total_characters < MIN_INDEX_CHARS {
            return Err(GraphRagError::InsufficientContent {
                chars: total_characters,
            });
        }
        if total_characters < LOW_INDEX_CHARS {
            warn!(
                conversation_id = %conversation_id,
                total_characters,
                "Low content volume may produce limited results"
            );
        }

        if self.config.debug {
            self.debug_input_files(conversation_id).await;
        }

        if self.config.api_key.is_empty() {
            return Err(GraphRagError::MissingApiKey);
        }

        let settings_path = self.settings_path(conversation_id);
        tokio::fs::write(
            &settings_path,
            settings_yaml(&self.config.model, &self.config.embedding_model),
        )
        .await?;
        debug!(path = %settings_path.display(), "Generated settings.yaml");

        let root = self.conversation_dir(conversation_id);
        info!(
            conversation_id = %conversation_id,
            root = %root.display(),
            model = %self.config.model,
            embedding_model = %self.config.embedding_model,
            base_url = self.config.base_url.as_deref().unwrap_or("default"),
            "step: GraphRAG indexing started"
        );

        let mut command = self.command();
        command.arg("index").arg("--root").arg(&root).arg("--verbose");
        let output = self.run(command).await?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                conversation_id = %conversation_id,
                code = ?output.status.code(),
                stderr = %stderr,
                stdout = %stdout,
                "GraphRAG indexing failed"
            );
            if stdout.contains("Empty DataFrame") {
                warn!("Troubleshooting: 'Empty DataFrame' usually means the content is too short or poorly formatted; use documents of at least 200-300 characters with blank lines between paragraphs");
            }
            if stdout.contains("create_base_text_units") {
                warn!("Troubleshooting: text chunking failed; reduce the chunk size, add more content, or make sure the input is UTF-8");
            }
            let detail = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(GraphRagError::IndexFailed {
                code: output.status.code(),
                stderr: tail_chars(&detail, ERROR_TAIL_CHARS),
            });
        }

        let artifact_count = self.artifact_count(conversation_id).await;
        info!(
            conversation_id = %conversation_id,
            artifact_count,
            "step: GraphRAG indexing completed"
        );
        Ok(IndexReport {
            document_count: files.len(),
            total_characters,
            artifact_count,
            files: names,
        })
    }

    /// Runs `graphrag query` against the conversation's index and returns its stdout.
    pub async fn query(
        &self,
        conversation_id: Uuid,
        question: &str,
        method: SearchMethod,
    ) -> Result<String> {
        if !self.has_index(conversation_id).await {
            return Err(GraphRagError::NoIndex);
        }
        if self.config.api_key.is_empty() {
            return Err(GraphRagError::MissingApiKey);
        }

        let preview: String = question.chars().take(100).collect();
        info!(
            conversation_id = %conversation_id,
            method = %method,
            query = %preview,
            "step: GraphRAG query start"
        );

        let root = self.conversation_dir(conversation_id);
        let mut command = self.command();
        command
            .arg("query")
            .arg("--config")
            .arg(self.settings_path(conversation_id))
            .arg("--root")
            .arg(&root)
            .arg("--method")
            .arg(method.as_str())
            .arg("--query")
            .arg(question);
        let output = self.run(command).await?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                conversation_id = %conversation_id,
                code = ?output.status.code(),
                stderr = %stderr.trim(),
                stdout = %stdout,
                "GraphRAG query failed"
            );
            return Err(GraphRagError::QueryFailed {
                code: output.status.code(),
                stderr: tail_chars(&stderr, ERROR_TAIL_CHARS),
            });
        }
        if stdout.is_empty() {
            warn!(conversation_id = %conversation_id, "GraphRAG query returned empty response");
            return Err(GraphRagError::EmptyResponse);
        }

        info!(
            conversation_id = %conversation_id,
            response_chars = stdout.chars().count(),
            "step: GraphRAG query completed"
        );
        Ok(stdout)
    }

    /// Keyword fallback over the input files; unreadable files are skipped.
    pub async fn simple_search(
        &self,
        conversation_id: Uuid,
        query: &str,
        max_results: usize,
    ) -> Result<Option<String>> {
        let mut documents = Vec::new();
        for path in self.input_files(conversation_id).await? {
            match Self::read_input(&path).await {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!(conversation_id = %conversation_id, error = %e, "Skipping unreadable document"),
            }
        }
        Ok(keyword_search(&documents, query, max_results))
    }

    /// Removes one input file; `false` when it did not exist.
    pub async fn remove_document(&self, conversation_id: Uuid, file_name: &str) -> Result<bool> {
        if !is_plain_file_name(file_name) {
            warn!(file = %file_name, "Refusing to remove a path outside the input directory");
            return Ok(false);
        }
        match tokio::fs::remove_file(self.input_dir(conversation_id).join(file_name)).await {
            Ok(()) => {
                info!(conversation_id = %conversation_id, file = %file_name, "Removed document");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes index artifacts and the LLM cache, keeping the input documents.
    pub async fn clear_index(&self, conversation_id: Uuid) -> Result<()> {
        for dir in [self.output_dir(conversation_id), self.cache_dir(conversation_id)] {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!(conversation_id = %conversation_id, "Cleared GraphRAG index");
        Ok(())
    }

    /// Deletes the whole workspace; `false` when there was none. A running build is flagged
    /// so [`Self::finish_build`] removes whatever it writes afterwards.
    pub async fn delete_conversation_data(&self, conversation_id: Uuid) -> Result<bool> {
        if let Some(state) = lock_builds(&self.indexing).get_mut(&conversation_id) {
            *state = BuildState::Discard;
        }
        match tokio::fs::remove_dir_all(self.conversation_dir(conversation_id)).await {
            Ok(()) => {
                info!(conversation_id = %conversation_id, "Deleted GraphRAG data");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn knowledge_graph(&self, conversation_id: Uuid) -> Result<KnowledgeGraph> {
        let output = self.output_dir(conversation_id);
        tokio::task::spawn_blocking(move || graph::load_graph(&output)).await?
    }

    pub async fn graph_summary(&self, conversation_id: Uuid) -> Result<GraphSummary> {
        let output = self.output_dir(conversation_id);
        tokio::task::spawn_blocking(move || graph::load_summary(&output)).await?
    }
}
