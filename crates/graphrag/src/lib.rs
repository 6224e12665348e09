//! # GraphRAG workspaces
//!
//! Each conversation owns an isolated knowledge base on disk. [`GraphRagService`] writes its
//! documents, generates `settings.yaml`, runs `graphrag index` / `graphrag query`, falls back to
//! keyword search, and exports the knowledge graph from the parquet artifacts.
//!
//! ## External interactions
//!
//! - **GraphRAG CLI**: spawned as a subprocess with the OpenAI key in its environment.
//! - **Filesystem**: `{data_dir}/{conversation_id}/`.

mod config;
mod error;
mod graph;
mod search;
mod service;
mod settings;
mod text;

pub use config::{GraphRagConfig, DEFAULT_GRAPHRAG_BIN};
pub use error::{GraphRagError, Result};
pub use graph::{
    entity_color, load_graph, load_summary, GraphEdge, GraphNode, GraphStats, GraphSummary,
    KnowledgeGraph, SampleRelationship, TopEntity,
};
pub use search::{keyword_search, DEFAULT_MAX_RESULTS};
pub use service::{
    GraphRagService, IndexReport, IndexStats, IndexingGuard, SavedDocument, SearchMethod,
};
pub use settings::settings_yaml;
pub use text::{input_file_name, prepare_content};
