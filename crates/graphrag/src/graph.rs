//! Knowledge-graph export from GraphRAG parquet artifacts.
//!
//! Reads the entity and relationship tables (both the `create_final_*` names of older
//! GraphRAG releases and the plain names of newer ones) and shapes them for visualisation.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

use arrow_array::{Array, StringArray};
use arrow_schema::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Serialize;

use crate::error::{GraphRagError, Result};

pub const ENTITY_FILES: [&str; 2] = ["create_final_entities.parquet", "entities.parquet"];
pub const RELATIONSHIP_FILES: [&str; 2] =
    ["create_final_relationships.parquet", "relationships.parquet"];

const LABEL_CHARS: usize = 40;
const TOP_ENTITIES: usize = 10;
const TOP_DESCRIPTION_CHARS: usize = 200;
const SAMPLE_RELATIONSHIPS: usize = 15;
const DEFAULT_COLOR: &str = "#a0aec0";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub description: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relation_type: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub total_entities: usize,
    pub total_relationships: usize,
    pub entity_types: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub stats: GraphStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRelationship {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relation_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSummary {
    pub total_entities: usize,
    pub total_relationships: usize,
    pub entity_types: BTreeMap<String, usize>,
    pub top_entities: Vec<TopEntity>,
    pub sample_relationships: Vec<SampleRelationship>,
}

/// Display colour for an entity type (case-insensitive); grey for unknown types.
pub fn entity_color(entity_type: &str) -> &'static str {
    match entity_type.to_uppercase().as_str() {
        "PERSON" => "#48bb78",
        "ORGANIZATION" => "#4299e1",
        "LOCATION" => "#ed8936",
        "DATE" => "#f56565",
        "MONEY" => "#ecc94b",
        "LAW" => "#9f7aea",
        "DOCUMENT" => "#38b2ac",
        "CLAUSE" => "#667eea",
        "OBLIGATION" => "#ed64a6",
        "RIGHT" => "#68d391",
        "TERM" => "#fc8181",
        "CONDITION" => "#f6ad55",
        "EVENT" => "#4fd1c5",
        "CONCEPT" => "#b794f4",
        _ => DEFAULT_COLOR,
    }
}

/// A parquet table with its scalar columns rendered as strings.
#[derive(Debug, Default)]
struct Table {
    rows: usize,
    columns: HashMap<String, Vec<Option<String>>>,
}

impl Table {
    fn has(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    fn get(&self, column: &str, row: usize) -> Option<&str> {
        self.columns
            .get(column)
            .and_then(|values| values.get(row))
            .and_then(|v| v.as_deref())
    }

    /// First non-null value among `columns` for `row`.
    fn first_of(&self, columns: &[&str], row: usize) -> Option<&str> {
        columns.iter().find_map(|c| self.get(c, row))
    }

    fn value_counts(&self, column: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        if let Some(values) = self.columns.get(column) {
            for value in values.iter().flatten() {
                *counts.entry(value.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Reads every column that can be cast to `Utf8`; nested columns (lists, structs) are skipped.
fn read_table(path: &Path) -> Result<Table> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut table = Table::default();
    for batch in reader {
        let batch = batch?;
        let schema = batch.schema();
        for (index, field) in schema.fields().iter().enumerate() {
            let column = batch.column(index);
            if !arrow_cast::can_cast_types(column.data_type(), &DataType::Utf8) {
                continue;
            }
            let casted = arrow_cast::cast(column.as_ref(), &DataType::Utf8)?;
            let Some(strings) = casted.as_any().downcast_ref::<StringArray>() else {
                continue;
            };
            let values = table
                .columns
                .entry(field.name().clone())
                .or_insert_with(|| vec![None; table.rows]);
            for row in 0..strings.len() {
                values.push(if strings.is_null(row) {
                    None
                } else {
                    Some(strings.value(row).to_string())
                });
            }
        }
        table.rows += batch.num_rows();
    }
    Ok(table)
}

/// Locates an artifact in `output/` or its `artifacts/` subdirectory.
pub fn find_artifact(output_dir: &Path, candidates: &[&str]) -> Option<PathBuf> {
    let dirs = [output_dir.to_path_buf(), output_dir.join("artifacts")];
    dirs.iter()
        .flat_map(|dir| candidates.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn read_optional(output_dir: &Path, candidates: &[&str]) -> Result<Table> {
    match find_artifact(output_dir, candidates) {
        Some(path) => read_table(&path),
        None => Ok(Table::default()),
    }
}

fn entity_name(table: &Table, row: usize) -> String {
    table
        .first_of(&["name", "title"], row)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Entity_{}", row))
}

fn relation_type(table: &Table, row: usize) -> String {
    table
        .first_of(&["type", "description"], row)
        .unwrap_or("RELATED")
        .to_string()
}

/// Builds nodes and edges. Edges are joined to nodes by lower-cased entity name;
/// edges whose endpoints are unknown are dropped.
pub fn load_graph(output_dir: &Path) -> Result<KnowledgeGraph> {
    if !output_dir.is_dir() {
        return Err(GraphRagError::GraphNotFound(
            "Knowledge graph not found. Please build the index first.".to_string(),
        ));
    }
    let entities_path = find_artifact(output_dir, &ENTITY_FILES)
        .ok_or_else(|| GraphRagError::GraphNotFound("Entities file not found".to_string()))?;
    let entities = read_table(&entities_path)?;
    let relationships = read_optional(output_dir, &RELATIONSHIP_FILES)?;

    let mut nodes = Vec::with_capacity(entities.rows);
    let mut id_by_name: HashMap<String, String> = HashMap::new();
    for row in 0..entities.rows {
        let id = entities
            .get("id", row)
            .map(str::to_string)
            .unwrap_or_else(|| row.to_string());
        let name = entity_name(&entities, row);
        let entity_type = entities.get("type", row).unwrap_or("UNKNOWN").to_string();
        id_by_name.insert(name.to_lowercase(), id.clone());
        nodes.push(GraphNode {
            id,
            label: name.chars().take(LABEL_CHARS).collect(),
            color: entity_color(&entity_type).to_string(),
            full_name: name,
            entity_type,
            description: entities.get("description", row).unwrap_or_default().to_string(),
        });
    }

    let mut edges = Vec::new();
    for row in 0..relationships.rows {
        let source = relationships.get("source", row).unwrap_or_default().to_lowercase();
        let target = relationships.get("target", row).unwrap_or_default().to_lowercase();
        let (Some(source_id), Some(target_id)) = (id_by_name.get(&source), id_by_name.get(&target))
        else {
            continue;
        };
        let weight = relationships
            .get("weight", row)
            .and_then(|w| w.parse::<f64>().ok())
            .filter(|w| *w != 0.0 && !w.is_nan())
            .unwrap_or(1.0);
        edges.push(GraphEdge {
            source: source_id.clone(),
            target: target_id.clone(),
            relation_type: relation_type(&relationships, row),
            weight,
        });
    }

    let stats = GraphStats {
        total_entities: nodes.len(),
        total_relationships: edges.len(),
        entity_types: entities.value_counts("type"),
    };
    tracing::info!(
        nodes = stats.total_entities,
        edges = stats.total_relationships,
        "Loaded knowledge graph"
    );
    Ok(KnowledgeGraph {
        nodes,
        edges,
        stats,
    })
}

/// Counts, entity-type histogram, the ten entities with the longest descriptions,
/// and the first fifteen relationships.
pub fn load_summary(output_dir: &Path) -> Result<GraphSummary> {
    if !output_dir.is_dir() {
        return Err(GraphRagError::GraphNotFound(
            "Knowledge graph not found".to_string(),
        ));
    }
    let entities = read_optional(output_dir, &ENTITY_FILES)?;
    let relationships = read_optional(output_dir, &RELATIONSHIP_FILES)?;

    let mut top_entities = Vec::new();
    if entities.has("description") {
        let mut rows: Vec<(usize, usize)> = (0..entities.rows)
            .map(|row| {
                let len = entities
                    .get("description", row)
                    .map(|d| d.chars().count())
                    .unwrap_or(0);
                (row, len)
            })
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        top_entities = rows
            .into_iter()
            .take(TOP_ENTITIES)
            .map(|(row, _)| TopEntity {
                name: entities
                    .first_of(&["name", "title"], row)
                    .unwrap_or_default()
                    .to_string(),
                entity_type: entities.get("type", row).unwrap_or("UNKNOWN").to_string(),
                description: entities
                    .get("description", row)
                    .unwrap_or_default()
                    .chars()
                    .take(TOP_DESCRIPTION_CHARS)
                    .collect(),
            })
            .collect();
    }

    let sample_relationships = (0..relationships.rows.min(SAMPLE_RELATIONSHIPS))
        .map(|row| SampleRelationship {
            source: relationships.get("source", row).unwrap_or_default().to_string(),
            target: relationships.get("target", row).unwrap_or_default().to_string(),
            relation_type: relation_type(&relationships, row),
        })
        .collect();

    Ok(GraphSummary {
        total_entities: entities.rows,
        total_relationships: relationships.rows,
        entity_types: entities.value_counts("type"),
        top_entities,
        sample_relationships,
    })
}
