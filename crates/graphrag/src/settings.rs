//! `settings.yaml` written into every workspace before indexing.

/// Renders the GraphRAG settings for the given chat and embedding models.
///
/// The API key is left as `${GRAPHRAG_API_KEY}` and resolved by GraphRAG from the process env.
pub fn settings_yaml(model: &str, embedding_model: &str) -> String {
    format!(
        r#"encoding_model: cl100k_base
skip_workflows: []

llm:
  api_key: ${{GRAPHRAG_API_KEY}}
  type: openai_chat
  model: {model}
  max_tokens: 4000
  temperature: 0.0
  request_timeout: 180.0

embeddings:
  async_mode: threaded
  llm:
    api_key: ${{GRAPHRAG_API_KEY}}
    type: openai_embedding
    model: {embedding_model}
    request_timeout: 180.0

input:
  type: file
  file_type: text
  base_dir: "input"
  encoding: utf-8

storage:
  type: file
  base_dir: "output"

cache:
  type: file
  base_dir: "cache"

chunks:
  size: 300
  overlap: 50
  group_by_columns: [id]

entity_extraction:
  max_gleanings: 1
  entity_types: [organization, person, location, event, concept, technology, law, regulation]

claim_extraction:
  enabled: false

community_reports:
  max_length: 1500

local_search:
  text_unit_prop: 0.5
  community_prop: 0.25
  conversation_history_max_turns: 5
  top_k_entities: 10
  top_k_relationships: 10
  max_tokens: 8000

global_search:
  max_tokens: 8000
  data_max_tokens: 8000
  map_max_tokens: 4000
  reduce_max_tokens: 4000"#
    )
}
