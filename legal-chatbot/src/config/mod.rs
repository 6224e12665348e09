//! Application configuration: BaseConfig (server + log + DB) + AppExtensions (LLM, GraphRAG).

mod app_config;
mod base;
mod extensions;


pub use app_config::AppConfig;
pub use base::BaseConfig;
pub use extensions::{AppExtensions, GraphRagSettings};
