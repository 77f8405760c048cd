//! Pieces shared by the commands that touch a keyboard layout.

use std::path::Path;

use chrono::Utc;
use isynth_core::StaticLocator;
use isynth_layout::source::LayoutChoice;
use isynth_layout::{GdbusLayoutQuery, KeyResolver, LayoutModel, LayoutRequest};

use crate::config::SynthConfig;
use crate::error::{Result, SynthError};

/// Pick, compile and wrap the session's layout.
pub fn load_resolver(config: &SynthConfig) -> Result<(KeyResolver, LayoutChoice)> {
    let request = LayoutRequest::from_env().with_explicit(config.layout.clone());
    let query = GdbusLayoutQuery::new(config.query_timeout);
    let (model, choice) = LayoutModel::load(&request, &query, config.backend)?;
    Ok((KeyResolver::new(model), choice))
}

/// Element bounds from a JSON object of id to `{x, y, width, height}`.
pub fn load_locator(path: &Path) -> Result<StaticLocator> {
    if !path.exists() {
        return Err(SynthError::MissingPath {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    let locator: StaticLocator = serde_json::from_str(&content)?;
    tracing::debug!(path = %path.display(), elements = locator.len(), "element map loaded");
    Ok(locator)
}

/// `inputsynth-<script stem>-<UTC timestamp>`.
#[must_use]
pub fn session_name(script: &Path) -> String {
    let stem = script
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("script");
    format!("inputsynth-{stem}-{}", Utc::now().format("%Y%m%dT%H%M%SZ"))
}
