use serde::{Deserialize, Serialize};

/// A discoverable, parameterized unit of UI to render.
///
/// Held in memory for the duration of a run, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub name: String,
    #[serde(default)]
    pub component_path: Option<String>,
}

impl Story {
    pub fn new(id: &str, title: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            name: name.to_string(),
            component_path: None,
        }
    }
}
