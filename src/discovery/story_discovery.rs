use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

use super::types::Story;
use crate::error_handling::types::DiscoveryError;

/// Published story index document of the preview server.
///
/// `index.json` (v4+) keys stories under `entries`; the legacy
/// `stories.json` (v3) keys them under `stories`. Both carry the same
/// per-entry shape for our purposes.
#[derive(Debug, Deserialize)]
struct IndexDocument {
    #[serde(default)]
    entries: HashMap<String, IndexEntry>,
    #[serde(default)]
    stories: HashMap<String, IndexEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "importPath", default)]
    import_path: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// Locates renderable stories, best-effort.
///
/// Cascade, in priority order:
/// 1. the preview server's published index (`/index.json`, then the
///    legacy `/stories.json`),
/// 2. a small hardcoded list of well-known story ids when the server
///    answers but publishes nothing,
/// 3. a heuristic scan of `*.stories.*` source files when the server is
///    unreachable.
///
/// Every failure path degrades to a smaller-but-valid result set;
/// nothing propagates to the controller.
pub struct StoryDiscovery {
    base_url: String,
    source_root: PathBuf,
    client: Client,
}

impl StoryDiscovery {
    pub fn new(base_url: &str, source_root: &Path) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            source_root: source_root.to_path_buf(),
            client,
        }
    }

    /// Polls the preview server root until it answers or the deadline passes.
    ///
    /// Returns false on expiry; callers proceed anyway (the discovery
    /// cascade still has the filesystem fallback).
    pub async fn wait_for_server(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.client.get(&self.base_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    info!("Preview server reachable at {}", self.base_url);
                    return true;
                }
                Ok(resp) => debug!("Preview server answered {}", resp.status()),
                Err(e) => debug!("Preview server not ready: {}", e),
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    "Preview server at {} not reachable within {:?}",
                    self.base_url, timeout
                );
                return false;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    /// Produces the story map for this run. Never fails; see the cascade above.
    pub async fn discover(&self) -> HashMap<String, Story> {
        match self.fetch_index().await {
            Ok(stories) if !stories.is_empty() => {
                info!("Discovered {} story(ies) from the preview server", stories.len());
                stories
            }
            Ok(_) => {
                warn!("Preview server published an empty story index, using fallback list");
                Self::fallback_stories()
            }
            Err(e) => {
                warn!("Story index fetch failed ({}), scanning source tree", e);
                match self.scan_source_tree() {
                    Ok(stories) if !stories.is_empty() => {
                        info!(
                            "Discovered {} story(ies) from source files under {}",
                            stories.len(),
                            self.source_root.display()
                        );
                        stories
                    }
                    Ok(_) => {
                        warn!("Source scan found no stories, using fallback list");
                        Self::fallback_stories()
                    }
                    Err(e) => {
                        warn!("Source scan failed ({}), using fallback list", e);
                        Self::fallback_stories()
                    }
                }
            }
        }
    }

    async fn fetch_index(&self) -> Result<HashMap<String, Story>, DiscoveryError> {
        for endpoint in ["index.json", "stories.json"] {
            let url = format!("{}/{}", self.base_url, endpoint);
            match self.client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    match resp.json::<IndexDocument>().await {
                        Ok(doc) => return Ok(Self::stories_from_index(doc)),
                        Err(e) => debug!("{} unparseable: {}", url, e),
                    }
                }
                Ok(resp) => {
                    debug!("{} answered {}", url, resp.status());
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    return Err(DiscoveryError::RequestFailed(e.to_string()));
                }
                Err(e) => {
                    debug!("{} request error: {}", url, e);
                }
            }
        }
        // Server reachable but no usable index: degraded, not an error
        Ok(HashMap::new())
    }

    fn stories_from_index(doc: IndexDocument) -> HashMap<String, Story> {
        let entries = if doc.entries.is_empty() {
            doc.stories
        } else {
            doc.entries
        };
        entries
            .into_values()
            .filter(|e| e.kind.as_deref() != Some("docs"))
            .map(|e| {
                (
                    e.id.clone(),
                    Story {
                        id: e.id,
                        title: e.title,
                        name: e.name,
                        component_path: e.import_path,
                    },
                )
            })
            .collect()
    }

    /// Degraded result set so downstream batch operations have something
    /// to iterate over during environment failures.
    pub fn fallback_stories() -> HashMap<String, Story> {
        [
            ("components-button--primary", "Components/Button", "Primary"),
            ("components-button--secondary", "Components/Button", "Secondary"),
            ("components-chip--default", "Components/Chip", "Default"),
            ("components-icon--default", "Components/Icon", "Default"),
            ("components-snackbar--default", "Components/Snackbar", "Default"),
        ]
        .into_iter()
        .map(|(id, title, name)| (id.to_string(), Story::new(id, title, name)))
        .collect()
    }

    /// Heuristic scan of `*.stories.*` files under the source root,
    /// extracting exported story identifiers by pattern matching on the
    /// source text.
    pub fn scan_source_tree(&self) -> Result<HashMap<String, Story>, DiscoveryError> {
        // CSF shape: `export const Primary: Story = {...}`
        let export_re = Regex::new(r"export\s+const\s+([A-Za-z_][A-Za-z0-9_]*)")
            .map_err(|e| DiscoveryError::BadIndex(e.to_string()))?;
        let mut files = Vec::new();
        Self::collect_story_files(&self.source_root, &mut files)
            .map_err(DiscoveryError::SourceScanFailed)?;

        let mut stories = HashMap::new();
        for path in files {
            let component = match Self::component_name(&path) {
                Some(name) => name,
                None => continue,
            };
            let text = match fs::read_to_string(&path) {
                Ok(t) => t,
                Err(e) => {
                    debug!("Skipping unreadable story file {}: {}", path.display(), e);
                    continue;
                }
            };
            for caps in export_re.captures_iter(&text) {
                let export = &caps[1];
                // Story exports are upper-camel by convention; skips `meta` and friends
                if !export.starts_with(|c: char| c.is_ascii_uppercase()) {
                    continue;
                }
                let id = format!("{}--{}", component, export.to_lowercase());
                stories.insert(
                    id.clone(),
                    Story {
                        id,
                        title: component.clone(),
                        name: export.to_string(),
                        component_path: Some(path.display().to_string()),
                    },
                );
            }
        }
        Ok(stories)
    }

    fn collect_story_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("Dir entry error under {}: {}", dir.display(), e);
                    continue;
                }
            };
            let path = entry.path();
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if path.is_dir() {
                if name == "node_modules" || name.starts_with('.') {
                    continue;
                }
                if let Err(e) = Self::collect_story_files(&path, out) {
                    debug!("Skipping unreadable dir {}: {}", path.display(), e);
                }
            } else if name.contains(".stories.") {
                out.push(path);
            }
        }
        Ok(())
    }

    fn component_name(path: &Path) -> Option<String> {
        let file_name = path.file_name()?.to_string_lossy();
        let component = file_name.split(".stories.").next()?;
        if component.is_empty() {
            return None;
        }
        Some(component.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fallback_stories_nonempty() {
        let stories = StoryDiscovery::fallback_stories();
        assert!(!stories.is_empty());
        assert!(stories.contains_key("components-button--primary"));
    }

    #[test]
    fn test_scan_extracts_exported_stories() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("Button");
        fs::create_dir_all(&sub).unwrap();
        fs::write(
            sub.join("Button.stories.tsx"),
            r#"
import type { Meta, StoryObj } from '@storybook/react';
const meta = { title: 'Components/Button' };
export default meta;
export const Primary: Story = { args: { variant: 'primary' } };
export const Disabled: Story = { args: { disabled: true } };
export const helper = () => null;
"#,
        )
        .unwrap();
        fs::write(sub.join("Button.tsx"), "export const Button = () => null;").unwrap();

        let discovery = StoryDiscovery::new("http://localhost:6006", dir.path());
        let stories = discovery.scan_source_tree().unwrap();
        assert_eq!(stories.len(), 2);
        assert!(stories.contains_key("button--primary"));
        assert!(stories.contains_key("button--disabled"));
        assert_eq!(stories["button--primary"].name, "Primary");
    }

    #[test]
    fn test_scan_skips_node_modules() {
        let dir = TempDir::new().unwrap();
        let nm = dir.path().join("node_modules").join("pkg");
        fs::create_dir_all(&nm).unwrap();
        fs::write(nm.join("X.stories.tsx"), "export const Hidden = {};").unwrap();

        let discovery = StoryDiscovery::new("http://localhost:6006", dir.path());
        let stories = discovery.scan_source_tree().unwrap();
        assert!(stories.is_empty());
    }

    #[test]
    fn test_index_document_entries_preferred() {
        let doc: IndexDocument = serde_json::from_str(
            r#"{"v":5,"entries":{"button--primary":{"id":"button--primary","title":"Button","name":"Primary","type":"story","importPath":"./src/Button.stories.tsx"},"button--docs":{"id":"button--docs","title":"Button","name":"Docs","type":"docs"}}}"#,
        )
        .unwrap();
        let stories = StoryDiscovery::stories_from_index(doc);
        assert_eq!(stories.len(), 1);
        assert_eq!(
            stories["button--primary"].component_path.as_deref(),
            Some("./src/Button.stories.tsx")
        );
    }

    #[test]
    fn test_index_document_legacy_stories_key() {
        let doc: IndexDocument = serde_json::from_str(
            r#"{"v":3,"stories":{"chip--default":{"id":"chip--default","title":"Chip","name":"Default"}}}"#,
        )
        .unwrap();
        let stories = StoryDiscovery::stories_from_index(doc);
        assert_eq!(stories.len(), 1);
        assert!(stories.contains_key("chip--default"));
    }
}
