use crate::domain::constants::PAGE_SUFFIX;
use crate::domain::error::{FixError, FixResult};
use crate::services::definition::{DefinitionPart, DefinitionStore};
use serde_json::Value;
use std::collections::BTreeMap;

/// Open view over a report definition. Edits stay in memory until `commit`;
/// dropping the session discards them.
pub struct ReportSession {
    name: String,
    store: Box<dyn DefinitionStore>,
    parts: Vec<DefinitionPart>,
    edits: BTreeMap<String, Value>,
    readonly: bool,
}

impl ReportSession {
    pub fn open(store: Box<dyn DefinitionStore>, readonly: bool) -> FixResult<Self> {
        let parts = store.load()?;
        let name = store.label();
        tracing::debug!(report = %name, parts = parts.len(), readonly, "opened report");
        Ok(Self {
            name,
            store,
            parts,
            edits: BTreeMap::new(),
            readonly,
        })
    }

    pub fn report_name(&self) -> &str {
        &self.name
    }

    pub fn list_paths(&self) -> Vec<String> {
        self.parts.iter().map(|p| p.path.clone()).collect()
    }

    pub fn raw(&self, path: &str) -> FixResult<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.path == path)
            .map(|p| p.bytes.as_slice())
            .ok_or_else(|| FixError::NotFound(format!("part '{}' in report '{}'", path, self.name)))
    }

    pub fn get(&self, path: &str) -> FixResult<Value> {
        if let Some(edited) = self.edits.get(path) {
            return Ok(edited.clone());
        }
        let bytes = self.raw(path)?;
        serde_json::from_slice(bytes).map_err(|e| FixError::malformed(path, e.to_string()))
    }

    pub fn update(&mut self, path: &str, payload: Value) -> FixResult<()> {
        if self.readonly {
            return Err(FixError::ReadOnly(format!("update {path}")));
        }
        self.raw(path)?;
        tracing::info!(report = %self.name, path, "patched part");
        self.edits.insert(path.to_string(), payload);
        Ok(())
    }

    /// Maps a page display name to the folder id used in part paths.
    pub fn resolve_page_name(&self, display_name: &str) -> FixResult<String> {
        for path in self.list_paths() {
            let Some(dir) = path.strip_suffix(PAGE_SUFFIX) else {
                continue;
            };
            let page = self.get(&path)?;
            if page.get("displayName").and_then(Value::as_str) == Some(display_name) {
                let id = dir.rsplit('/').next().unwrap_or(dir);
                return Ok(id.to_string());
            }
        }
        Err(FixError::NotFound(format!(
            "page '{}' in report '{}'",
            display_name, self.name
        )))
    }

    pub fn is_dirty(&self) -> bool {
        !self.edits.is_empty()
    }

    /// Writes pending edits back to the store and returns the changed parts.
    pub fn commit(mut self) -> FixResult<Vec<DefinitionPart>> {
        if self.readonly || !self.is_dirty() {
            return Ok(vec![]);
        }
        let edits = std::mem::take(&mut self.edits);
        let mut changed = Vec::new();
        for (path, value) in edits {
            let bytes = serde_json::to_vec_pretty(&value)?;
            if let Some(part) = self.parts.iter_mut().find(|p| p.path == path) {
                part.bytes = bytes;
                changed.push(part.clone());
            }
        }
        let paths: Vec<String> = changed.iter().map(|p| p.path.clone()).collect();
        self.store.store(&self.parts, &paths)?;
        tracing::info!(report = %self.name, parts = paths.len(), "committed report");
        Ok(changed)
    }
}
