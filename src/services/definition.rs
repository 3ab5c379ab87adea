use crate::domain::error::{FixError, FixResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// A single file of a report or semantic model definition.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionPart {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// Where a definition is loaded from and committed back to.
pub trait DefinitionStore {
    fn label(&self) -> String;
    fn load(&self) -> FixResult<Vec<DefinitionPart>>;
    /// `parts` is the full definition after edits, `changed` the paths edited.
    fn store(&self, parts: &[DefinitionPart], changed: &[String]) -> FixResult<()>;
}

pub struct FolderStore {
    root: PathBuf,
    only: Option<String>,
}

impl FolderStore {
    pub fn open(path: &Path) -> FixResult<Self> {
        if path.is_dir() {
            return Ok(Self {
                root: path.to_path_buf(),
                only: None,
            });
        }
        if path.is_file() {
            let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| FixError::InvalidInput(path.display().to_string()))?;
            return Ok(Self {
                root,
                only: Some(name),
            });
        }
        Err(FixError::NotFound(format!(
            "definition folder {}",
            path.display()
        )))
    }
}

impl DefinitionStore for FolderStore {
    fn label(&self) -> String {
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.root.display().to_string());
        name.trim_end_matches(".Report")
            .trim_end_matches(".SemanticModel")
            .to_string()
    }

    fn load(&self) -> FixResult<Vec<DefinitionPart>> {
        if let Some(only) = &self.only {
            let bytes = std::fs::read(self.root.join(only))?;
            return Ok(vec![DefinitionPart {
                path: only.clone(),
                bytes,
            }]);
        }
        let mut parts = Vec::new();
        collect_files(&self.root, &self.root, &mut parts)?;
        Ok(parts)
    }

    fn store(&self, parts: &[DefinitionPart], changed: &[String]) -> FixResult<()> {
        for part in parts.iter().filter(|p| changed.contains(&p.path)) {
            let dst = self.root.join(&part.path);
            if let Some(parent) = dst.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&dst, &part.bytes)?;
            tracing::debug!(path = %dst.display(), "wrote definition part");
        }
        Ok(())
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<DefinitionPart>) -> FixResult<()> {
    let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(root, &path, out)?;
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default();
        out.push(DefinitionPart {
            path: rel,
            bytes: std::fs::read(&path)?,
        });
    }
    Ok(())
}

/// Decodes the `definition.parts` array of a getDefinition response.
pub fn decode_parts(body: &Value) -> FixResult<Vec<DefinitionPart>> {
    let parts = body
        .pointer("/definition/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| FixError::malformed("definition", "response has no definition.parts"))?;
    parts
        .iter()
        .map(|p| {
            let path = p.get("path").and_then(Value::as_str).unwrap_or_default();
            let payload = p.get("payload").and_then(Value::as_str).unwrap_or_default();
            let bytes = BASE64
                .decode(payload)
                .map_err(|e| FixError::malformed(path, format!("invalid base64 payload: {e}")))?;
            Ok(DefinitionPart {
                path: path.to_string(),
                bytes,
            })
        })
        .collect()
}

pub fn encode_parts<'a>(parts: impl IntoIterator<Item = &'a DefinitionPart>) -> Value {
    let parts: Vec<Value> = parts
        .into_iter()
        .map(|p| {
            json!({
                "path": p.path,
                "payload": BASE64.encode(&p.bytes),
                "payloadType": "InlineBase64"
            })
        })
        .collect();
    json!({ "definition": { "parts": parts } })
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn folder_store_lists_relative_slash_paths_in_order() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("Sales.Report");
        std::fs::create_dir_all(root.join("definition/pages/p1")).unwrap();
        std::fs::write(root.join("definition.pbir"), "{}").unwrap();
        std::fs::write(root.join("definition/pages/p1/page.json"), "{}").unwrap();

        let store = FolderStore::open(&root).unwrap();
        assert_eq!(store.label(), "Sales");
        let paths: Vec<String> = store.load().unwrap().into_iter().map(|p| p.path).collect();
        assert_eq!(paths, vec!["definition.pbir", "definition/pages/p1/page.json"]);
    }

    #[test]
    fn folder_store_writes_only_changed_parts() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.json"), "1").unwrap();
        std::fs::write(tmp.path().join("b.json"), "2").unwrap();
        let store = FolderStore::open(tmp.path()).unwrap();

        let parts = vec![
            DefinitionPart {
                path: "a.json".into(),
                bytes: b"10".to_vec(),
            },
            DefinitionPart {
                path: "b.json".into(),
                bytes: b"20".to_vec(),
            },
        ];
        store.store(&parts, &["b.json".to_string()]).unwrap();
        assert_eq!(std::fs::read_to_string(tmp.path().join("a.json")).unwrap(), "1");
        assert_eq!(std::fs::read_to_string(tmp.path().join("b.json")).unwrap(), "20");
    }

    #[test]
    fn single_file_store_loads_only_that_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("model.bim"), "{}").unwrap();
        std::fs::write(tmp.path().join("other.txt"), "x").unwrap();
        let store = FolderStore::open(&tmp.path().join("model.bim")).unwrap();
        let parts = store.load().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].path, "model.bim");
    }

    #[test]
    fn inline_base64_parts_decode_back() {
        let part = DefinitionPart {
            path: "definition.pbir".into(),
            bytes: br#"{"version":"4.0"}"#.to_vec(),
        };
        let body = encode_parts([&part]);
        assert_eq!(body["definition"]["parts"][0]["payloadType"], "InlineBase64");
        assert_eq!(decode_parts(&body).unwrap(), vec![part]);
    }

    #[test]
    fn decode_rejects_missing_parts() {
        let err = decode_parts(&json!({"definition": {}})).unwrap_err();
        assert_eq!(err.code(), "MALFORMED");
    }
}
