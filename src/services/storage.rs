use crate::domain::models::ConfigFile;
use crate::services::definition::DefinitionPart;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

fn config_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")?;
    Ok(PathBuf::from(home).join(".config/pbifix"))
}

pub fn config_path() -> anyhow::Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

pub fn load_config() -> anyhow::Result<ConfigFile> {
    let path = match config_path() {
        Ok(p) => p,
        Err(_) => return Ok(ConfigFile::default()),
    };
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let raw = std::fs::read_to_string(&path)?;
    let cfg: ConfigFile = toml::from_str(&raw)?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(cfg)
}

/// Hex SHA-256 of a part payload, recorded in the audit log.
pub fn payload_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn changed_parts_summary(parts: &[DefinitionPart]) -> serde_json::Value {
    serde_json::Value::Array(
        parts
            .iter()
            .map(|p| {
                serde_json::json!({
                    "path": p.path,
                    "sha256": payload_digest(&p.bytes),
                })
            })
            .collect(),
    )
}

pub fn audit(action: &str, data: serde_json::Value) {
    let path = match config_dir() {
        Ok(d) => d.join("audit.jsonl"),
        Err(_) => return,
    };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let event = serde_json::json!({
        "ts": unix_now(),
        "action": action,
        "data": data
    });
    let line = format!("{}\n", event);
    let _ = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut f| std::io::Write::write_all(&mut f, line.as_bytes()));
}

fn unix_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    ts.to_string()
}
