use crate::domain::constants::REPORT_DEFINITION_FILE;
use crate::domain::error::{FixError, FixResult};
use crate::domain::models::DefinitionEntry;
use crate::services::report_session::ReportSession;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

pub fn get_thin_model_definition(session: &ReportSession) -> FixResult<Vec<DefinitionEntry>> {
    let mut entries = Vec::new();
    for path in session.list_paths() {
        let bytes = session.raw(&path)?;
        let entry = match serde_json::from_slice::<Value>(bytes) {
            Ok(content) => DefinitionEntry {
                file_name: path,
                content,
                is_binary: false,
            },
            Err(_) => match std::str::from_utf8(bytes) {
                Ok(text) => DefinitionEntry {
                    file_name: path,
                    content: Value::String(text.to_string()),
                    is_binary: true,
                },
                Err(_) => DefinitionEntry {
                    file_name: path,
                    content: Value::String(BASE64.encode(bytes)),
                    is_binary: true,
                },
            },
        };
        entries.push(entry);
    }
    Ok(entries)
}

/// Drops every `Cube=` token and appends the new perspective, if any.
pub fn apply_perspective(connection_string: &str, perspective: Option<&str>) -> String {
    let mut tokens: Vec<String> = connection_string
        .split(';')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| !t.to_ascii_lowercase().starts_with("cube="))
        .map(str::to_string)
        .collect();
    if let Some(p) = perspective.map(str::trim).filter(|p| !p.is_empty()) {
        tokens.push(format!("Cube={p}"));
    }
    tokens.join(";")
}

pub fn set_thin_model_perspective(
    session: &mut ReportSession,
    perspective: Option<&str>,
) -> FixResult<String> {
    let mut pbir = session.get(REPORT_DEFINITION_FILE)?;
    let current = pbir
        .pointer("/datasetReference/byConnection/connectionString")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            FixError::Precondition(format!(
                "{REPORT_DEFINITION_FILE} has no datasetReference.byConnection.connectionString; the report is not a thin report"
            ))
        })?;
    let updated = apply_perspective(current, perspective);
    if let Some(slot) = pbir.pointer_mut("/datasetReference/byConnection/connectionString") {
        *slot = Value::String(updated.clone());
    }
    session.update(REPORT_DEFINITION_FILE, pbir)?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::definition::memory::MemoryStore;
    use crate::services::definition::DefinitionPart;
    use serde_json::json;

    const CONN: &str = "Data Source=powerbi://api.powerbi.com/v1.0/myorg/WS;Initial Catalog=Sales;cube=Old;";

    #[test]
    fn perspective_replaces_cube_token_case_insensitively() {
        assert_eq!(
            apply_perspective(CONN, Some("Finance")),
            "Data Source=powerbi://api.powerbi.com/v1.0/myorg/WS;Initial Catalog=Sales;Cube=Finance"
        );
        assert_eq!(
            apply_perspective(CONN, None),
            "Data Source=powerbi://api.powerbi.com/v1.0/myorg/WS;Initial Catalog=Sales"
        );
    }

    #[test]
    fn set_perspective_updates_pbir() {
        let store = MemoryStore::new(
            "Thin",
            &[(
                "definition.pbir",
                json!({"version": "4.0", "datasetReference": {"byConnection": {"connectionString": CONN}}}),
            )],
        );
        let mut s = ReportSession::open(Box::new(store.clone()), false).unwrap();
        set_thin_model_perspective(&mut s, Some("Sales View")).unwrap();
        s.commit().unwrap();
        let conn = store.json("definition.pbir")["datasetReference"]["byConnection"]
            ["connectionString"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(conn.ends_with(";Cube=Sales View"));
    }

    #[test]
    fn by_path_report_is_not_thin() {
        let store = MemoryStore::new(
            "Local",
            &[(
                "definition.pbir",
                json!({"datasetReference": {"byPath": {"path": "../Local.SemanticModel"}}}),
            )],
        );
        let mut s = ReportSession::open(Box::new(store), false).unwrap();
        let err = set_thin_model_perspective(&mut s, None).unwrap_err();
        assert_eq!(err.code(), "PRECONDITION");
    }

    #[test]
    fn non_json_parts_are_flagged_binary() {
        let store = MemoryStore::new("R", &[("definition.pbir", json!({"version": "4.0"}))]);
        store.parts.borrow_mut().push(DefinitionPart {
            path: "StaticResources/logo.png".into(),
            bytes: vec![0x89, 0x50, 0xff, 0x00],
        });
        let s = ReportSession::open(Box::new(store), true).unwrap();
        let entries = get_thin_model_definition(&s).unwrap();
        assert!(!entries[0].is_binary);
        assert!(entries[1].is_binary);
        assert_eq!(entries[1].content, json!("iVD/AA=="));
    }
}
