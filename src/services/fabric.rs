//! Blocking Fabric / Power BI REST client.
//!
//! Lists follow `continuationUri`; a `202 Accepted` with a `Location` header
//! is polled until the operation settles (honoring `Retry-After`).

use crate::domain::constants::PLATFORM_FILE;
use crate::domain::error::{FixError, FixResult};
use crate::domain::models::GeneralConfig;
use crate::services::definition::{decode_parts, encode_parts, DefinitionPart, DefinitionStore};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    DataPipeline,
    GraphQlApi,
    KqlQueryset,
    MlExperiment,
    MirroredDatabase,
    Report,
    SemanticModel,
}

impl ItemKind {
    pub fn segment(&self) -> &'static str {
        match self {
            ItemKind::DataPipeline => "dataPipelines",
            ItemKind::GraphQlApi => "GraphQLApis",
            ItemKind::KqlQueryset => "kqlQuerysets",
            ItemKind::MlExperiment => "mlExperiments",
            ItemKind::MirroredDatabase => "mirroredDatabases",
            ItemKind::Report => "reports",
            ItemKind::SemanticModel => "semanticModels",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ItemKind::DataPipeline => "data pipeline",
            ItemKind::GraphQlApi => "GraphQL API",
            ItemKind::KqlQueryset => "KQL queryset",
            ItemKind::MlExperiment => "ML experiment",
            ItemKind::MirroredDatabase => "mirrored database",
            ItemKind::Report => "report",
            ItemKind::SemanticModel => "semantic model",
        }
    }

    /// Main file of the item's definition, when it has a single one.
    pub fn definition_file(&self) -> Option<&'static str> {
        match self {
            ItemKind::DataPipeline => Some("pipeline-content.json"),
            ItemKind::MirroredDatabase => Some("mirroring.json"),
            ItemKind::SemanticModel => Some("model.bim"),
            _ => None,
        }
    }

    fn definition_query(&self) -> &'static str {
        match self {
            ItemKind::SemanticModel => "?format=TMSL",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRef {
    pub dataset_id: String,
    pub workspace_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    Running,
    Succeeded,
    Failed(String),
}

#[derive(Clone)]
pub struct FabricClient {
    http: Client,
    api_base: String,
    powerbi_base: String,
    token: String,
    max_polls: u32,
    max_retry_after_secs: u64,
}

pub fn is_guid(value: &str) -> bool {
    uuid::Uuid::parse_str(value.trim()).is_ok()
}

pub fn api_error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

pub fn operation_state(body: &Value) -> OperationState {
    match body.get("status").and_then(Value::as_str) {
        Some("Succeeded") => OperationState::Succeeded,
        Some("Failed") => OperationState::Failed(
            body.pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("long-running operation failed")
                .to_string(),
        ),
        _ => OperationState::Running,
    }
}

fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Seconds to wait before the next poll, capped at `max_secs`.
pub fn poll_delay(headers: &HeaderMap, max_secs: u64) -> u64 {
    retry_after(headers).unwrap_or(1).min(max_secs)
}

/// Concatenates `key` arrays across pages linked by `continuationUri`.
pub fn collect_pages(
    first: Value,
    key: &str,
    mut fetch_next: impl FnMut(&str) -> FixResult<Value>,
) -> FixResult<Vec<Value>> {
    let mut rows = Vec::new();
    let mut page = first;
    loop {
        if let Some(items) = page.get(key).and_then(Value::as_array) {
            rows.extend(items.iter().cloned());
        }
        let next = page
            .get("continuationUri")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        match next {
            Some(uri) => page = fetch_next(&uri)?,
            None => return Ok(rows),
        }
    }
}

/// Finds a row by id or `displayName`; returns `(id, displayName)`.
pub fn find_by_name_or_id(rows: &[Value], name_or_id: &str) -> Option<(String, String)> {
    let field = |row: &Value, key: &str| {
        row.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let by_id = is_guid(name_or_id);
    rows.iter()
        .find(|row| {
            if by_id {
                field(row, "id").eq_ignore_ascii_case(name_or_id)
            } else {
                field(row, "displayName") == name_or_id
            }
        })
        .map(|row| (field(row, "id"), field(row, "displayName")))
}

impl FabricClient {
    pub fn from_config(cfg: &GeneralConfig) -> FixResult<Self> {
        let token = std::env::var(&cfg.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                FixError::Precondition(format!(
                    "set {} to a Fabric bearer token for remote targets",
                    cfg.token_env
                ))
            })?;
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            powerbi_base: cfg.powerbi_api_base.trim_end_matches('/').to_string(),
            token,
            max_polls: cfg.max_polls,
            max_retry_after_secs: cfg.max_retry_after_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.api_base, path)
        }
    }

    fn send(&self, method: Method, path: &str, body: Option<&Value>) -> FixResult<Option<Value>> {
        let url = self.url(path);
        tracing::debug!(%method, %url, "fabric request");
        let mut req = self.http.request(method, &url).bearer_auth(&self.token);
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send()?;
        if resp.status() == StatusCode::ACCEPTED {
            let location = resp
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let delay = poll_delay(resp.headers(), self.max_retry_after_secs);
            return match location {
                Some(location) => self.wait_for_operation(&location, delay),
                None => Ok(None),
            };
        }
        read_json(resp)
    }

    fn wait_for_operation(&self, location: &str, first_delay: u64) -> FixResult<Option<Value>> {
        let mut delay = first_delay;
        for attempt in 1..=self.max_polls {
            std::thread::sleep(Duration::from_secs(delay));
            let resp = self.http.get(location).bearer_auth(&self.token).send()?;
            delay = poll_delay(resp.headers(), self.max_retry_after_secs);
            let body = read_json(resp)?.unwrap_or(Value::Null);
            tracing::debug!(attempt, location, "polled operation");
            match operation_state(&body) {
                OperationState::Running => continue,
                OperationState::Failed(message) => {
                    return Err(FixError::Api {
                        status: 200,
                        message,
                    })
                }
                OperationState::Succeeded => {
                    let result = self
                        .http
                        .get(format!("{location}/result"))
                        .bearer_auth(&self.token)
                        .send()?;
                    if result.status() == StatusCode::NOT_FOUND {
                        return Ok(None);
                    }
                    return read_json(result);
                }
            }
        }
        Err(FixError::Api {
            status: StatusCode::ACCEPTED.as_u16(),
            message: format!(
                "operation at {location} did not finish after {} polls",
                self.max_polls
            ),
        })
    }

    pub fn get(&self, path: &str) -> FixResult<Value> {
        Ok(self.send(Method::GET, path, None)?.unwrap_or(Value::Null))
    }

    pub fn post(&self, path: &str, body: Option<&Value>) -> FixResult<Option<Value>> {
        self.send(Method::POST, path, body)
    }

    pub fn delete(&self, path: &str) -> FixResult<()> {
        self.send(Method::DELETE, path, None)?;
        Ok(())
    }

    pub fn list(&self, path: &str, key: &str) -> FixResult<Vec<Value>> {
        let first = self.get(path)?;
        collect_pages(first, key, |uri| self.get(uri))
    }

    pub fn list_items(&self, workspace_id: &str, kind: ItemKind) -> FixResult<Vec<Value>> {
        self.list(
            &format!("/workspaces/{workspace_id}/{}", kind.segment()),
            "value",
        )
    }

    pub fn resolve_workspace_id(&self, name_or_id: &str) -> FixResult<String> {
        if is_guid(name_or_id) {
            return Ok(name_or_id.trim().to_string());
        }
        let rows = self.list("/workspaces", "value")?;
        find_by_name_or_id(&rows, name_or_id)
            .map(|(id, _)| id)
            .ok_or_else(|| FixError::NotFound(format!("workspace '{name_or_id}'")))
    }

    pub fn resolve_item(
        &self,
        workspace_id: &str,
        kind: ItemKind,
        name_or_id: &str,
    ) -> FixResult<(String, String)> {
        let rows = self.list_items(workspace_id, kind)?;
        find_by_name_or_id(&rows, name_or_id).ok_or_else(|| {
            FixError::NotFound(format!(
                "{} '{name_or_id}' in workspace {workspace_id}",
                kind.label()
            ))
        })
    }

    pub fn resolve_item_id(
        &self,
        workspace_id: &str,
        kind: ItemKind,
        name_or_id: &str,
    ) -> FixResult<String> {
        if is_guid(name_or_id) {
            return Ok(name_or_id.trim().to_string());
        }
        Ok(self.resolve_item(workspace_id, kind, name_or_id)?.0)
    }

    pub fn resolve_dataset_from_report(
        &self,
        workspace_id: &str,
        report_id: &str,
    ) -> FixResult<DatasetRef> {
        let body = self.get(&format!(
            "{}/groups/{workspace_id}/reports/{report_id}",
            self.powerbi_base
        ))?;
        let dataset_id = body
            .get("datasetId")
            .and_then(Value::as_str)
            .ok_or_else(|| FixError::NotFound(format!("semantic model behind report {report_id}")))?;
        let dataset_workspace = body
            .get("datasetWorkspaceId")
            .and_then(Value::as_str)
            .unwrap_or(workspace_id);
        Ok(DatasetRef {
            dataset_id: dataset_id.to_string(),
            workspace_id: dataset_workspace.to_string(),
        })
    }

    pub fn get_definition(
        &self,
        workspace_id: &str,
        kind: ItemKind,
        item_id: &str,
    ) -> FixResult<Vec<DefinitionPart>> {
        let path = format!(
            "/workspaces/{workspace_id}/{}/{item_id}/getDefinition{}",
            kind.segment(),
            kind.definition_query()
        );
        let body = self
            .post(&path, None)?
            .ok_or_else(|| FixError::malformed(&path, "empty definition response"))?;
        decode_parts(&body)
    }

    pub fn update_definition(
        &self,
        workspace_id: &str,
        kind: ItemKind,
        item_id: &str,
        parts: &[DefinitionPart],
    ) -> FixResult<()> {
        let body = encode_parts(parts.iter().filter(|p| p.path != PLATFORM_FILE));
        self.post(
            &format!(
                "/workspaces/{workspace_id}/{}/{item_id}/updateDefinition",
                kind.segment()
            ),
            Some(&body),
        )?;
        tracing::info!(kind = kind.label(), item_id, "updated definition");
        Ok(())
    }
}

fn read_json(resp: Response) -> FixResult<Option<Value>> {
    let status = resp.status();
    let text = resp.text()?;
    if !status.is_success() {
        return Err(FixError::Api {
            status: status.as_u16(),
            message: api_error_message(&text),
        });
    }
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&text)?))
}

/// A report or semantic model definition held in a Fabric workspace.
pub struct FabricStore {
    client: FabricClient,
    workspace_id: String,
    kind: ItemKind,
    item_id: String,
    label: String,
}

impl FabricStore {
    pub fn open(
        client: FabricClient,
        workspace_id: &str,
        kind: ItemKind,
        name_or_id: &str,
    ) -> FixResult<Self> {
        let (item_id, label) = client.resolve_item(workspace_id, kind, name_or_id)?;
        Ok(Self {
            client,
            workspace_id: workspace_id.to_string(),
            kind,
            item_id,
            label,
        })
    }
}

impl DefinitionStore for FabricStore {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn load(&self) -> FixResult<Vec<DefinitionPart>> {
        self.client
            .get_definition(&self.workspace_id, self.kind, &self.item_id)
    }

    fn store(&self, parts: &[DefinitionPart], _changed: &[String]) -> FixResult<()> {
        self.client
            .update_definition(&self.workspace_id, self.kind, &self.item_id, parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn poll_delay_is_capped() {
        let mut headers = HeaderMap::new();
        assert_eq!(poll_delay(&headers, 30), 1);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("86400"));
        assert_eq!(poll_delay(&headers, 30), 30);

        headers.insert(RETRY_AFTER, HeaderValue::from_static(" 5 "));
        assert_eq!(poll_delay(&headers, 30), 5);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"));
        assert_eq!(poll_delay(&headers, 30), 1);
    }

    #[test]
    fn pages_follow_continuation_uri() {
        let mut calls = vec![];
        let rows = collect_pages(
            json!({"value": [{"id": 1}], "continuationUri": "https://x/next"}),
            "value",
            |uri| {
                calls.push(uri.to_string());
                Ok(json!({"value": [{"id": 2}, {"id": 3}], "continuationUri": null}))
            },
        )
        .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(calls, vec!["https://x/next"]);
    }

    #[test]
    fn guid_passes_and_names_match_display_name() {
        let rows = vec![
            json!({"id": "11111111-2222-3333-4444-555555555555", "displayName": "Sales"}),
            json!({"id": "66666666-2222-3333-4444-555555555555", "displayName": "HR"}),
        ];
        assert_eq!(
            find_by_name_or_id(&rows, "HR").map(|r| r.0),
            Some("66666666-2222-3333-4444-555555555555".to_string())
        );
        assert_eq!(
            find_by_name_or_id(&rows, "11111111-2222-3333-4444-555555555555").map(|r| r.1),
            Some("Sales".to_string())
        );
        assert!(find_by_name_or_id(&rows, "sales").is_none());
        assert!(is_guid("11111111-2222-3333-4444-555555555555"));
        assert!(!is_guid("Sales"));
    }

    #[test]
    fn api_errors_prefer_structured_message() {
        assert_eq!(
            api_error_message(r#"{"errorCode":"ItemNotFound","message":"The item was not found"}"#),
            "The item was not found"
        );
        assert_eq!(
            api_error_message(r#"{"error":{"code":"X","message":"nested"}}"#),
            "nested"
        );
        assert_eq!(api_error_message("plain failure\n"), "plain failure");
    }

    #[test]
    fn operation_states() {
        assert_eq!(operation_state(&json!({"status": "Running"})), OperationState::Running);
        assert_eq!(operation_state(&json!({"status": "Succeeded"})), OperationState::Succeeded);
        assert_eq!(
            operation_state(&json!({"status": "Failed", "error": {"message": "bad"}})),
            OperationState::Failed("bad".into())
        );
    }

    #[test]
    fn missing_token_is_a_precondition() {
        let cfg = GeneralConfig {
            token_env: "PBIFIX_TEST_TOKEN_THAT_IS_NOT_SET".into(),
            ..GeneralConfig::default()
        };
        let err = FabricClient::from_config(&cfg).err().map(|e| e.code());
        assert_eq!(err, Some("PRECONDITION"));
    }

    #[test]
    fn semantic_models_request_tmsl() {
        assert_eq!(ItemKind::SemanticModel.definition_query(), "?format=TMSL");
        assert_eq!(ItemKind::GraphQlApi.segment(), "GraphQLApis");
    }
}
