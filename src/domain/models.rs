use crate::domain::constants::{
    DEFAULT_API_BASE, DEFAULT_MAX_POLLS, DEFAULT_MAX_RETRY_AFTER_SECS, DEFAULT_POWERBI_API_BASE,
    DEFAULT_TARGET_VISUAL_TYPE, DEFAULT_TIMEOUT_MS, DEFAULT_TOKEN_ENV,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize)]
pub struct JsonOut<T: Serialize> {
    pub ok: bool,
    pub data: T,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub ok: bool,
    pub error: ErrorBody,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Ok,
    NeedsFix,
    Fixed,
    Skipped,
    Blocked,
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingStatus::Ok => "ok",
            FindingStatus::NeedsFix => "needs_fix",
            FindingStatus::Fixed => "fixed",
            FindingStatus::Skipped => "skipped",
            FindingStatus::Blocked => "blocked",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub part: String,
    pub status: FindingStatus,
    pub detail: String,
}

/// Outcome of one fixer over one report or model.
#[derive(Debug, Clone, Serialize)]
pub struct FixReport {
    pub fixer: String,
    pub target: String,
    pub scan_only: bool,
    pub found: usize,
    pub needing_fix: usize,
    pub fixed: usize,
    pub findings: Vec<Finding>,
    pub summary: String,
}

impl FixReport {
    pub fn new(fixer: &str, target: &str, scan_only: bool) -> Self {
        Self {
            fixer: fixer.to_string(),
            target: target.to_string(),
            scan_only,
            found: 0,
            needing_fix: 0,
            fixed: 0,
            findings: vec![],
            summary: String::new(),
        }
    }

    pub fn push(&mut self, part: &str, status: FindingStatus, detail: impl Into<String>) {
        self.findings.push(Finding {
            part: part.to_string(),
            status,
            detail: detail.into(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Stopped,
    CompletedWithErrors,
    ScanComplete,
    FixComplete,
    ScanFixComplete,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub total: usize,
    pub phase: String,
    pub fixer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<FixReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: String,
    pub status: RunStatus,
    pub total: usize,
    pub errors: usize,
    pub steps: Vec<StepOutcome>,
}

#[derive(Serialize, Clone)]
pub struct FixerRow {
    pub name: String,
    pub scope: String,
    pub title: String,
    pub description: String,
}

/// One part of a report definition as returned by `thin definition`.
#[derive(Serialize, Debug, Clone)]
pub struct DefinitionEntry {
    pub file_name: String,
    pub content: Value,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_binary: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct PerspectiveChange {
    pub report: String,
    pub perspective: Option<String>,
    pub connection_string: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ItemRow {
    pub id: String,
    pub display_name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PrivateEndpointRow {
    pub id: String,
    pub name: String,
    pub target_private_link_resource_id: String,
    pub target_subresource_type: String,
    pub provisioning_state: String,
    pub connection_status: String,
    pub connection_description: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TableMirroringRow {
    pub source_schema_name: String,
    pub source_table_name: String,
    pub status: String,
    pub processed_bytes: i64,
    pub processed_rows: i64,
    pub last_sync_date_time: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct ItemAction {
    pub action: String,
    pub item: String,
    pub status: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub general: GeneralConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default)]
    pub default_workspace: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_powerbi_api_base")]
    pub powerbi_api_base: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    #[serde(default = "default_max_retry_after_secs")]
    pub max_retry_after_secs: u64,
    #[serde(default = "default_target_visual_type")]
    pub target_visual_type: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_workspace: None,
            api_base: default_api_base(),
            powerbi_api_base: default_powerbi_api_base(),
            token_env: default_token_env(),
            timeout_ms: default_timeout_ms(),
            max_polls: default_max_polls(),
            max_retry_after_secs: default_max_retry_after_secs(),
            target_visual_type: default_target_visual_type(),
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_powerbi_api_base() -> String {
    DEFAULT_POWERBI_API_BASE.to_string()
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_polls() -> u32 {
    DEFAULT_MAX_POLLS
}

fn default_max_retry_after_secs() -> u64 {
    DEFAULT_MAX_RETRY_AFTER_SECS
}

fn default_target_visual_type() -> String {
    DEFAULT_TARGET_VISUAL_TYPE.to_string()
}
