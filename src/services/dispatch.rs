use crate::cli::FixerKind;
use crate::domain::constants::REPORT_DEFINITION_FILE;
use crate::domain::error::{FixError, FixResult};
use crate::domain::models::{FixReport, GeneralConfig};
use crate::services::definition::{DefinitionPart, DefinitionStore, FolderStore};
use crate::services::fabric::{FabricClient, FabricStore, ItemKind};
use crate::services::model::{BimModel, SemanticModel};
use crate::services::model_fixers;
use crate::services::report_fixers::{self, ReportScope};
use crate::services::report_session::ReportSession;
use crate::services::storage::{audit, changed_parts_summary};
use serde_json::Value;
use std::path::Path;

/// Everything a fixer needs to find its report or model.
#[derive(Debug, Clone)]
pub struct FixerContext<'a> {
    pub cfg: &'a GeneralConfig,
    pub workspace: Option<String>,
    pub report: Option<String>,
    pub model: Option<String>,
    pub page: Option<String>,
    pub target_visual_type: String,
}

impl<'a> FixerContext<'a> {
    pub fn new(cfg: &'a GeneralConfig, workspace: Option<&str>) -> Self {
        Self {
            cfg,
            workspace: workspace
                .map(str::to_string)
                .or_else(|| cfg.default_workspace.clone()),
            report: None,
            model: None,
            page: None,
            target_visual_type: cfg.target_visual_type.clone(),
        }
    }

    pub fn remote(&self) -> FixResult<(FabricClient, String)> {
        let workspace = self.workspace.as_deref().ok_or_else(|| {
            FixError::InvalidInput(
                "remote targets need --workspace (or general.default_workspace)".to_string(),
            )
        })?;
        let client = FabricClient::from_config(self.cfg)?;
        let id = client.resolve_workspace_id(workspace)?;
        Ok((client, id))
    }

    pub fn report_store(&self) -> FixResult<Box<dyn DefinitionStore>> {
        let report = self
            .report
            .as_deref()
            .ok_or_else(|| FixError::InvalidInput("--report is required".to_string()))?;
        let path = Path::new(report);
        if path.is_dir() {
            return Ok(Box::new(FolderStore::open(path)?));
        }
        let (client, ws) = self.remote()?;
        Ok(Box::new(FabricStore::open(client, &ws, ItemKind::Report, report)?))
    }

    pub fn model_store(&self) -> FixResult<Box<dyn DefinitionStore>> {
        if let Some(model) = self.model.as_deref() {
            let path = Path::new(model);
            if path.exists() {
                return Ok(Box::new(FolderStore::open(path)?));
            }
            let (client, ws) = self.remote()?;
            return Ok(Box::new(FabricStore::open(
                client,
                &ws,
                ItemKind::SemanticModel,
                model,
            )?));
        }
        let report = self.report.as_deref().ok_or_else(|| {
            FixError::InvalidInput("pass --model, or --report to use its model".to_string())
        })?;
        let path = Path::new(report);
        if path.is_dir() {
            let rel = local_model_path(path)?;
            return Ok(Box::new(FolderStore::open(&path.join(rel))?));
        }
        let (client, ws) = self.remote()?;
        let report_id = client.resolve_item_id(&ws, ItemKind::Report, report)?;
        let dataset = client.resolve_dataset_from_report(&ws, &report_id)?;
        tracing::debug!(report, dataset = %dataset.dataset_id, "resolved model behind report");
        Ok(Box::new(FabricStore::open(
            client,
            &dataset.workspace_id,
            ItemKind::SemanticModel,
            &dataset.dataset_id,
        )?))
    }

    pub fn open_report(&self, readonly: bool) -> FixResult<ReportSession> {
        ReportSession::open(self.report_store()?, readonly)
    }
}

/// `datasetReference.byPath.path` of a local PBIR folder.
pub fn local_model_path(report_dir: &Path) -> FixResult<String> {
    let pbir_path = report_dir.join(REPORT_DEFINITION_FILE);
    let raw = std::fs::read(&pbir_path)
        .map_err(|_| FixError::NotFound(pbir_path.display().to_string()))?;
    let pbir: Value = serde_json::from_slice(&raw)
        .map_err(|e| FixError::malformed(REPORT_DEFINITION_FILE, e.to_string()))?;
    pbir.pointer("/datasetReference/byPath/path")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            FixError::Precondition(format!(
                "{} is not bound to a local model by path; pass --model",
                report_dir.display()
            ))
        })
}

fn run_report_fixer(
    ctx: &FixerContext,
    kind: FixerKind,
    session: &mut ReportSession,
    scan_only: bool,
) -> FixResult<FixReport> {
    let scope = ReportScope {
        page: ctx.page.as_deref(),
        scan_only,
    };
    match kind {
        FixerKind::PieCharts => {
            report_fixers::fix_pie_charts(session, scope, &ctx.target_visual_type)
        }
        FixerKind::BarCharts => report_fixers::fix_bar_charts(session, scope),
        FixerKind::ColumnCharts => report_fixers::fix_column_charts(session, scope),
        FixerKind::PageSize => report_fixers::fix_page_size(session, scope),
        FixerKind::HideFilters => report_fixers::fix_hide_visual_filters(session, scope),
        other => Err(FixError::InvalidInput(format!(
            "{} is not a report fixer",
            other.slug()
        ))),
    }
}

pub fn run_model_fixer(
    kind: FixerKind,
    model: &mut dyn SemanticModel,
    scan_only: bool,
) -> FixResult<FixReport> {
    match kind {
        FixerKind::DiscourageImplicitMeasures => {
            model_fixers::fix_discourage_implicit_measures(model, scan_only)
        }
        FixerKind::Calendar => model_fixers::add_calculated_calendar(model, scan_only),
        FixerKind::MeasureTable => model_fixers::add_measure_table(model, scan_only),
        FixerKind::LastRefresh => model_fixers::add_last_refresh_table(model, scan_only),
        FixerKind::Units => model_fixers::add_calc_group_units(model, scan_only),
        FixerKind::TimeIntelligence => {
            model_fixers::add_calc_group_time_intelligence(model, scan_only)
        }
        other => Err(FixError::InvalidInput(format!(
            "{} is not a model fixer",
            other.slug()
        ))),
    }
}

pub fn audit_write(action: &str, target: &str, written: &[DefinitionPart]) {
    if written.is_empty() {
        return;
    }
    audit(
        action,
        serde_json::json!({
            "target": target,
            "parts": changed_parts_summary(written),
        }),
    );
}

/// Runs `fix` and flushes its edits. Parts saved before a failure are
/// still returned so they can be audited.
fn apply_model_fixer(
    model: &mut BimModel,
    fix: impl FnOnce(&mut dyn SemanticModel) -> FixResult<FixReport>,
) -> (FixResult<FixReport>, Vec<DefinitionPart>) {
    let target: &mut dyn SemanticModel = &mut *model;
    let result = fix(target).and_then(|report| model.flush().map(|()| report));
    (result, model.committed().to_vec())
}

/// Opens the target, runs one fixer and commits what it changed.
///
/// Scan-only runs open the target read-only so nothing can be written.
pub fn execute_fixer(ctx: &FixerContext, kind: FixerKind, scan_only: bool) -> FixResult<FixReport> {
    if kind.is_model() {
        let mut model = BimModel::open(ctx.model_store()?, scan_only)?;
        let (result, written) =
            apply_model_fixer(&mut model, |m| run_model_fixer(kind, m, scan_only));
        let target = match &result {
            Ok(report) => report.target.clone(),
            Err(_) => SemanticModel::name(&model).to_string(),
        };
        audit_write(kind.slug(), &target, &written);
        return result;
    }
    let mut session = ctx.open_report(scan_only)?;
    let report = run_report_fixer(ctx, kind, &mut session, scan_only)?;
    let written = session.commit()?;
    audit_write(kind.slug(), &report.target, &written);
    Ok(report)
}
