use crate::cli::{FixerKind, RunMode};
use crate::domain::error::{FixError, FixResult};
use crate::domain::models::{FixReport, RunReport, RunStatus, StepOutcome};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag, checked between fixer invocations.
#[derive(Clone, Default, Debug)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }

    /// Cancels on SIGINT or SIGTERM. A second signal exits with 130.
    pub fn register_signals(&self) -> std::io::Result<()> {
        for sig in [SIGINT, SIGTERM] {
            flag::register_conditional_shutdown(sig, 130, self.flag())?;
            flag::register(sig, self.flag())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: RunMode,
    pub fixers: Vec<FixerKind>,
    pub confirm_model_writes: bool,
}

/// Selected fixers in catalogue order: report fixers first, then model fixers.
pub fn ordered_fixers(selected: &[FixerKind]) -> Vec<FixerKind> {
    FixerKind::ALL
        .iter()
        .copied()
        .filter(|k| selected.contains(k))
        .collect()
}

pub fn validate(config: &RunConfig) -> FixResult<Vec<FixerKind>> {
    let fixers = ordered_fixers(&config.fixers);
    if fixers.is_empty() {
        return Err(FixError::InvalidInput(
            "select at least one fixer (--fixer or --all)".to_string(),
        ));
    }
    let writes = config.mode != RunMode::Scan;
    if writes && !config.confirm_model_writes && fixers.iter().any(FixerKind::is_model) {
        return Err(FixError::Precondition(
            "model fixers write to the semantic model; pass --confirm-model-writes".to_string(),
        ));
    }
    Ok(fixers)
}

/// Runs every selected fixer through `exec(kind, scan_only)`.
///
/// A failing fixer is recorded and the run moves on; cancellation is only
/// observed between steps.
pub fn run<F>(config: &RunConfig, cancel: &CancelToken, mut exec: F) -> FixResult<RunReport>
where
    F: FnMut(FixerKind, bool) -> anyhow::Result<FixReport>,
{
    let fixers = validate(config)?;
    let phases: &[bool] = match config.mode {
        RunMode::Fix => &[false],
        RunMode::Scan => &[true],
        RunMode::ScanFix => &[true, false],
    };
    let total = fixers.len();
    let mut steps = Vec::new();
    let mut errors = 0usize;
    let mut stopped = false;

    'phases: for &scan_only in phases {
        let phase = if scan_only { "scan" } else { "fix" };
        for (i, kind) in fixers.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(phase, step = i + 1, total, "run stopped");
                stopped = true;
                break 'phases;
            }
            tracing::info!(phase, step = i + 1, total, fixer = kind.slug(), "running fixer");
            let mut step = StepOutcome {
                index: i + 1,
                total,
                phase: phase.to_string(),
                fixer: kind.slug().to_string(),
                report: None,
                error: None,
            };
            match exec(*kind, scan_only) {
                Ok(report) => step.report = Some(report),
                Err(e) => {
                    tracing::error!(fixer = kind.slug(), error = %e, "fixer failed");
                    errors += 1;
                    step.error = Some(format!("{e:#}"));
                }
            }
            steps.push(step);
        }
    }

    let status = if stopped {
        RunStatus::Stopped
    } else if errors > 0 {
        RunStatus::CompletedWithErrors
    } else {
        match config.mode {
            RunMode::Scan => RunStatus::ScanComplete,
            RunMode::Fix => RunStatus::FixComplete,
            RunMode::ScanFix => RunStatus::ScanFixComplete,
        }
    };
    Ok(RunReport {
        mode: config.mode.as_str().to_string(),
        status,
        total,
        errors,
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: RunMode, fixers: Vec<FixerKind>, confirm: bool) -> RunConfig {
        RunConfig {
            mode,
            fixers,
            confirm_model_writes: confirm,
        }
    }

    fn ok(kind: FixerKind, scan_only: bool) -> anyhow::Result<FixReport> {
        Ok(FixReport::new(kind.slug(), "R", scan_only))
    }

    #[test]
    fn report_fixers_run_before_model_fixers() {
        let cfg = config(
            RunMode::Fix,
            vec![FixerKind::Units, FixerKind::PageSize, FixerKind::Calendar, FixerKind::PieCharts],
            true,
        );
        let mut seen = vec![];
        run(&cfg, &CancelToken::new(), |k, s| {
            seen.push(k);
            ok(k, s)
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![FixerKind::PieCharts, FixerKind::PageSize, FixerKind::Calendar, FixerKind::Units]
        );
    }

    #[test]
    fn empty_selection_is_invalid() {
        let err = run(&config(RunMode::Scan, vec![], false), &CancelToken::new(), ok).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn model_writes_need_confirmation_except_in_scan() {
        let fixers = vec![FixerKind::Units];
        let err = run(&config(RunMode::Fix, fixers.clone(), false), &CancelToken::new(), ok)
            .unwrap_err();
        assert_eq!(err.code(), "PRECONDITION");
        let r = run(&config(RunMode::Scan, fixers, false), &CancelToken::new(), ok).unwrap();
        assert_eq!(r.status, RunStatus::ScanComplete);
    }

    #[test]
    fn scan_fix_runs_two_phases_with_reset_index() {
        let cfg = config(RunMode::ScanFix, vec![FixerKind::PieCharts, FixerKind::PageSize], false);
        let r = run(&cfg, &CancelToken::new(), ok).unwrap();
        let trace: Vec<(String, usize)> = r.steps.iter().map(|s| (s.phase.clone(), s.index)).collect();
        assert_eq!(
            trace,
            vec![
                ("scan".to_string(), 1),
                ("scan".to_string(), 2),
                ("fix".to_string(), 1),
                ("fix".to_string(), 2)
            ]
        );
        assert_eq!(r.status, RunStatus::ScanFixComplete);
    }

    #[test]
    fn errors_are_recorded_and_the_loop_continues() {
        let cfg = config(RunMode::Fix, vec![FixerKind::PieCharts, FixerKind::PageSize], false);
        let r = run(&cfg, &CancelToken::new(), |k, s| {
            if k == FixerKind::PieCharts {
                anyhow::bail!("boom")
            }
            ok(k, s)
        })
        .unwrap();
        assert_eq!(r.errors, 1);
        assert_eq!(r.steps.len(), 2);
        assert_eq!(r.steps[0].error.as_deref(), Some("boom"));
        assert_eq!(r.status, RunStatus::CompletedWithErrors);
    }

    #[test]
    fn cancellation_between_steps_stops_the_run() {
        let cancel = CancelToken::new();
        let cfg = config(
            RunMode::ScanFix,
            vec![FixerKind::PieCharts, FixerKind::PageSize, FixerKind::HideFilters],
            false,
        );
        let token = cancel.clone();
        let r = run(&cfg, &cancel, |k, s| {
            token.flag().store(true, Ordering::SeqCst);
            ok(k, s)
        })
        .unwrap();
        assert_eq!(r.steps.len(), 1);
        assert_eq!(r.status, RunStatus::Stopped);
    }

    #[test]
    fn first_signal_cancels_without_exiting() {
        let cancel = CancelToken::new();
        cancel.register_signals().unwrap();
        assert!(!cancel.is_cancelled());
        signal_hook::low_level::raise(SIGTERM).unwrap();
        assert!(cancel.is_cancelled());
    }
}
