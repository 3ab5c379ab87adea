use crate::cli::{
    Cli, Commands, FixerKind, ModelCommands, ModelTarget, ReportCommands, ReportTarget,
    ThinCommands,
};
use crate::domain::models::{FixerRow, GeneralConfig, JsonOut, PerspectiveChange};
use crate::services::dispatch::{audit_write, execute_fixer, FixerContext};
use crate::services::output::{fix_report_lines, print_one, print_out, run_report_lines};
use crate::services::runner::{self, CancelToken, RunConfig};
use crate::services::thin::{get_thin_model_definition, set_thin_model_perspective};

fn report_context<'a>(
    cli: &Cli,
    cfg: &'a GeneralConfig,
    target: &ReportTarget,
) -> FixerContext<'a> {
    let mut ctx = FixerContext::new(cfg, cli.workspace.as_deref());
    ctx.report = Some(target.report.clone());
    ctx.page = target.page.clone();
    ctx
}

fn model_context<'a>(cli: &Cli, cfg: &'a GeneralConfig, target: &ModelTarget) -> FixerContext<'a> {
    let mut ctx = FixerContext::new(cfg, cli.workspace.as_deref());
    ctx.model = target.model.clone();
    ctx.report = target.report.clone();
    ctx
}

fn run_single(cli: &Cli, ctx: &FixerContext, kind: FixerKind, scan_only: bool) -> anyhow::Result<()> {
    let report = execute_fixer(ctx, kind, scan_only)?;
    print_one(cli.json, report, fix_report_lines)
}

pub fn handle_run_command(cli: &Cli, cfg: &GeneralConfig) -> anyhow::Result<bool> {
    let Commands::Run {
        report,
        model,
        page,
        mode,
        fixers,
        all,
        confirm_model_writes,
        target_visual_type,
    } = &cli.command
    else {
        return Ok(false);
    };

    let mut ctx = FixerContext::new(cfg, cli.workspace.as_deref());
    ctx.report = Some(report.clone());
    ctx.model = model.clone();
    ctx.page = page.clone();
    if let Some(t) = target_visual_type {
        ctx.target_visual_type = t.clone();
    }
    let config = RunConfig {
        mode: *mode,
        fixers: if *all {
            FixerKind::ALL.to_vec()
        } else {
            fixers.clone()
        },
        confirm_model_writes: *confirm_model_writes,
    };

    let cancel = CancelToken::new();
    cancel.register_signals()?;

    let report = runner::run(&config, &cancel, |kind, scan_only| {
        Ok(execute_fixer(&ctx, kind, scan_only)?)
    })?;
    let failed = report.errors > 0;
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonOut {
                ok: !failed,
                data: &report
            })?
        );
    } else {
        println!("{}", run_report_lines(&report));
    }
    if failed {
        std::process::exit(1);
    }
    Ok(true)
}

pub fn handle_report_commands(cli: &Cli, cfg: &GeneralConfig) -> anyhow::Result<bool> {
    let Commands::Report { command } = &cli.command else {
        return Ok(false);
    };

    match command {
        ReportCommands::PieCharts {
            target,
            target_visual_type,
        } => {
            let mut ctx = report_context(cli, cfg, target);
            if let Some(t) = target_visual_type {
                ctx.target_visual_type = t.clone();
            }
            run_single(cli, &ctx, FixerKind::PieCharts, target.scan_only)?;
        }
        ReportCommands::ColumnCharts { target } => {
            let ctx = report_context(cli, cfg, target);
            run_single(cli, &ctx, FixerKind::ColumnCharts, target.scan_only)?;
        }
        ReportCommands::BarCharts { target } => {
            let ctx = report_context(cli, cfg, target);
            run_single(cli, &ctx, FixerKind::BarCharts, target.scan_only)?;
        }
        ReportCommands::PageSize { target } => {
            let ctx = report_context(cli, cfg, target);
            run_single(cli, &ctx, FixerKind::PageSize, target.scan_only)?;
        }
        ReportCommands::HideFilters { target } => {
            let ctx = report_context(cli, cfg, target);
            run_single(cli, &ctx, FixerKind::HideFilters, target.scan_only)?;
        }
    }

    Ok(true)
}

pub fn handle_model_commands(cli: &Cli, cfg: &GeneralConfig) -> anyhow::Result<bool> {
    let Commands::Model { command } = &cli.command else {
        return Ok(false);
    };

    let (kind, target) = match command {
        ModelCommands::DiscourageImplicitMeasures { target } => {
            (FixerKind::DiscourageImplicitMeasures, target)
        }
        ModelCommands::Calendar { target } => (FixerKind::Calendar, target),
        ModelCommands::MeasureTable { target } => (FixerKind::MeasureTable, target),
        ModelCommands::LastRefresh { target } => (FixerKind::LastRefresh, target),
        ModelCommands::Units { target } => (FixerKind::Units, target),
        ModelCommands::TimeIntelligence { target } => (FixerKind::TimeIntelligence, target),
    };
    let ctx = model_context(cli, cfg, target);
    run_single(cli, &ctx, kind, target.scan_only)?;

    Ok(true)
}

pub fn handle_thin_commands(cli: &Cli, cfg: &GeneralConfig) -> anyhow::Result<bool> {
    let Commands::Thin { command } = &cli.command else {
        return Ok(false);
    };

    match command {
        ThinCommands::Definition { report } => {
            let mut ctx = FixerContext::new(cfg, cli.workspace.as_deref());
            ctx.report = Some(report.clone());
            let session = ctx.open_report(true)?;
            let entries = get_thin_model_definition(&session)?;
            print_out(cli.json, &entries, |e| {
                let kind = if e.is_binary { "raw" } else { "json" };
                format!("{}\t{}", e.file_name, kind)
            })?;
        }
        ThinCommands::Perspective {
            report,
            perspective,
        } => {
            let mut ctx = FixerContext::new(cfg, cli.workspace.as_deref());
            ctx.report = Some(report.clone());
            let mut session = ctx.open_report(false)?;
            let name = session.report_name().to_string();
            let connection_string = set_thin_model_perspective(&mut session, perspective.as_deref())?;
            let written = session.commit()?;
            audit_write("thin-perspective", &name, &written);
            let change = PerspectiveChange {
                report: name,
                perspective: perspective.clone(),
                connection_string,
            };
            print_one(cli.json, change, |c| {
                format!(
                    "{}\t{}\t{}",
                    c.report,
                    c.perspective.as_deref().unwrap_or("(none)"),
                    c.connection_string
                )
            })?;
        }
    }

    Ok(true)
}

pub fn handle_fixers_command(cli: &Cli) -> anyhow::Result<bool> {
    let Commands::Fixers = &cli.command else {
        return Ok(false);
    };
    let rows: Vec<FixerRow> = FixerKind::ALL
        .iter()
        .map(|k| FixerRow {
            name: k.slug().to_string(),
            scope: if k.is_model() { "model" } else { "report" }.to_string(),
            title: k.title().to_string(),
            description: k.description().to_string(),
        })
        .collect();
    print_out(cli.json, &rows, |r| {
        format!("{}\t{}\t{}", r.name, r.scope, r.description)
    })?;
    Ok(true)
}
