use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pbifix",
    version,
    about = "Scan and fix Power BI reports and semantic models"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        long,
        global = true,
        help = "Fabric workspace name or ID for remote reports, models and items"
    )]
    pub workspace: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run several fixers in catalogue order
    Run {
        #[arg(long, help = "PBIR report folder, or report name/ID in the workspace")]
        report: String,
        #[arg(long, help = "Semantic model folder, model.bim, or name/ID")]
        model: Option<String>,
        #[arg(long, help = "Limit report fixers to one page (display name)")]
        page: Option<String>,
        #[arg(long, value_enum, default_value_t = RunMode::Fix)]
        mode: RunMode,
        #[arg(long = "fixer", value_enum)]
        fixers: Vec<FixerKind>,
        #[arg(long, help = "Select every fixer in the catalogue")]
        all: bool,
        #[arg(long, help = "Allow model fixers to write to the semantic model")]
        confirm_model_writes: bool,
        #[arg(long)]
        target_visual_type: Option<String>,
    },
    /// Individual report fixers
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Individual semantic model fixers
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },
    /// Thin (live-connected) report helpers
    Thin {
        #[command(subcommand)]
        command: ThinCommands,
    },
    /// Fabric workspace items
    Items {
        #[command(subcommand)]
        command: ItemCommands,
    },
    /// List the fixer catalogue
    Fixers,
}

#[derive(Args, Debug, Clone)]
pub struct ReportTarget {
    #[arg(long)]
    pub report: String,
    #[arg(long)]
    pub page: Option<String>,
    #[arg(long)]
    pub scan_only: bool,
}

#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    PieCharts {
        #[command(flatten)]
        target: ReportTarget,
        #[arg(long)]
        target_visual_type: Option<String>,
    },
    ColumnCharts {
        #[command(flatten)]
        target: ReportTarget,
    },
    BarCharts {
        #[command(flatten)]
        target: ReportTarget,
    },
    PageSize {
        #[command(flatten)]
        target: ReportTarget,
    },
    HideFilters {
        #[command(flatten)]
        target: ReportTarget,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ModelTarget {
    #[arg(long, required_unless_present = "report")]
    pub model: Option<String>,
    #[arg(long, help = "Resolve the model behind this report")]
    pub report: Option<String>,
    #[arg(long)]
    pub scan_only: bool,
}

#[derive(Subcommand, Debug)]
pub enum ModelCommands {
    DiscourageImplicitMeasures {
        #[command(flatten)]
        target: ModelTarget,
    },
    Calendar {
        #[command(flatten)]
        target: ModelTarget,
    },
    MeasureTable {
        #[command(flatten)]
        target: ModelTarget,
    },
    LastRefresh {
        #[command(flatten)]
        target: ModelTarget,
    },
    Units {
        #[command(flatten)]
        target: ModelTarget,
    },
    TimeIntelligence {
        #[command(flatten)]
        target: ModelTarget,
    },
}

#[derive(Subcommand, Debug)]
pub enum ThinCommands {
    Definition {
        #[arg(long)]
        report: String,
    },
    Perspective {
        #[arg(long)]
        report: String,
        #[arg(long, help = "Perspective name; omit to clear")]
        perspective: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ItemCommands {
    DataPipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    Graphql {
        #[command(subcommand)]
        command: GraphqlCommands,
    },
    KqlQueryset {
        #[command(subcommand)]
        command: CrudCommands,
    },
    MlExperiment {
        #[command(subcommand)]
        command: CrudCommands,
    },
    MirroredDatabase {
        #[command(subcommand)]
        command: MirroredCommands,
    },
    PrivateEndpoint {
        #[command(subcommand)]
        command: EndpointCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum CrudCommands {
    List,
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum PipelineCommands {
    List,
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        name: String,
    },
    Definition {
        name: String,
        #[arg(long, help = "Return the raw base64 parts instead of decoded JSON")]
        raw: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum GraphqlCommands {
    List,
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum MirroredCommands {
    List,
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Delete {
        name: String,
    },
    Status {
        name: String,
    },
    TablesStatus {
        name: String,
    },
    Start {
        name: String,
    },
    Stop {
        name: String,
    },
    Definition {
        name: String,
        #[arg(long)]
        raw: bool,
    },
    UpdateDefinition {
        name: String,
        #[arg(long, help = "JSON file with the new mirroring definition")]
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum EndpointCommands {
    List,
    Create {
        name: String,
        #[arg(long)]
        target_resource_id: String,
        #[arg(long)]
        target_subresource_type: String,
        #[arg(long)]
        request_message: Option<String>,
    },
    Delete {
        name: String,
    },
    Fqdns {
        name: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    Fix,
    Scan,
    ScanFix,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Fix => "fix",
            RunMode::Scan => "scan",
            RunMode::ScanFix => "scan-fix",
        }
    }
}

/// Fixer catalogue, declared in run order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FixerKind {
    PieCharts,
    BarCharts,
    ColumnCharts,
    PageSize,
    HideFilters,
    DiscourageImplicitMeasures,
    Calendar,
    MeasureTable,
    LastRefresh,
    Units,
    TimeIntelligence,
}

impl FixerKind {
    pub const ALL: [FixerKind; 11] = [
        FixerKind::PieCharts,
        FixerKind::BarCharts,
        FixerKind::ColumnCharts,
        FixerKind::PageSize,
        FixerKind::HideFilters,
        FixerKind::DiscourageImplicitMeasures,
        FixerKind::Calendar,
        FixerKind::MeasureTable,
        FixerKind::LastRefresh,
        FixerKind::Units,
        FixerKind::TimeIntelligence,
    ];

    pub fn is_model(&self) -> bool {
        matches!(
            self,
            FixerKind::DiscourageImplicitMeasures
                | FixerKind::Calendar
                | FixerKind::MeasureTable
                | FixerKind::LastRefresh
                | FixerKind::Units
                | FixerKind::TimeIntelligence
        )
    }

    pub fn slug(&self) -> &'static str {
        match self {
            FixerKind::PieCharts => "pie-charts",
            FixerKind::BarCharts => "bar-charts",
            FixerKind::ColumnCharts => "column-charts",
            FixerKind::PageSize => "page-size",
            FixerKind::HideFilters => "hide-filters",
            FixerKind::DiscourageImplicitMeasures => "discourage-implicit-measures",
            FixerKind::Calendar => "calendar",
            FixerKind::MeasureTable => "measure-table",
            FixerKind::LastRefresh => "last-refresh",
            FixerKind::Units => "units",
            FixerKind::TimeIntelligence => "time-intelligence",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            FixerKind::PieCharts => "Fix Pie Charts",
            FixerKind::BarCharts => "Fix Bar Charts",
            FixerKind::ColumnCharts => "Fix Column Charts",
            FixerKind::PageSize => "Fix Page Size",
            FixerKind::HideFilters => "Hide Visual Filters",
            FixerKind::DiscourageImplicitMeasures => "Discourage Implicit Measures",
            FixerKind::Calendar => "Add Calendar Table",
            FixerKind::MeasureTable => "Add Measure Table",
            FixerKind::LastRefresh => "Add Last Refresh Table",
            FixerKind::Units => "Add Units Calculation Group",
            FixerKind::TimeIntelligence => "Add Time Intelligence Calculation Group",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FixerKind::PieCharts => "Replace pie charts with a bar chart (or another visual type)",
            FixerKind::BarCharts => {
                "Hide axis titles, value axis and gridlines; show data labels on bar charts"
            }
            FixerKind::ColumnCharts => {
                "Hide axis titles, value axis and gridlines; show data labels on column charts"
            }
            FixerKind::PageSize => "Upgrade default 1280x720 pages to 1920x1080",
            FixerKind::HideFilters => "Hide every visual-level filter in view mode",
            FixerKind::DiscourageImplicitMeasures => "Set discourageImplicitMeasures on the model",
            FixerKind::Calendar => "Add the CalcCalendar table when no Time table exists",
            FixerKind::MeasureTable => "Add an empty 'Measure' table for measures",
            FixerKind::LastRefresh => "Add a hidden 'Last Refresh' table and measure",
            FixerKind::Units => "Add a 'Units' calculation group (Thousand, Million)",
            FixerKind::TimeIntelligence => {
                "Add a 'Time Intelligence' calculation group over the calendar table"
            }
        }
    }
}
