pub const DEFAULT_API_BASE: &str = "https://api.fabric.microsoft.com/v1";
pub const DEFAULT_POWERBI_API_BASE: &str = "https://api.powerbi.com/v1.0/myorg";
pub const DEFAULT_TOKEN_ENV: &str = "FABRIC_TOKEN";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_POLLS: u32 = 60;
pub const DEFAULT_MAX_RETRY_AFTER_SECS: u64 = 30;
pub const DEFAULT_TARGET_VISUAL_TYPE: &str = "clusteredBarChart";

pub const VISUAL_SUFFIX: &str = "/visual.json";
pub const PAGE_SUFFIX: &str = "/page.json";
pub const REPORT_DEFINITION_FILE: &str = "definition.pbir";
pub const MODEL_DEFINITION_FILE: &str = "model.bim";
pub const PLATFORM_FILE: &str = ".platform";

/// Default 16:9 canvas written by Power BI Desktop.
pub const DEFAULT_PAGE_WIDTH: f64 = 1280.0;
pub const DEFAULT_PAGE_HEIGHT: f64 = 720.0;
pub const HD_PAGE_WIDTH: u64 = 1920;
pub const HD_PAGE_HEIGHT: u64 = 1080;

pub const PRIVATE_ENDPOINT_MESSAGE_MAX: usize = 140;
