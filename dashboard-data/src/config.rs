//! Dashboard configuration.
//!
//! Every field can be overridden from the environment (see [`DashboardConfig::from_env`]),
//! falling back to the defaults below.

use chrono::NaiveDate;
use std::time::Duration;

/// Default first date of the ETF price window.
pub const DEFAULT_START_DATE: &str = "2025-01-01";

/// Default number of rows per short-sell table page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Dashboard configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardConfig {
    /// Base URL of the market data API server
    pub api_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Initial date range start shared by the ETF panels
    pub start_date: NaiveDate,
    /// Short-sell table rows per page
    pub page_size: usize,
    /// Bond regions compared by the spread panel (primary, secondary)
    pub bond_regions: (String, String),
    /// Initially selected option chain symbol
    pub option_symbol: String,
    /// Log file written by the terminal front end
    pub log_file: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:5000".to_string(),
            request_timeout: Duration::from_secs(10),
            start_date: default_start_date(),
            page_size: DEFAULT_PAGE_SIZE,
            bond_regions: ("US".to_string(), "JP".to_string()),
            option_symbol: "SPY".to_string(),
            log_file: "market-dashboard.log".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Create a new configuration with custom API URL
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Default::default()
        }
    }

    /// Build a configuration from environment variables, using defaults for anything unset
    /// or unparsable.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `DASHBOARD_API_URL` | `api_url` |
    /// | `DASHBOARD_TIMEOUT_SECS` | `request_timeout` |
    /// | `DASHBOARD_START_DATE` | `start_date` (`YYYY-MM-DD`) |
    /// | `DASHBOARD_PAGE_SIZE` | `page_size` |
    /// | `DASHBOARD_BOND_REGIONS` | `bond_regions` (`US,JP`) |
    /// | `DASHBOARD_OPTION_SYMBOL` | `option_symbol` |
    /// | `DASHBOARD_LOG_FILE` | `log_file` |
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("DASHBOARD_API_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = lookup("DASHBOARD_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(date) = lookup("DASHBOARD_START_DATE")
            .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
        {
            config.start_date = date;
        }
        if let Some(size) = lookup("DASHBOARD_PAGE_SIZE")
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|size| *size > 0)
        {
            config.page_size = size;
        }
        if let Some(regions) = lookup("DASHBOARD_BOND_REGIONS") {
            let mut parts = regions
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty());
            if let (Some(primary), Some(secondary)) = (parts.next(), parts.next()) {
                config.bond_regions = (primary, secondary);
            }
        }
        if let Some(symbol) = lookup("DASHBOARD_OPTION_SYMBOL") {
            config.option_symbol = symbol.trim().to_uppercase();
        }
        if let Some(file) = lookup("DASHBOARD_LOG_FILE") {
            config.log_file = file;
        }

        config
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set initial date range start
    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = start_date;
        self
    }

    /// Set short-sell table page size (zero is ignored)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        if page_size > 0 {
            self.page_size = page_size;
        }
        self
    }

    /// Set compared bond regions
    pub fn with_bond_regions(
        mut self,
        primary: impl Into<String>,
        secondary: impl Into<String>,
    ) -> Self {
        self.bond_regions = (primary.into(), secondary.into());
        self
    }

    /// Set initially selected option symbol
    pub fn with_option_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.option_symbol = symbol.into();
        self
    }

    /// Set log file path
    pub fn with_log_file(mut self, log_file: impl Into<String>) -> Self {
        self.log_file = log_file.into();
        self
    }
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default()
}
