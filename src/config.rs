//! Application configuration.
//!
//! Everything the pipeline needs is gathered once at startup into an
//! [`AppConfig`] value and handed to each component at construction. Size
//! limits are compile-time constants; the content-scan heuristic and the
//! mail/paywall settings can be overridden from the environment (or a `.env`
//! file loaded through `dotenvy`).

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Maximum accepted upload size in megabytes
pub const MAX_SIZE_MB: u64 = 25;
/// Maximum number of data rows in a fully loaded dataset
pub const MAX_ROWS: usize = 1_000_000;
/// Maximum number of columns in a sampled or fully loaded dataset
pub const MAX_COLS: usize = 200;
/// Number of data rows read by the validator's sample parse
pub const SAMPLE_ROWS: usize = 500;

/// Extensions accepted by the upload validator
pub const ALLOWED_EXTENSIONS: [&str; 3] = [".csv", ".xlsx", ".xls"];
/// Macro-enabled workbook extensions, always rejected
pub const MACRO_EXTENSIONS: [&str; 3] = [".xlsm", ".xltm", ".xlam"];

const DEFAULT_FORMULA_TRIGGERS: [&str; 4] = ["=", "+", "-", "@"];
const DEFAULT_DANGEROUS_SUBSTRINGS: [&str; 9] = [
    "WEBSERVICE(",
    "HYPERLINK(",
    "EXEC(",
    "SHELL(",
    "cmd.exe",
    "powershell",
    "URLDownloadToFile",
    "Auto_Open",
    "Workbook_Open",
];

/// Hard limits applied to uploads and parsed datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Ceiling on the declared upload size, in bytes
    pub max_upload_bytes: u64,
    pub max_rows: usize,
    pub max_cols: usize,
    pub sample_rows: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_upload_bytes: MAX_SIZE_MB * 1024 * 1024,
            max_rows: MAX_ROWS,
            max_cols: MAX_COLS,
            sample_rows: SAMPLE_ROWS,
        }
    }
}

impl Limits {
    /// Upload ceiling expressed in whole megabytes, for user-facing messages
    pub fn max_upload_mb(&self) -> u64 {
        self.max_upload_bytes / (1024 * 1024)
    }
}

/// Tunable parameters of the suspicious-content density heuristic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Cell prefixes that make a spreadsheet evaluate the cell as a formula
    pub formula_triggers: Vec<String>,
    /// Substrings matched case-insensitively anywhere in a cell
    pub dangerous_substrings: Vec<String>,
    pub trigger_weight: u32,
    pub substring_weight: u32,
    /// Uploads whose weighted hits per sampled cell exceed this ratio are rejected
    pub density_threshold: f64,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            formula_triggers: DEFAULT_FORMULA_TRIGGERS.iter().map(|s| s.to_string()).collect(),
            dangerous_substrings: DEFAULT_DANGEROUS_SUBSTRINGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            trigger_weight: 1,
            substring_weight: 3,
            density_threshold: 0.1,
        }
    }
}

/// Outbound mail account used for report delivery and operator alerts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSettings {
    /// Sender address; also receives the BCC copy and blocked-upload alerts
    pub address: String,
    pub password: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub timeout_secs: u64,
}

impl MailSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Values rendered into the payment forms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaywallSettings {
    /// Public URL of this app; the processor redirects back here
    pub app_url: String,
    pub business_email: String,
    pub checkout_url: String,
    pub currency: String,
    pub single_item: String,
    pub single_price: String,
    pub subscription_item: String,
    pub subscription_price: String,
}

impl Default for PaywallSettings {
    fn default() -> Self {
        Self {
            app_url: "http://127.0.0.1:3000".to_string(),
            business_email: String::new(),
            checkout_url: "https://www.paypal.com/cgi-bin/webscr".to_string(),
            currency: "USD".to_string(),
            single_item: "SheetGenius Single Report".to_string(),
            single_price: "25.00".to_string(),
            subscription_item: "SheetGenius Unlimited Plan".to_string(),
            subscription_price: "100.00".to_string(),
        }
    }
}

/// Complete, read-only configuration of one running instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub limits: Limits,
    pub scan: ScanSettings,
    /// `None` when credentials are missing; email delivery is then skipped
    pub mail: Option<MailSettings>,
    pub paywall: PaywallSettings,
    pub bind_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            scan: ScanSettings::default(),
            mail: None,
            paywall: PaywallSettings::default(),
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    ///
    /// A `.env` file in the working directory is read first if present;
    /// variables already set in the environment take precedence.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    ///
    /// Unparseable numeric values fall back to their defaults. Blank values
    /// are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = AppConfig::default();

        let mail = match (get("EMAIL_ADDRESS"), get("EMAIL_PASSWORD")) {
            (Some(address), Some(password)) => Some(MailSettings {
                address,
                password,
                smtp_host: get("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                smtp_port: get("SMTP_PORT").and_then(|v| v.parse().ok()).unwrap_or(465),
                timeout_secs: get("SMTP_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            }),
            _ => None,
        };

        let mut scan = defaults.scan;
        if let Some(threshold) = get("SCAN_DENSITY_THRESHOLD").and_then(|v| v.parse::<f64>().ok()) {
            if (0.0..=1.0).contains(&threshold) {
                scan.density_threshold = threshold;
            }
        }

        let mut paywall = defaults.paywall;
        if let Some(url) = get("APP_URL") {
            paywall.app_url = url.trim_end_matches('/').to_string();
        }
        if let Some(business) = get("PAYPAL_BUSINESS_EMAIL") {
            paywall.business_email = business;
        }

        Self {
            limits: defaults.limits,
            scan,
            mail,
            paywall,
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
        }
    }
}
