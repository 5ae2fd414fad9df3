use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fmt;
use std::time::Duration;
use validator::Validate;

use crate::models::PricingProfile;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub email: EmailSettings,
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    /// Keyed by profile name, e.g. `dexcom_g6`.
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct EmailSettings {
    /// Operator mailbox; also the SMTP login.
    #[serde(default)]
    #[validate(email(message = "email.address is not a valid email address"))]
    pub address: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    #[validate(email(message = "email.recipient is not a valid email address"))]
    pub recipient: String,
    pub smtp_host: String,
    #[validate(range(min = 1, message = "email.smtp_port must be greater than 0"))]
    pub smtp_port: u16,
    /// STARTTLS on a plain connection instead of implicit TLS.
    pub use_starttls: bool,
    pub from_name: String,
}

// Hand-written so the mail credential never reaches a log line.
impl fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailSettings")
            .field("address", &self.address)
            .field("password", &"<redacted>")
            .field("recipient", &self.recipient)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("use_starttls", &self.use_starttls)
            .field("from_name", &self.from_name)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MonitorConfig {
    #[serde(default)]
    #[validate(length(min = 1, message = "at least one partition must be configured"))]
    pub partitions: Vec<String>,
    #[validate(range(min = 1, message = "monitor.poll_interval_secs must be greater than 0"))]
    pub poll_interval_secs: u64,
    #[validate(range(min = 1, message = "monitor.fetch_timeout_secs must be greater than 0"))]
    pub fetch_timeout_secs: u64,
    /// Marketplace root; `{partition}` is replaced by the partition id.
    pub base_url: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupConfig {
    pub capacity: Option<usize>,
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProfileConfig {
    /// Search phrase; defaults to the profile name with `_` as spaces.
    pub keyword: Option<String>,
    pub max_buy: Decimal,
    pub resale_avg: Decimal,
    #[validate(range(min = 0.0, max = 1.0, message = "margin must be a fraction between 0 and 1"))]
    pub margin: f64,
}

// Flat variables kept for existing deployments, mapped onto nested keys.
const FLAT_STRING_VARS: [(&str, &str); 3] = [
    ("MONITOR_EMAIL", "email.address"),
    ("MONITOR_EMAIL_PASSWORD", "email.password"),
    ("MONITOR_RECIPIENT", "email.recipient"),
];

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = env::vars().collect();
        Self::load(&vars)
    }

    /// Defaults, then `config/default.toml`, then `config/{RUN_MODE}.toml`,
    /// then `MONITOR__SECTION__KEY` variables, then the flat `MONITOR_*`
    /// variables.
    pub fn load(vars: &HashMap<String, String>) -> Result<Self> {
        let run_mode = vars
            .get("RUN_MODE")
            .cloned()
            .unwrap_or_else(|| "development".into());

        let builder = Config::builder()
            .set_default("email.smtp_host", "smtp.gmail.com")?
            .set_default("email.smtp_port", 465)?
            .set_default("email.use_starttls", false)?
            .set_default("email.from_name", "Marketplace Monitor")?
            .set_default("monitor.poll_interval_secs", 300)?
            .set_default("monitor.fetch_timeout_secs", 30)?
            .set_default("monitor.base_url", "https://{partition}.craigslist.org/")?
            .set_default("monitor.user_agent", "MarketplaceMonitor/0.1")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(
                Environment::with_prefix("MONITOR")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("monitor.partitions")
                    .try_parsing(true)
                    .source(Some(vars.clone())),
            );

        let config: AppConfig = Self::apply_flat_vars(builder, vars)?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn apply_flat_vars(
        mut builder: ConfigBuilder<DefaultState>,
        vars: &HashMap<String, String>,
    ) -> Result<ConfigBuilder<DefaultState>> {
        for (var, key) in FLAT_STRING_VARS {
            if let Some(value) = vars.get(var) {
                builder = builder.set_override(key, value.as_str())?;
            }
        }

        if let Some(list) = vars.get("MONITOR_PARTITIONS") {
            let partitions: Vec<String> = list
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            builder = builder.set_override("monitor.partitions", partitions)?;
        }

        if let Some(interval) = vars.get("MONITOR_POLL_INTERVAL") {
            let secs: i64 = interval.trim().parse().map_err(|_| {
                AppError::Config(format!(
                    "MONITOR_POLL_INTERVAL must be a whole number of seconds, got '{}'",
                    interval
                ))
            })?;
            builder = builder.set_override("monitor.poll_interval_secs", secs)?;
        }

        Ok(builder)
    }

    pub fn validate(&self) -> Result<()> {
        // Credentials first, so a bare environment reports what is missing
        // rather than a format complaint about an empty string.
        if self.email.address.trim().is_empty() {
            return Err(AppError::Config("MONITOR_EMAIL (email.address) is required".into()));
        }
        if self.email.password.is_empty() {
            return Err(AppError::Config(
                "MONITOR_EMAIL_PASSWORD (email.password) is required".into(),
            ));
        }
        if self.email.recipient.trim().is_empty() {
            return Err(AppError::Config(
                "MONITOR_RECIPIENT (email.recipient) is required".into(),
            ));
        }

        self.email.validate()?;
        self.monitor.validate()?;

        for partition in &self.monitor.partitions {
            if partition.is_empty() || !partition.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(AppError::Config(format!("Invalid partition id '{}'", partition)));
            }
        }

        if !self.monitor.base_url.contains("{partition}") {
            return Err(AppError::Config(
                "monitor.base_url must contain a {partition} placeholder".into(),
            ));
        }

        if self.profiles.is_empty() {
            return Err(AppError::Config("at least one pricing profile must be configured".into()));
        }

        for (name, profile) in &self.profiles {
            profile
                .validate()
                .map_err(|e| AppError::Config(format!("profile '{}': {}", name, e)))?;
            if profile.max_buy <= Decimal::ZERO {
                return Err(AppError::Config(format!("profile '{}': max_buy must be greater than 0", name)));
            }
            if profile.resale_avg < Decimal::ZERO {
                return Err(AppError::Config(format!("profile '{}': resale_avg cannot be negative", name)));
            }
        }

        if self.dedup.capacity == Some(0) {
            return Err(AppError::Config("dedup.capacity must be greater than 0 when set".into()));
        }
        if self.dedup.ttl_secs == Some(0) {
            return Err(AppError::Config("dedup.ttl_secs must be greater than 0 when set".into()));
        }
        self.dedup.ttl()?;

        Ok(())
    }

    pub fn pricing_profiles(&self) -> Vec<PricingProfile> {
        self.profiles
            .iter()
            .map(|(name, profile)| {
                let base = PricingProfile::new(name.clone(), profile.max_buy, profile.resale_avg, profile.margin);
                match &profile.keyword {
                    Some(keyword) => base.with_keyword(keyword.clone()),
                    None => base,
                }
            })
            .collect()
    }
}

impl DedupConfig {
    /// Seen-entry lifetime, if configured. Errors when `ttl_secs` does not
    /// fit a chrono duration.
    pub fn ttl(&self) -> Result<Option<chrono::Duration>> {
        self.ttl_secs
            .map(|secs| {
                i64::try_from(secs)
                    .ok()
                    .and_then(chrono::Duration::try_seconds)
                    .ok_or_else(|| AppError::Config(format!("dedup.ttl_secs {} is out of range", secs)))
            })
            .transpose()
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
