//! Bridge configuration
//!
//! Settings come from three places, later ones winning: the JSON platform
//! file, command line arguments, then `SLEEPIQ_*` environment variables.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Deserialize;
use sleepiq_client::{ClientConfig, Credentials, Side};
use sleepiq_sync::SyncConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default debounce window for `sendDelay`, in seconds
pub const DEFAULT_SEND_DELAY_SECS: f64 = 5.0;

/// Default status poll interval, in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 10.0;

/// Sleep Number foundation bridge
///
/// Logs in to SleepIQ, keeps the foundation state in sync and accepts
/// `on`/`off`/`status`/`wait` commands on stdin in place of a smart-home host.
#[derive(Parser, Debug, Default)]
#[command(name = "sleepiq-bridge")]
#[command(about = "Keep a Sleep Number foundation in step with a raised/flat switch")]
#[command(version)]
pub struct Args {
    /// JSON platform config file ({"email", "password", "sendDelay", ...})
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// SleepIQ account email
    #[arg(long)]
    pub email: Option<String>,

    /// SleepIQ account password
    #[arg(long)]
    pub password: Option<String>,

    /// Debounce window for commands, in seconds
    #[arg(short = 'd', long)]
    pub send_delay: Option<f64>,

    /// Status poll interval, in seconds
    #[arg(short = 'p', long)]
    pub poll_interval: Option<f64>,

    /// Side of the bed to control (L or R)
    #[arg(long)]
    pub side: Option<String>,

    /// Override the SleepIQ API root URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Only send at the end of each debounce window
    #[arg(long)]
    pub trailing_only: bool,

    /// Wait for the foundation to stop moving before each preset
    #[arg(long)]
    pub await_movement: bool,

    /// Log mode (silent, development, debug, json)
    #[arg(long)]
    pub log_mode: Option<String>,
}

/// Contents of the JSON platform config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    pub email: Option<String>,
    pub password: Option<String>,
    pub send_delay: Option<f64>,
    pub poll_interval: Option<f64>,
    pub side: Option<Side>,
    pub base_url: Option<String>,
}

impl PlatformConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid platform config JSON")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("In config file {}", path.display()))
    }
}

/// Fully resolved settings for one bridge run
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub credentials: Credentials,
    pub send_delay_secs: f64,
    pub poll_interval: Duration,
    pub side: Side,
    pub base_url: Option<String>,
    pub trailing_only: bool,
    pub await_movement: bool,
}

impl BridgeConfig {
    /// Resolve the configuration from the arguments and the process environment
    pub fn load(args: &Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => PlatformConfig::from_file(path)?,
            None => PlatformConfig::default(),
        };

        Self::resolve(file, args, |key| std::env::var(key).ok())
    }

    /// Merge file, arguments and environment (looked up through `env`)
    pub fn resolve(
        file: PlatformConfig,
        args: &Args,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let email = env("SLEEPIQ_EMAIL")
            .or_else(|| args.email.clone())
            .or(file.email)
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| anyhow!("Missing email: set \"email\" in the config, --email or SLEEPIQ_EMAIL"))?;

        let password = env("SLEEPIQ_PASSWORD")
            .or_else(|| args.password.clone())
            .or(file.password)
            .filter(|password| !password.is_empty())
            .ok_or_else(|| {
                anyhow!("Missing password: set \"password\" in the config, --password or SLEEPIQ_PASSWORD")
            })?;

        let send_delay_secs = match env("SLEEPIQ_SEND_DELAY") {
            Some(value) => value
                .parse()
                .context("Invalid SLEEPIQ_SEND_DELAY environment variable")?,
            None => args
                .send_delay
                .or(file.send_delay)
                .unwrap_or(DEFAULT_SEND_DELAY_SECS),
        };

        let poll_secs: f64 = match env("SLEEPIQ_POLL_INTERVAL") {
            Some(value) => value
                .parse()
                .context("Invalid SLEEPIQ_POLL_INTERVAL environment variable")?,
            None => args
                .poll_interval
                .or(file.poll_interval)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        };
        let poll_interval = Duration::try_from_secs_f64(poll_secs)
            .ok()
            .filter(|interval| !interval.is_zero())
            .ok_or_else(|| {
                anyhow!(
                    "Poll interval must be a positive number of seconds, got {}",
                    poll_secs
                )
            })?;

        let side = match env("SLEEPIQ_SIDE").or_else(|| args.side.clone()) {
            Some(name) => parse_side(&name)?,
            None => file.side.unwrap_or_default(),
        };

        let base_url = env("SLEEPIQ_BASE_URL")
            .or_else(|| args.base_url.clone())
            .or(file.base_url);

        Ok(Self {
            credentials: Credentials::new(email, password),
            send_delay_secs,
            poll_interval,
            side,
            base_url,
            trailing_only: args.trailing_only || env("SLEEPIQ_TRAILING_ONLY").is_some(),
            await_movement: args.await_movement || env("SLEEPIQ_AWAIT_MOVEMENT").is_some(),
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        match &self.base_url {
            Some(url) => ClientConfig::default().with_base_url(url.clone()),
            None => ClientConfig::default(),
        }
    }

    pub fn sync_config(&self) -> Result<SyncConfig> {
        let config = SyncConfig::from_send_delay_secs(self.send_delay_secs)?
            .with_poll_interval(self.poll_interval)
            .with_leading_edge(!self.trailing_only)
            .with_await_movement(self.await_movement)
            .with_side(self.side);

        config.validate()?;
        Ok(config)
    }

    pub fn print_summary(&self) {
        info!("Configuration:");
        info!("  Account: {}", self.credentials.username());
        info!("  Send delay: {}s", self.send_delay_secs);
        info!("  Poll interval: {}s", self.poll_interval.as_secs_f64());
        info!("  Side: {}", self.side);
        info!("  Trailing only: {}", self.trailing_only);
        info!("  Await movement: {}", self.await_movement);
        if let Some(url) = &self.base_url {
            info!("  API root: {}", url);
        }
    }
}

fn parse_side(name: &str) -> Result<Side> {
    match name.trim().to_ascii_lowercase().as_str() {
        "l" | "left" => Ok(Side::Left),
        "r" | "right" => Ok(Side::Right),
        _ => Err(anyhow!("Invalid side '{}'. Valid sides: L, R", name)),
    }
}
