//! Bot configuration
//!
//! Loaded from TOML; secrets may come from the environment instead
//! (`TELEGRAM_TOKEN`, `TELEGRAM_CHAT_ID`). A missing file means defaults.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    analysis::{AnalysisSettings, DEFAULT_PERIODS, MIN_CANDLES},
    candle::Timeframe,
    dedup::DEFAULT_COOLDOWN_SECS,
    detectors::TouchEvaluator,
    notifier::telegram::DEFAULT_API_BASE,
    scheduler::SchedulerSettings,
    source::{BinanceMarket, BinanceSource, MarketDataSource, Watch},
    Period, Result, SignalError,
};

/// Env var naming the config file
pub const CONFIG_PATH_ENV: &str = "ENGULF_ALERT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "configs/engulf-alert.toml";

/// Largest kline window Binance serves in one request
pub const MAX_FETCH_LIMIT: usize = 1000;

/// Longest accepted cooldown (one year)
pub const MAX_COOLDOWN_SECS: u64 = 365 * 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    Binance,
    BinanceFutures,
}

impl Provider {
    pub fn market(self) -> BinanceMarket {
        match self {
            Provider::Binance => BinanceMarket::Spot,
            Provider::BinanceFutures => BinanceMarket::UsdFutures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstrumentConfig {
    pub symbol: String,
    #[serde(default)]
    pub provider: Provider,
}

impl InstrumentConfig {
    pub fn new(symbol: impl Into<String>, provider: Provider) -> Self {
        Self {
            symbol: symbol.into(),
            provider,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelegramConfig {
    pub token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            chat_id: None,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub instruments: Vec<InstrumentConfig>,
    pub timeframes: Vec<Timeframe>,
    pub ema_periods: Vec<Period>,
    /// Candles requested per fetch
    pub fetch_limit: usize,
    pub poll_interval_secs: u64,
    /// Pause after a pass that failed as a whole
    pub recovery_delay_secs: u64,
    pub cooldown_secs: u64,
    pub http_timeout_secs: u64,
    pub touch: TouchEvaluator,
    pub telegram: TelegramConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instruments: vec![InstrumentConfig::new("BTCUSDT", Provider::Binance)],
            timeframes: vec![Timeframe::M5, Timeframe::M15, Timeframe::H1],
            ema_periods: DEFAULT_PERIODS.to_vec(),
            fetch_limit: 500,
            poll_interval_secs: 60,
            recovery_delay_secs: 10,
            cooldown_secs: DEFAULT_COOLDOWN_SECS as u64,
            http_timeout_secs: 10,
            touch: TouchEvaluator::default(),
            telegram: TelegramConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// CLI path, else `$ENGULF_ALERT_CONFIG`, else [`DEFAULT_CONFIG_PATH`]
pub fn resolve_config_path(cli: Option<PathBuf>, env: Option<String>) -> PathBuf {
    cli.or_else(|| env.filter(|p| !p.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SignalError::InvalidConfig(e.to_string()))
    }

    /// Read `path`, or fall back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| SignalError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Overlay Telegram credentials from the environment; empty values are
    /// ignored
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(token) = get("TELEGRAM_TOKEN") {
            self.telegram.token = Some(token);
        }
        if let Some(chat_id) = get("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat_id);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.instruments.is_empty() {
            return Err(SignalError::InvalidConfig("no instruments configured".into()));
        }
        let mut seen = HashSet::new();
        for instrument in &self.instruments {
            if instrument.symbol.trim().is_empty() {
                return Err(SignalError::InvalidConfig("empty instrument symbol".into()));
            }
            if !seen.insert((instrument.symbol.as_str(), instrument.provider)) {
                return Err(SignalError::InvalidConfig(format!(
                    "instrument {} listed twice for {:?}",
                    instrument.symbol, instrument.provider
                )));
            }
        }
        if self.timeframes.is_empty() {
            return Err(SignalError::InvalidConfig("no timeframes configured".into()));
        }
        if self.ema_periods.is_empty() {
            return Err(SignalError::InvalidConfig("no EMA periods configured".into()));
        }
        if !(MIN_CANDLES..=MAX_FETCH_LIMIT).contains(&self.fetch_limit) {
            return Err(SignalError::OutOfRange {
                field: "fetch_limit",
                value: self.fetch_limit as f64,
                min: MIN_CANDLES as f64,
                max: MAX_FETCH_LIMIT as f64,
            });
        }
        if self.poll_interval_secs == 0 {
            return Err(SignalError::InvalidValue("poll_interval_secs must be > 0"));
        }
        if self.recovery_delay_secs == 0 {
            return Err(SignalError::InvalidValue("recovery_delay_secs must be > 0"));
        }
        if self.cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(SignalError::OutOfRange {
                field: "cooldown_secs",
                value: self.cooldown_secs as f64,
                min: 0.0,
                max: MAX_COOLDOWN_SECS as f64,
            });
        }
        if self.http_timeout_secs == 0 {
            return Err(SignalError::InvalidValue("http_timeout_secs must be > 0"));
        }
        Ok(())
    }

    pub fn scheduler_settings(&self) -> SchedulerSettings {
        SchedulerSettings {
            fetch_limit: self.fetch_limit,
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            recovery_delay: Duration::from_secs(self.recovery_delay_secs),
        }
    }

    pub fn analysis_settings(&self) -> AnalysisSettings {
        AnalysisSettings::new(self.ema_periods.clone()).with_touch(self.touch)
    }

    /// Saturates at [`MAX_COOLDOWN_SECS`] for unvalidated configs
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_secs.min(MAX_COOLDOWN_SECS) as i64)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// One watch per instrument; instruments on the same provider share a
    /// source (and its HTTP client)
    pub fn watches(&self) -> Result<Vec<Watch>> {
        let client = reqwest::Client::builder().timeout(self.http_timeout()).build()?;
        let mut sources: Vec<(Provider, Arc<dyn MarketDataSource>)> = Vec::new();

        let mut watches = Vec::with_capacity(self.instruments.len());
        for instrument in &self.instruments {
            let source = match sources.iter().find(|(p, _)| *p == instrument.provider) {
                Some((_, source)) => source.clone(),
                None => {
                    let source: Arc<dyn MarketDataSource> = Arc::new(BinanceSource::with_client(
                        client.clone(),
                        instrument.provider.market(),
                    ));
                    sources.push((instrument.provider, source.clone()));
                    source
                }
            };
            watches.push(Watch::new(instrument.symbol.trim(), source));
        }
        Ok(watches)
    }
}
