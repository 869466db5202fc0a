// src/config.rs
// Run configuration: env-driven knobs + the source-mix targets file.
// Everything is validated up front; a bad config never reaches the loop.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::Weekday;

use crate::catalog::SourceCategory;
use crate::error::RalphError;

const ENV_MIX_PATH: &str = "RALPH_SOURCE_MIX_PATH";

/// All knobs for one generation run.
#[derive(Debug, Clone)]
pub struct RalphConfig {
    /// Score at or above which the post publishes.
    pub quality_threshold: f64,
    /// Juice score below which the run is skipped, whatever the model said.
    pub juice_threshold: f64,
    pub timeout_minutes: u64,
    pub cost_limit_cents: u32,
    pub max_iterations: u32,
    /// Minimum usable source items; fewer than this aborts the run.
    pub min_items: usize,
    pub max_items: usize,
    pub freshness_window_hours: u64,
    /// Candidate pool size for the syndicated-news pre-screen.
    pub rss_pool_size: usize,
    pub prescreen_urgency_threshold: f64,
    /// Drafting/critique tier.
    pub model: String,
    /// Cheap tier for screening passes.
    pub screening_model: String,
    pub draft_max_tokens: u32,
    pub screening_max_tokens: u32,
    /// Skip the run when a post already exists for today.
    pub check_existing_today: bool,
    /// Posting weekdays; `None` means every day.
    pub posting_days: Option<Vec<Weekday>>,
    /// Desired item count per source category.
    pub source_mix: BTreeMap<SourceCategory, usize>,
}

impl Default for RalphConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 0.85,
            juice_threshold: 0.6,
            timeout_minutes: 30,
            cost_limit_cents: 100,
            max_iterations: 5,
            min_items: 3,
            max_items: 5,
            freshness_window_hours: 48,
            rss_pool_size: 12,
            prescreen_urgency_threshold: 0.7,
            model: "claude-sonnet-4-5".to_string(),
            screening_model: "claude-haiku-3-5".to_string(),
            draft_max_tokens: 4096,
            screening_max_tokens: 2048,
            check_existing_today: true,
            posting_days: None,
            source_mix: default_source_mix(),
        }
    }
}

fn default_source_mix() -> BTreeMap<SourceCategory, usize> {
    BTreeMap::from([(SourceCategory::Rss, 4), (SourceCategory::Evergreen, 1)])
}

impl RalphConfig {
    /// Read configuration from the environment, falling back to defaults for
    /// anything unset. Invalid values fail here, not mid-run.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self {
            quality_threshold: env_parse("RALPH_QUALITY_THRESHOLD", 0.85)?,
            juice_threshold: env_parse("RALPH_JUICE_THRESHOLD", 0.6)?,
            timeout_minutes: env_parse("RALPH_TIMEOUT_MINUTES", 30)?,
            cost_limit_cents: env_parse("RALPH_COST_LIMIT_CENTS", 100)?,
            max_iterations: env_parse("RALPH_MAX_ITERATIONS", 5)?,
            min_items: env_parse("RALPH_MIN_ITEMS", 3)?,
            max_items: env_parse("RALPH_MAX_ITEMS", 5)?,
            freshness_window_hours: env_parse("RALPH_FRESHNESS_WINDOW_HOURS", 48)?,
            rss_pool_size: env_parse("RALPH_RSS_POOL_SIZE", 12)?,
            prescreen_urgency_threshold: env_parse("RALPH_PRESCREEN_URGENCY", 0.7)?,
            model: env_string("RALPH_MODEL", "claude-sonnet-4-5"),
            screening_model: env_string("RALPH_SCREENING_MODEL", "claude-haiku-3-5"),
            draft_max_tokens: env_parse("RALPH_DRAFT_MAX_TOKENS", 4096)?,
            screening_max_tokens: env_parse("RALPH_SCREENING_MAX_TOKENS", 2048)?,
            check_existing_today: env_parse("RALPH_CHECK_EXISTING", true)?,
            posting_days: parse_posting_days(
                std::env::var("RALPH_POSTING_DAYS").ok().as_deref(),
            )?,
            source_mix: load_source_mix_default()?,
        };
        cfg.validate()?;
        // Pool must at least cover the rss target.
        let rss_target = cfg.source_mix.get(&SourceCategory::Rss).copied().unwrap_or(0);
        if cfg.rss_pool_size < rss_target {
            cfg.rss_pool_size = rss_target;
        }
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), RalphError> {
        if self.min_items < 1 {
            return Err(RalphError::Config("min_items must be >= 1".into()));
        }
        if self.max_items < self.min_items {
            return Err(RalphError::Config("max_items must be >= min_items".into()));
        }
        if self.timeout_minutes == 0 {
            return Err(RalphError::Config(
                "timeout_minutes must be greater than 0".into(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(RalphError::Config("max_iterations must be >= 1".into()));
        }
        for (name, value) in [
            ("quality_threshold", self.quality_threshold),
            ("juice_threshold", self.juice_threshold),
            ("prescreen_urgency_threshold", self.prescreen_urgency_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RalphError::Config(format!("{name} must be in [0, 1]")));
            }
        }
        Ok(())
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("invalid {key}={raw}: {e}")),
        _ => Ok(default),
    }
}

/// "mon,wed,fri" -> posting weekdays. Empty input means every day.
pub fn parse_posting_days(raw: Option<&str>) -> Result<Option<Vec<Weekday>>> {
    let raw = match raw {
        Some(r) if !r.trim().is_empty() => r,
        _ => return Ok(None),
    };
    let mut days = Vec::new();
    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let day = token
            .parse::<Weekday>()
            .map_err(|_| anyhow!("invalid posting day: {token}"))?;
        if !days.contains(&day) {
            days.push(day);
        }
    }
    Ok(if days.is_empty() { None } else { Some(days) })
}

// ------------------------------------------------------------
// Source mix file (TOML or JSON)
// ------------------------------------------------------------

/// Load the mix using env path + fallbacks:
/// 1) $RALPH_SOURCE_MIX_PATH
/// 2) config/source_mix.toml
/// 3) built-in default (4 rss + 1 evergreen)
pub fn load_source_mix_default() -> Result<BTreeMap<SourceCategory, usize>> {
    if let Ok(p) = std::env::var(ENV_MIX_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_source_mix_from(&pb);
        }
        return Err(anyhow!("RALPH_SOURCE_MIX_PATH points to non-existent path"));
    }
    let toml_p = PathBuf::from("config/source_mix.toml");
    if toml_p.exists() {
        return load_source_mix_from(&toml_p);
    }
    Ok(default_source_mix())
}

pub fn load_source_mix_from(path: &Path) -> Result<BTreeMap<SourceCategory, usize>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading source mix from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_source_mix(&content, &ext)
}

fn parse_source_mix(s: &str, hint_ext: &str) -> Result<BTreeMap<SourceCategory, usize>> {
    #[derive(serde::Deserialize)]
    struct MixFile {
        targets: BTreeMap<String, usize>,
    }

    let parsed: MixFile = if hint_ext == "json" {
        serde_json::from_str(s).context("parsing source mix json")?
    } else {
        toml::from_str(s).context("parsing source mix toml")?
    };

    let mut mix = BTreeMap::new();
    for (key, count) in parsed.targets {
        let category = SourceCategory::parse(&key)
            .ok_or_else(|| anyhow!("unknown source category in mix: {key}"))?;
        if count > 0 {
            mix.insert(category, count);
        }
    }
    if mix.is_empty() {
        return Err(anyhow!("source mix has no positive targets"));
    }
    Ok(mix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RalphConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_item_bounds_fail_fast() {
        let cfg = RalphConfig {
            min_items: 5,
            max_items: 3,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(RalphError::Config(_))));
    }

    #[test]
    fn out_of_range_threshold_fails_fast() {
        let cfg = RalphConfig {
            quality_threshold: 1.2,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn posting_days_parse_and_dedup() {
        let days = parse_posting_days(Some("mon, wed,mon,fri")).unwrap().unwrap();
        assert_eq!(days, vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);
        assert!(parse_posting_days(Some("")).unwrap().is_none());
        assert!(parse_posting_days(None).unwrap().is_none());
        assert!(parse_posting_days(Some("blursday")).is_err());
    }

    #[test]
    fn mix_parses_toml_and_json() {
        let toml_src = "[targets]\nrss = 3\nevergreen = 1\nvendor = 0\n";
        let mix = parse_source_mix(toml_src, "toml").unwrap();
        assert_eq!(mix.get(&SourceCategory::Rss), Some(&3));
        assert_eq!(mix.get(&SourceCategory::Evergreen), Some(&1));
        assert!(!mix.contains_key(&SourceCategory::Vendor), "zero targets drop out");

        let json_src = r#"{"targets": {"standards": 2}}"#;
        let mix = parse_source_mix(json_src, "json").unwrap();
        assert_eq!(mix.get(&SourceCategory::Standards), Some(&2));
    }

    #[test]
    fn mix_rejects_unknown_categories() {
        assert!(parse_source_mix("[targets]\npodcasts = 2\n", "toml").is_err());
    }

    #[serial_test::serial]
    #[test]
    fn from_env_reads_overrides() {
        let keys = [
            "RALPH_QUALITY_THRESHOLD",
            "RALPH_COST_LIMIT_CENTS",
            "RALPH_POSTING_DAYS",
            "RALPH_SOURCE_MIX_PATH",
        ];
        let saved: Vec<(&str, Option<String>)> =
            keys.iter().map(|k| (*k, std::env::var(k).ok())).collect();

        std::env::set_var("RALPH_QUALITY_THRESHOLD", "0.9");
        std::env::set_var("RALPH_COST_LIMIT_CENTS", "250");
        std::env::set_var("RALPH_POSTING_DAYS", "tue,thu");
        std::env::remove_var("RALPH_SOURCE_MIX_PATH");

        let cfg = RalphConfig::from_env().unwrap();
        assert!((cfg.quality_threshold - 0.9).abs() < 1e-9);
        assert_eq!(cfg.cost_limit_cents, 250);
        assert_eq!(cfg.posting_days, Some(vec![Weekday::Tue, Weekday::Thu]));

        std::env::set_var("RALPH_COST_LIMIT_CENTS", "not-a-number");
        assert!(RalphConfig::from_env().is_err());

        for (k, v) in saved {
            match v {
                Some(v) => std::env::set_var(k, v),
                None => std::env::remove_var(k),
            }
        }
    }
}
