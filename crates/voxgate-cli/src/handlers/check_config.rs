//! `check-config`: validate without starting anything.

use std::collections::BTreeMap;

use serde::Serialize;
use voxgate_core::Settings;

use crate::config::SettingsArgs;
use crate::error::CliError;

/// Settings as printed by `check-config`, with the public key redacted.
#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub settings: Settings,
    pub auth_enabled: bool,
    /// Credential count per pool. Secrets are never printed.
    pub tokens: BTreeMap<String, usize>,
    pub warnings: Vec<String>,
}

pub fn summarize(mut settings: Settings, tokens: &BTreeMap<String, Vec<String>>) -> ConfigSummary {
    let auth_enabled = settings.effective_public_key().is_some();
    if auth_enabled {
        settings.public_key = Some("***".to_string());
    }

    let counts: BTreeMap<String, usize> = tokens
        .iter()
        .map(|(pool, secrets)| (pool.clone(), secrets.len()))
        .collect();

    let mut warnings = Vec::new();
    if counts.is_empty() {
        warnings.push("no credentials loaded; upstream calls will fail".to_string());
    }
    for pool in counts.keys() {
        if !settings.token_pools.contains(pool) {
            warnings.push(format!("pool '{pool}' is not in token_pools and will never be used"));
        }
    }

    ConfigSummary {
        settings,
        auth_enabled,
        tokens: counts,
        warnings,
    }
}

pub async fn execute(args: SettingsArgs) -> Result<(), CliError> {
    let (settings, tokens) = super::resolve(args).await?;
    voxgate_core::validate_settings(&settings)?;

    let summary = summarize(settings, &tokens);
    let rendered = serde_json::to_string_pretty(&summary)
        .map_err(|e| CliError::Config(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_redacts_key_and_counts_tokens() {
        let mut settings = Settings::with_defaults();
        settings.public_key = Some("k3y".into());
        let tokens = BTreeMap::from([
            ("ssoBasic".to_string(), vec!["s1".to_string(), "s2".to_string()]),
            ("legacy".to_string(), vec!["s3".to_string()]),
        ]);

        let summary = summarize(settings, &tokens);
        assert!(summary.auth_enabled);
        assert_eq!(summary.settings.public_key.as_deref(), Some("***"));
        assert_eq!(summary.tokens["ssoBasic"], 2);
        assert_eq!(summary.warnings.len(), 1);
        assert!(summary.warnings[0].contains("legacy"));

        let rendered = serde_json::to_string(&summary).unwrap();
        assert!(!rendered.contains("k3y"));
        assert!(!rendered.contains("s1"));
    }

    #[test]
    fn test_summary_warns_without_tokens() {
        let summary = summarize(Settings::with_defaults(), &BTreeMap::new());
        assert!(!summary.auth_enabled);
        assert_eq!(summary.warnings.len(), 1);
    }
}
