//! Effective configuration output.

use perf_profiler::AppConfig;

use crate::cli::ConfigFormat;

/// Renders `config` in the requested format.
pub fn render_config(config: &AppConfig, format: &ConfigFormat) -> anyhow::Result<String> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Prints the effective configuration.
pub fn show_config(config: &AppConfig, format: &ConfigFormat) -> anyhow::Result<()> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_all_formats() {
        let config = AppConfig {
            log_level: Some("debug".into()),
            ..Default::default()
        };

        let yaml = render_config(&config, &ConfigFormat::Yaml).unwrap();
        assert!(yaml.contains("top_n_stats_per_category: 10"));

        let json = render_config(&config, &ConfigFormat::Json).unwrap();
        assert!(json.contains("\"periodic_interval_millis\": 20000"));

        let toml = render_config(&config, &ConfigFormat::Toml).unwrap();
        assert!(toml.contains("log_level = \"debug\""));
        assert!(toml.contains("[profiler]"));
    }
}
