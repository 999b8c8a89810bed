use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub connection_string: String,
    pub pool_size: usize,
    /// Open the student records database read-only.
    pub read_only: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FavoritesConfig {
    pub connection_string: String,
    pub seed_defaults: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "openai" or "ollama"
    pub model: String,   // Model name
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChartSettings {
    pub planner: String, // "heuristic" or "llm"
    pub palette: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub favorites: FavoritesConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub chart: ChartSettings,
}

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to the student records DuckDB file
    #[arg(long, value_name = "FILE")]
    pub database: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Defaults first so a partial file still deserializes
        let mut config_builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/nl-chart/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // NL_CHART__LLM__API_KEY, NL_CHART__WEB__PORT, ...
        config_builder = config_builder.add_source(
            Environment::with_prefix("NL_CHART")
                .prefix_separator("__")
                .separator("__"),
        );

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(database) = &args.database {
            config.database.connection_string = database.clone();
        }

        if config.llm.api_key.is_none() {
            config.llm.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        Ok(config)
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                connection_string: "alunos.duckdb".to_string(),
                pool_size: 5,
                read_only: false,
            },
            favorites: FavoritesConfig {
                connection_string: "favorites.duckdb".to_string(),
                seed_defaults: true,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                backend: "openai".to_string(),
                model: "gpt-4o".to_string(),
                api_key: None,
                api_url: None,
                temperature: 0.0,
                timeout_secs: 60,
            },
            chart: ChartSettings {
                planner: "heuristic".to_string(),
                palette: crate::pipeline::chart::default_palette(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_file_is_an_error() {
        let args = CliArgs {
            config: Some(PathBuf::from("does-not-exist.toml")),
            ..Default::default()
        };
        assert!(AppConfig::new(&args).is_err());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let path = std::env::temp_dir().join(format!("nl-chart-partial-{}.toml", std::process::id()));
        std::fs::write(&path, "[llm]\nbackend = \"ollama\"\nmodel = \"llama3\"\n").unwrap();

        let args = CliArgs {
            config: Some(path.clone()),
            ..Default::default()
        };
        let config = AppConfig::new(&args).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.llm.backend, "ollama");
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(config.web.port, 3000);
        assert_eq!(config.chart.planner, "heuristic");
    }

    #[test]
    fn cli_overrides_win() {
        let args = CliArgs {
            host: Some("0.0.0.0".to_string()),
            port: Some(8080),
            database: Some("other.duckdb".to_string()),
            ..Default::default()
        };
        let config = AppConfig::new(&args).unwrap();
        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.database.connection_string, "other.duckdb");
        assert_eq!(config.chart.palette.len(), 5);
        assert_eq!(config.chart.palette[0], "hsl(var(--chart-1))");
    }
}
