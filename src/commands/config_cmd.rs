use clap::{Args, Subcommand};

use super::OutputFormat;
use crate::config::{Config, ConfigValue};

#[derive(Debug, Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

fn or_unset(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(not set)")
}

fn print_value<T: std::fmt::Display>(name: &str, value: &ConfigValue<T>) {
    println!("{}: {}", name, value.value);
    println!("  source: {}", value.source);
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        let data_dir = ConfigValue::new(
                            config.data_dir.value.display(),
                            config.data_dir.source.clone(),
                        );
                        print_value("data_dir", &data_dir);
                        println!();

                        println!("sync:");
                        println!("  server_url: {}", or_unset(&config.sync.server_url));
                        println!(
                            "  api_key: {}",
                            if config.sync.api_key.is_some() {
                                "(set)"
                            } else {
                                "(not set)"
                            }
                        );
                        println!("  auto_sync: {}", config.sync.auto_sync);
                        println!("  debounce_secs: {}", config.sync.debounce_secs);
                        println!("  request_timeout_secs: {}", config.sync.request_timeout_secs);
                        println!("  tie_break: {:?}", config.sync.tie_break);
                        println!();

                        println!("device:");
                        println!("  language: {}", or_unset(&config.device.language));
                        println!("  theme: {}", or_unset(&config.device.theme));
                        println!(
                            "  pin: {}",
                            if config.device.pin.is_some() {
                                "(set)"
                            } else {
                                "(not set)"
                            }
                        );
                        println!(
                            "  cloud_excluded_settings: {}",
                            config.device.cloud_excluded_settings.join(", ")
                        );
                    }
                }
                Ok(())
            }
        }
    }
}
