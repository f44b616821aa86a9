//! Interactive setup and connection check
//!
//! `setup` asks for the connection settings, validates them against the live
//! instance and saves the config file. `check` only validates an existing config.

use crate::config::AgentConfig;
use anyhow::{bail, Context, Result};
use blocky_coordinator::{validate_connection, SetupError, ValidatedEntry};
use std::io::{BufRead, Write};
use std::path::Path;

pub struct SetupWizard;

impl SetupWizard {
    /// Prompt on stdin, validate, then save to `path`.
    pub async fn run(path: &Path) -> Result<()> {
        println!();
        println!("======================================");
        println!("   BLOCKY AGENT CONFIGURATION");
        println!("======================================");
        println!();

        let current = AgentConfig::load(path).await?;
        let config = {
            let stdin = std::io::stdin();
            let mut input = stdin.lock();
            let mut output = std::io::stdout();
            Self::prompt_config(&mut input, &mut output, &current)?
        };

        match Self::check(&config).await {
            Ok(entry) => {
                config
                    .save(path)
                    .await
                    .context("Failed to save configuration")?;
                println!();
                println!("Configuration for {} saved to {}", entry.title, path.display());
                Ok(())
            }
            Err(e) => {
                println!("Configuration not saved.");
                Err(e)
            }
        }
    }

    /// Validate `config` against the instance and print a summary.
    pub async fn check(config: &AgentConfig) -> Result<ValidatedEntry> {
        let coordinator_config = config.coordinator_config()?;
        let client = reqwest::Client::new();

        match validate_connection(&client, &coordinator_config).await {
            Ok(entry) => {
                for line in Self::summary_lines(config, &entry) {
                    println!("{}", line);
                }
                Ok(entry)
            }
            Err(e) => {
                println!("Connection check failed: {}", Self::explain(&e));
                Err(e.into())
            }
        }
    }

    pub fn summary_lines(config: &AgentConfig, entry: &ValidatedEntry) -> Vec<String> {
        let mut lines = vec![
            format!("Connected to {}", entry.title),
            format!("  Entry id:      {}", entry.entry_id),
            format!("  Scan interval: {}s", config.options.scan_interval_secs),
            format!("  Timeout:       {}s", config.options.timeout_secs),
        ];
        if config.metrics_enabled() {
            lines.push(format!("  Metrics:       port {}", config.metrics_port()));
        } else {
            lines.push("  Metrics:       disabled".to_string());
        }
        lines
    }

    fn explain(error: &SetupError) -> &'static str {
        match error {
            SetupError::CannotConnect(_) => {
                "cannot connect, check the host, the port and that the API is reachable"
            }
            SetupError::InvalidResponse(_) => {
                "the server answered but does not look like Blocky"
            }
        }
    }

    /// Ask for each connection field, keeping the current value on empty input.
    pub fn prompt_config<R: BufRead, W: Write>(
        input: &mut R,
        output: &mut W,
        current: &AgentConfig,
    ) -> Result<AgentConfig> {
        let mut config = current.clone();

        config.connection.host = Self::prompt(input, output, "Blocky host", &current.connection.host)?;
        config.connection.port =
            Self::prompt_number(input, output, "API port", current.connection.port)?;
        config.connection.metrics_enabled = Self::prompt_yes_no(
            input,
            output,
            "Enable Prometheus metrics",
            current.metrics_enabled(),
        )?;
        if config.connection.metrics_enabled {
            config.connection.metrics_port =
                Self::prompt_number(input, output, "Metrics port", current.metrics_port())?;
        }
        config.options.metrics_enabled = None;
        config.options.metrics_port = None;

        Ok(config)
    }

    fn read_line<R: BufRead>(input: &mut R) -> Result<String> {
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("Input closed before setup finished");
        }
        Ok(line.trim().to_string())
    }

    fn prompt<R: BufRead, W: Write>(
        input: &mut R,
        output: &mut W,
        label: &str,
        default: &str,
    ) -> Result<String> {
        write!(output, "{} [{}]: ", label, default)?;
        output.flush()?;
        let answer = Self::read_line(input)?;
        Ok(if answer.is_empty() { default.to_string() } else { answer })
    }

    fn prompt_number<R: BufRead, W: Write>(
        input: &mut R,
        output: &mut W,
        label: &str,
        default: u16,
    ) -> Result<u16> {
        loop {
            let answer = Self::prompt(input, output, label, &default.to_string())?;
            match answer.parse::<u16>() {
                Ok(port) if port > 0 => return Ok(port),
                _ => writeln!(output, "Please enter a port between 1 and 65535.")?,
            }
        }
    }

    fn prompt_yes_no<R: BufRead, W: Write>(
        input: &mut R,
        output: &mut W,
        label: &str,
        default: bool,
    ) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            write!(output, "{} [{}]: ", label, hint)?;
            output.flush()?;
            match Self::read_line(input)?.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(output, "Please enter 'y' or 'n'.")?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocky_devkit::TestHarness;
    use std::io::Cursor;

    #[test]
    fn test_prompt_config_reads_answers() {
        let mut input = Cursor::new("dns.lan\n4001\nmaybe\ny\n9110\n");
        let mut output = Vec::new();

        let config =
            SetupWizard::prompt_config(&mut input, &mut output, &AgentConfig::default()).unwrap();

        assert_eq!(config.connection.host, "dns.lan");
        assert_eq!(config.connection.port, 4001);
        assert!(config.metrics_enabled());
        assert_eq!(config.metrics_port(), 9110);
        assert!(String::from_utf8(output).unwrap().contains("Please enter 'y' or 'n'."));
    }

    #[test]
    fn test_prompt_config_keeps_defaults_on_empty_input() {
        let mut input = Cursor::new("\nabc\n\n\n");
        let mut output = Vec::new();
        let current = AgentConfig::default();

        let config = SetupWizard::prompt_config(&mut input, &mut output, &current).unwrap();
        assert_eq!(config, current);
    }

    #[tokio::test]
    async fn test_check_against_mock() {
        let harness = TestHarness::start().await.unwrap();
        let mut config = AgentConfig::default();
        config.connection.host = harness.host();
        config.connection.port = harness.port();

        let entry = SetupWizard::check(&config).await.unwrap();
        let lines = SetupWizard::summary_lines(&config, &entry);
        assert_eq!(lines[0], format!("Connected to Blocky ({}:{})", harness.host(), harness.port()));
        assert!(lines.last().unwrap().ends_with("disabled"));
    }
}
