use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::config::{self, ConfigError};
use crate::core_service::{CoreService, ServiceError};
use crate::logging;
use crate::transport;

#[derive(Debug)]
pub enum RuntimeError {
    Config(ConfigError),
    Service(ServiceError),
    Io(String),
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(error) => write!(f, "config error: {error}"),
            Self::Service(error) => write!(f, "service error: {error}"),
            Self::Io(error) => write!(f, "io error: {error}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<ConfigError> for RuntimeError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<ServiceError> for RuntimeError {
    fn from(value: ServiceError) -> Self {
        Self::Service(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub config_path: Option<PathBuf>,
}

pub fn parse_cli_args(args: &[String]) -> Result<RuntimeOptions, String> {
    let mut options = RuntimeOptions::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--config requires a path".to_string())?;
                options.config_path = Some(PathBuf::from(value));
            }
            other => return Err(format!("unknown argument '{other}'")),
        }
    }

    Ok(options)
}

/// Serve newline-delimited JSON requests from the host launcher on stdin,
/// one response line per request on stdout.
pub fn run_with_options(options: RuntimeOptions) -> Result<(), RuntimeError> {
    if let Err(error) = logging::init() {
        eprintln!("[keyfind-core] logging unavailable: {error}");
    }

    let cfg = config::load(options.config_path.as_deref())?;
    if !cfg.config_path.exists() {
        config::save(&cfg)?;
        logging::info(&format!(
            "wrote default config to {}",
            cfg.config_path.display()
        ));
    }
    logging::info(&format!(
        "startup config_path={} max_results={} inactivity_lock_timeout_secs={}",
        cfg.config_path.display(),
        cfg.max_results,
        cfg.inactivity_lock_timeout_secs,
    ));

    let mut service = CoreService::new(cfg)?;
    serve(&mut service, std::io::stdin().lock(), std::io::stdout())
}

pub fn serve(
    service: &mut CoreService,
    input: impl BufRead,
    mut output: impl Write,
) -> Result<(), RuntimeError> {
    for line in input.lines() {
        let line = line.map_err(|e| RuntimeError::Io(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }

        let response = transport::handle_json(service, &line);
        writeln!(output, "{response}").map_err(|e| RuntimeError::Io(e.to_string()))?;
        output
            .flush()
            .map_err(|e| RuntimeError::Io(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_cli_args, RuntimeOptions};
    use std::path::PathBuf;

    #[test]
    fn parses_config_path_override() {
        let args = vec!["--config".to_string(), "/tmp/keyfind.toml".to_string()];
        assert_eq!(
            parse_cli_args(&args).unwrap(),
            RuntimeOptions {
                config_path: Some(PathBuf::from("/tmp/keyfind.toml")),
            }
        );
    }

    #[test]
    fn rejects_unknown_arguments() {
        let args = vec!["--bogus".to_string()];
        assert!(parse_cli_args(&args).is_err());
    }

    #[test]
    fn config_flag_requires_value() {
        let args = vec!["--config".to_string()];
        assert!(parse_cli_args(&args).is_err());
    }
}
