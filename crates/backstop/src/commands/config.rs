//! Config command

use anyhow::{anyhow, Result};
use backstop_core::config::{ConfigLoader, RetryDefaults};
use camino::Utf8Path;

use crate::cli::{ConfigCommands, ConfigInitArgs, ConfigShowArgs};
use crate::output;

pub fn run(cmd: ConfigCommands, config_dir: Option<&Utf8Path>) -> Result<()> {
    let loader = loader(config_dir)?;
    match cmd {
        ConfigCommands::Init(args) => init(&loader, args),
        ConfigCommands::Show(args) => show(&loader, args),
    }
}

/// Loader for `--config-dir`, or the default directory
pub fn loader(config_dir: Option<&Utf8Path>) -> Result<ConfigLoader> {
    Ok(match config_dir {
        Some(dir) => ConfigLoader::with_dir(dir.to_owned()),
        None => ConfigLoader::new()?,
    })
}

fn init(loader: &ConfigLoader, args: ConfigInitArgs) -> Result<()> {
    let path = loader.config_path();
    if path.exists() && !args.force {
        return Err(anyhow!(
            "File {} already exists. Use --force to overwrite.",
            path
        ));
    }

    std::fs::create_dir_all(loader.config_dir())?;
    std::fs::write(&path, ConfigLoader::embedded_defaults_yaml()?)?;

    output::success(&format!("Created {}", path));
    output::info("Environment variables (BACKSTOP_*) still take precedence");

    Ok(())
}

fn show(loader: &ConfigLoader, args: ConfigShowArgs) -> Result<()> {
    let config = loader.load()?;

    match args.action {
        Some(action) => {
            let defaults = config.for_action(&action);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&defaults)?);
            } else {
                output::header(&format!("Retry defaults for \"{}\"", action));
                print_defaults(&defaults);
            }
        }
        None => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("{}", serde_yaml_ng::to_string(&config)?);
            }
        }
    }

    Ok(())
}

fn print_defaults(defaults: &RetryDefaults) {
    output::kv("Max attempts", &defaults.max_attempts.to_string());
    output::kv("Timeout", &format_secs(defaults.timeout_secs));
    output::kv("Backoff factor", &defaults.backoff_factor.to_string());
    output::kv("Initial delay", &format!("{}ms", defaults.initial_delay_ms));
    output::kv(
        "Max delay",
        &match defaults.max_delay_ms {
            0 => "uncapped".to_string(),
            ms => format!("{}ms", ms),
        },
    );
    output::kv("Jitter", &defaults.jitter.to_string());
}

fn format_secs(secs: u64) -> String {
    match secs {
        0 => "none".to_string(),
        s => format!("{}s", s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn temp_dir() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().join("nested")).unwrap();
        (temp, dir)
    }

    #[test]
    fn test_init_writes_defaults_and_refuses_overwrite() {
        let (_temp, dir) = temp_dir();
        let loader = loader(Some(&dir)).unwrap();

        init(&loader, ConfigInitArgs { force: false }).unwrap();
        assert!(loader.config_path().exists());

        let err = init(&loader, ConfigInitArgs { force: false }).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        init(&loader, ConfigInitArgs { force: true }).unwrap();
    }

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(0), "none");
        assert_eq!(format_secs(300), "300s");
    }
}
