//! CLI subcommand handlers.

use crate::Commands;
use cosmos_core::config::{ConfigOverrides, load_config};
use cosmos_core::training::RESULT_FILE;
use cosmos_core::{CosmosConfig, MetricLog, MetricLogger, SyncClient};
use std::path::{Path, PathBuf};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut overrides = ConfigOverrides {
        output_dir,
        ..ConfigOverrides::default()
    };
    match &command {
        Commands::Save { description } => overrides.sync.description = description.clone(),
        Commands::Load { rev } => overrides.sync.rev = rev.clone(),
        _ => {}
    }

    let mut config = load_config(Some(workspace), Some(&overrides))?;
    config.output_dir = resolve_output_dir(workspace, &config.output_dir);

    match command {
        Commands::Save { .. } => handle_save(&config).await,
        Commands::Load { .. } => handle_load(&config).await,
        Commands::Log { keys, values } => handle_log(config, keys, &values),
        Commands::Show => handle_show(&config),
        Commands::Config => handle_config(&config),
    }
}

/// Relative output directories are taken from the workspace.
fn resolve_output_dir(workspace: &Path, output_dir: &Path) -> PathBuf {
    if output_dir.as_os_str().is_empty() || output_dir.is_absolute() {
        output_dir.to_path_buf()
    } else {
        workspace.join(output_dir)
    }
}

async fn handle_save(config: &CosmosConfig) -> anyhow::Result<()> {
    let client = SyncClient::from_config(config)?;
    let outcome = client.save(config).await?;
    if !outcome.is_success() {
        anyhow::bail!("Save failed ({}): {}", outcome.status, outcome.body);
    }
    println!(
        "Saved {} ({}): {}",
        config.output_dir.display(),
        outcome.status,
        outcome.body
    );
    Ok(())
}

async fn handle_load(config: &CosmosConfig) -> anyhow::Result<()> {
    let client = SyncClient::from_config(config)?;
    let outcome = client.load(config, None).await?;
    if !outcome.extracted {
        anyhow::bail!(
            "Nothing loaded ({}): {}",
            outcome.transfer.status,
            outcome.transfer.body
        );
    }
    println!(
        "Loaded {} into {}",
        config.sync.rev.as_deref().unwrap_or("latest revision"),
        config.output_dir.display()
    );
    Ok(())
}

fn handle_log(mut config: CosmosConfig, keys: Vec<String>, values: &[f64]) -> anyhow::Result<()> {
    if !keys.is_empty() {
        config.metrics.keys = keys;
    }
    let mut logger = MetricLogger::open(&config)?;
    if let Some(recovery) = logger.recovery() {
        eprintln!(
            "Warning: {} was unreadable ({}); starting a new log.",
            recovery.path.display(),
            recovery.reason
        );
    }
    let epoch = logger.update(values)?.epoch;
    println!("Logged epoch {} to {}", epoch, logger.path().display());
    Ok(())
}

fn handle_show(config: &CosmosConfig) -> anyhow::Result<()> {
    let path = config.output_dir.join(RESULT_FILE);
    if !path.exists() {
        println!("No metric log at {}", path.display());
        return Ok(());
    }
    let log = MetricLog::read(&path)?;
    print!("{}", String::from_utf8(log.to_csv()?)?);
    Ok(())
}

fn handle_config(config: &CosmosConfig) -> anyhow::Result<()> {
    print!("{}", render_config(config)?);
    Ok(())
}

/// TOML rendering with the token masked.
fn render_config(config: &CosmosConfig) -> anyhow::Result<String> {
    let mut shown = config.clone();
    if let Some(token) = shown.sync.token.as_mut() {
        *token = mask(token);
    }
    Ok(toml::to_string_pretty(&shown)?)
}

fn mask(secret: &str) -> String {
    if secret.chars().count() <= 8 {
        return "****".to_string();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}****")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_output_dir() {
        let ws = Path::new("/work");
        assert_eq!(resolve_output_dir(ws, Path::new("runs/a")), PathBuf::from("/work/runs/a"));
        assert_eq!(resolve_output_dir(ws, Path::new("/abs")), PathBuf::from("/abs"));
        assert_eq!(resolve_output_dir(ws, Path::new("")), PathBuf::new());
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("short"), "****");
        assert_eq!(mask("abcdefghijkl"), "abcd****");
    }

    #[test]
    fn test_render_config_masks_token() {
        let mut config = CosmosConfig::new("runs/a");
        config.sync.token = Some("supersecrettoken".into());
        config.sync.dataset = Some("mnist".into());

        let rendered = render_config(&config).unwrap();
        assert!(rendered.contains("supe****"));
        assert!(!rendered.contains("supersecrettoken"));
        assert!(rendered.contains("dataset = \"mnist\""));
    }

    #[test]
    fn test_handle_log_appends_rows() {
        let dir = TempDir::new().unwrap();
        let config = CosmosConfig::new(dir.path().join("out"));

        handle_log(config.clone(), vec!["acc".into(), "loss".into()], &[0.5, 0.25]).unwrap();
        handle_log(config.clone(), Vec::new(), &[0.75]).unwrap();

        let log = MetricLog::read(&dir.path().join("out").join(RESULT_FILE)).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.rows()[1].epoch, 2);
        assert_eq!(log.rows()[1].metrics.get("acc"), Some(0.75));
        assert_eq!(log.rows()[1].metrics.get("loss"), None);
    }

    #[test]
    fn test_handle_log_rejects_extra_values() {
        let dir = TempDir::new().unwrap();
        let config = CosmosConfig::new(dir.path().join("out"));
        let err = handle_log(config, vec!["acc".into()], &[0.5, 0.25]).unwrap_err();
        assert!(err.to_string().contains("Too many metric values"));
    }
}
