//! `schedsync config` - show the effective configuration

use anyhow::Result;

use super::key_value_table;
use crate::config::{BackendKind, Config};

fn secret(value: &Option<String>) -> &'static str {
    if value.is_some() { "configured" } else { "not set" }
}

pub fn run(config: &Config) -> Result<()> {
    let sync = config.to_sync_config();
    let mut table = key_value_table(["Setting", "Value"]);

    table.add_row(vec!["Source URL", config.source.url.as_deref().unwrap_or("not set")]);
    table.add_row(vec![
        "Timeouts",
        &format!(
            "connect {}s, read {}s",
            config.source.connect_timeout, config.source.read_timeout
        ),
    ]);
    table.add_row(vec!["Backend", sync.backend.name()]);
    table.add_row(vec!["Bucket", config.store.bucket.as_deref().unwrap_or("not set")]);
    match config.store.backend {
        BackendKind::S3 => {
            table.add_row(vec!["Region", &config.store.region]);
            table.add_row(vec![
                "Endpoint",
                config.store.endpoint.as_deref().unwrap_or("AWS default"),
            ]);
            table.add_row(vec!["Access key", secret(&config.store.access_key_id)]);
            table.add_row(vec!["Secret key", secret(&config.store.secret_access_key)]);
        }
        BackendKind::Local => {
            table.add_row(vec!["Root", &config.store.root.display().to_string()]);
        }
    }
    table.add_row(vec!["Artifact key", &sync.artifact_key(None)]);
    table.add_row(vec!["Digest key", &sync.digest_key()]);
    table.add_row(vec!["Algorithm", config.artifact.algorithm.name()]);
    table.add_row(vec![
        "Server filename",
        if config.artifact.use_server_filename { "used" } else { "ignored" },
    ]);
    table.add_row(vec![
        "Concurrency guard",
        if config.sync.guard_concurrent { "on" } else { "off" },
    ]);
    table.add_row(vec![
        "Work dir",
        &config
            .sync
            .work_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "system temp".to_string()),
    ]);

    eprintln!("\n{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_masked() {
        assert_eq!(secret(&Some("AKIA...".to_string())), "configured");
        assert_eq!(secret(&None), "not set");
    }
}
