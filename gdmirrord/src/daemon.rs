use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use gdmirror_core::DriveClient;

use crate::store::{Datastore, SqliteStore, StoreError};
use crate::sync::SyncEngine;
use crate::token_provider::StaticToken;

const DEFAULT_POLL_SECS: u64 = 60;
const DEFAULT_SAFE_SLEEP_SECS: u64 = 0;

// Typical upstream settle time after a data anomaly.
const ANOMALY_SETTLE_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct DaemonConfig {
    pub drive_id: String,
    pub access_token: String,
    pub db_path: PathBuf,
    pub poll_interval: Duration,
    pub safe_sleep: Duration,
}

impl DaemonConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let drive_id =
            std::env::var("GDMIRROR_DRIVE_ID").context("GDMIRROR_DRIVE_ID is not set")?;
        let access_token =
            std::env::var("GDMIRROR_ACCESS_TOKEN").context("GDMIRROR_ACCESS_TOKEN is not set")?;

        let db_path = match std::env::var("GDMIRROR_DB_PATH") {
            Ok(value) => PathBuf::from(value),
            Err(_) => default_db_path().context("XDG data directory is unavailable")?,
        };

        let poll_interval =
            Duration::from_secs(read_u64_env("GDMIRROR_POLL_SECS", DEFAULT_POLL_SECS));
        let safe_sleep =
            Duration::from_secs(read_u64_env("GDMIRROR_SAFE_SLEEP_SECS", DEFAULT_SAFE_SLEEP_SECS));

        Ok(Self {
            drive_id,
            access_token,
            db_path,
            poll_interval,
            safe_sleep,
        })
    }
}

pub struct DaemonRuntime {
    config: DaemonConfig,
    engine: SyncEngine<SqliteStore>,
}

impl DaemonRuntime {
    pub async fn bootstrap(config: DaemonConfig) -> anyhow::Result<Self> {
        let store = SqliteStore::open(&config.db_path)
            .await
            .with_context(|| format!("failed to open mirror database at {:?}", config.db_path))?;

        let auth = Arc::new(StaticToken::new(config.access_token.clone()));
        let client = DriveClient::new(config.drive_id.clone(), auth)
            .context("failed to build the drive client")?;

        let engine = SyncEngine::new(client, store).with_safe_sleep(config.safe_sleep);

        Ok(Self { config, engine })
    }

    pub fn engine(&self) -> &SyncEngine<SqliteStore> {
        &self.engine
    }

    /// Runs a full sync when the store has no cursor yet, then polls for
    /// changes until the process is stopped.
    pub async fn run(&self) -> anyhow::Result<()> {
        match self.engine.store().page_token(&self.config.drive_id).await {
            Ok(_) => {}
            Err(StoreError::FullSyncRequired) => {
                eprintln!("[gdmirrord] no local state yet, running a full sync");
                self.engine.full_sync().await?;
                eprintln!("[gdmirrord] full sync complete");
            }
            Err(err) => return Err(err.into()),
        }

        loop {
            match self.engine.partial_sync(&mut []).await {
                Ok(()) => {}
                Err(err) if err.is_data_anomaly() => {
                    eprintln!(
                        "[gdmirrord] data anomaly, waiting {ANOMALY_SETTLE_SECS}s for upstream to settle"
                    );
                    tokio::time::sleep(Duration::from_secs(ANOMALY_SETTLE_SECS)).await;
                    continue;
                }
                Err(err) => return Err(err.into()),
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

fn default_db_path() -> Option<PathBuf> {
    let mut path = dirs::data_dir()?;
    path.push("gdmirror");
    path.push("mirror.db");
    Some(path)
}

fn read_u64_env(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_u64_env_parses_a_set_variable() {
        std::env::set_var("GDMIRROR_TEST_PARSES", "120");
        assert_eq!(read_u64_env("GDMIRROR_TEST_PARSES", 60), 120);
        std::env::remove_var("GDMIRROR_TEST_PARSES");
    }

    #[test]
    fn read_u64_env_falls_back_on_missing_or_invalid_values() {
        assert_eq!(read_u64_env("GDMIRROR_TEST_MISSING", 60), 60);

        std::env::set_var("GDMIRROR_TEST_INVALID", "soon");
        assert_eq!(read_u64_env("GDMIRROR_TEST_INVALID", 60), 60);
        std::env::remove_var("GDMIRROR_TEST_INVALID");
    }
}
