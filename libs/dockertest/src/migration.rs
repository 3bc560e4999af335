// Run a schema migration image against a MySQL fixture
use crate::container::Container;
use crate::mysql::{MySqlContainer, MySqlOptions, MYSQL_SERVER_PORT};
use crate::options;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

const DEFAULT_MIGRATION_COMMAND: [&str; 4] = ["bundle", "exec", "rake", "db:migrate"];
const DEFAULT_MIGRATION_TAG: &str = "latest";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOptions {
    pub image_repository: String,
    /// Defaults to `latest`
    pub image_tag: Option<String>,
    /// Overrides `bundle exec rake db:migrate`
    pub command: Vec<String>,
}

impl MigrationOptions {
    pub fn new(image_repository: impl Into<String>) -> Self {
        Self {
            image_repository: image_repository.into(),
            ..Default::default()
        }
    }

    pub fn tag(&self) -> &str {
        self.image_tag
            .as_deref()
            .filter(|tag| !tag.is_empty())
            .unwrap_or(DEFAULT_MIGRATION_TAG)
    }

    pub fn command(&self) -> Vec<String> {
        if self.command.is_empty() {
            DEFAULT_MIGRATION_COMMAND.iter().map(|s| s.to_string()).collect()
        } else {
            self.command.clone()
        }
    }
}

/// Connection settings handed to the migration container.
///
/// The migration reaches the server over the bridge network, so it uses the
/// server's own address and port rather than the published ones.
fn migration_env(server_ip: &str, mysql: &MySqlOptions) -> Vec<String> {
    vec![
        "RAILS_ENV=customized".to_string(),
        format!("HOST={}", server_ip),
        format!("PORT={}", MYSQL_SERVER_PORT),
        format!("DATABASE={}", mysql.database),
        format!("USERNAME={}", mysql.username),
        format!("PASSWORD={}", mysql.password),
    ]
}

/// Launch the migration image, wait for it to exit and remove it.
///
/// Fails when the migration exits with a non-zero status.
pub async fn run_migration_container(
    mysql: &MySqlContainer,
    migration: &MigrationOptions,
) -> Result<()> {
    let server = match mysql.container() {
        Some(container) => container,
        None => bail!("Migrations can only run against a container-backed MySQL server"),
    };

    let server_ip = server
        .ip_address()
        .await
        .context("Failed to resolve MySQL container address")?;

    let container = Container::with_client(
        server.docker().clone(),
        vec![
            options::name("migration"),
            options::image_repository(migration.image_repository.clone()),
            options::image_tag(migration.tag()),
            options::docker_env(migration_env(&server_ip, mysql.options())),
            options::run_options(migration.command()),
        ],
    )
    .await?;

    info!(container = %container.name(), image = %container.image(), "Running migration");

    let outcome = async {
        container.start().await.map_err(|e| {
            error!(error = %e, "Failed to start container");
            e
        })?;
        container.wait().await.map_err(|e| {
            error!(error = %e, "Failed to wait container");
            e
        })
    }
    .await;

    container.remove().await?;

    let status = outcome?;
    if status != 0 {
        bail!(
            "Migration container {} exited with status {}",
            container.name(),
            status
        );
    }

    info!("Migration completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = MigrationOptions::new("registry.local/app-migrate");
        assert_eq!(options.tag(), "latest");
        assert_eq!(options.command(), vec!["bundle", "exec", "rake", "db:migrate"]);
    }

    #[test]
    fn test_overrides() {
        let options = MigrationOptions {
            image_repository: "app".to_string(),
            image_tag: Some("v2".to_string()),
            command: vec!["./migrate.sh".to_string()],
        };
        assert_eq!(options.tag(), "v2");
        assert_eq!(options.command(), vec!["./migrate.sh"]);

        let empty_tag = MigrationOptions {
            image_tag: Some(String::new()),
            ..options
        };
        assert_eq!(empty_tag.tag(), "latest");
    }

    #[test]
    fn test_migration_env_uses_server_port() {
        let mysql = MySqlOptions::default();
        let env = migration_env("172.17.0.3", &mysql);
        assert_eq!(
            env,
            vec![
                "RAILS_ENV=customized",
                "HOST=172.17.0.3",
                "PORT=3306",
                "DATABASE=db0",
                "USERNAME=root",
                "PASSWORD=my-secret-pw",
            ]
        );
    }
}
