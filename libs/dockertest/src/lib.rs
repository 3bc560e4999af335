//! Disposable Docker containers for integration tests.
//!
//! ```no_run
//! # async fn example() -> anyhow::Result<()> {
//! let mut mysql = dockertest::setup_mysql().await?;
//! println!("connect to {}", mysql.url());
//! mysql.teardown().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod container;
pub mod environment;
pub mod migration;
pub mod mysql;
pub mod options;
pub mod retry;

pub use container::{callback, Container, ContainerCallback};
pub use environment::is_inside_container;
pub use migration::{run_migration_container, MigrationOptions};
pub use mysql::{
    new_mysql_health_checker, setup_mysql, setup_mysql_with, MySqlContainer, MySqlOptions,
};
pub use options::{ContainerOption, PortBinding};
pub use retry::retry;
