// Docker engine client construction
use anyhow::{Context, Result};
use bollard::Docker;
use tracing::debug;

pub const DEFAULT_DOCKER_SOCKET: &str = "unix:///var/run/docker.sock";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    /// `DOCKER_HOST` points at a tcp/http endpoint
    Http,
    /// tcp endpoint with `DOCKER_TLS_VERIFY` set, as docker-machine exports
    Ssl,
    /// Environment is configured but names a local socket
    Local,
    /// Nothing configured, use the well-known socket path
    DefaultSocket,
}

fn select_transport<F>(lookup: F) -> Transport
where
    F: Fn(&str) -> Option<String>,
{
    let docker_host = lookup("DOCKER_HOST").filter(|host| !host.is_empty());
    let machine = lookup("DOCKER_MACHINE_NAME").filter(|name| !name.is_empty());
    let tls_verify = lookup("DOCKER_TLS_VERIFY").is_some_and(|value| !value.is_empty());

    match docker_host {
        Some(host) if host.starts_with("tcp://") && tls_verify => Transport::Ssl,
        Some(host) if host.starts_with("tcp://") || host.starts_with("http://") => Transport::Http,
        Some(_) => Transport::Local,
        None if machine.is_some() => Transport::Local,
        None => Transport::DefaultSocket,
    }
}

/// Connect to the Docker daemon.
///
/// Honors `DOCKER_HOST` / `DOCKER_MACHINE_NAME` when set, using TLS with the
/// certificates in `DOCKER_CERT_PATH` when `DOCKER_TLS_VERIFY` is set.
/// Otherwise talks to the default unix socket.
pub fn connect() -> Result<Docker> {
    let transport = select_transport(|key| std::env::var(key).ok());
    debug!(?transport, "Connecting to Docker daemon");

    let docker = match transport {
        Transport::Http => Docker::connect_with_http_defaults(),
        Transport::Ssl => Docker::connect_with_ssl_defaults(),
        Transport::Local => Docker::connect_with_local_defaults(),
        Transport::DefaultSocket => connect_default_socket(),
    };

    docker.context("Failed to connect to Docker daemon")
}

#[cfg(unix)]
fn connect_default_socket() -> Result<Docker, bollard::errors::Error> {
    Docker::connect_with_unix(
        DEFAULT_DOCKER_SOCKET,
        DEFAULT_TIMEOUT_SECS,
        bollard::API_DEFAULT_VERSION,
    )
}

#[cfg(not(unix))]
fn connect_default_socket() -> Result<Docker, bollard::errors::Error> {
    Docker::connect_with_local_defaults()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_socket_without_env() {
        assert_eq!(select_transport(lookup(&[])), Transport::DefaultSocket);
    }

    #[test]
    fn test_tcp_docker_host_uses_http() {
        let env = lookup(&[("DOCKER_HOST", "tcp://192.168.99.100:2376")]);
        assert_eq!(select_transport(env), Transport::Http);
    }

    #[test]
    fn test_unix_docker_host_uses_local() {
        let env = lookup(&[("DOCKER_HOST", "unix:///run/user/1000/docker.sock")]);
        assert_eq!(select_transport(env), Transport::Local);
    }

    #[test]
    fn test_machine_name_uses_environment() {
        let env = lookup(&[("DOCKER_MACHINE_NAME", "default")]);
        assert_eq!(select_transport(env), Transport::Local);

        let env = lookup(&[
            ("DOCKER_MACHINE_NAME", "default"),
            ("DOCKER_HOST", "tcp://192.168.99.100:2376"),
        ]);
        assert_eq!(select_transport(env), Transport::Http);
    }

    #[test]
    fn test_machine_tls_env_uses_ssl() {
        let env = lookup(&[
            ("DOCKER_MACHINE_NAME", "default"),
            ("DOCKER_HOST", "tcp://192.168.99.100:2376"),
            ("DOCKER_TLS_VERIFY", "1"),
            ("DOCKER_CERT_PATH", "/home/tester/.docker/machine/machines/default"),
        ]);
        assert_eq!(select_transport(env), Transport::Ssl);
    }

    #[test]
    fn test_tls_verify_ignored_for_unix_socket() {
        let env = lookup(&[
            ("DOCKER_HOST", "unix:///var/run/docker.sock"),
            ("DOCKER_TLS_VERIFY", "1"),
        ]);
        assert_eq!(select_transport(env), Transport::Local);
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let env = lookup(&[("DOCKER_HOST", ""), ("DOCKER_MACHINE_NAME", "")]);
        assert_eq!(select_transport(env), Transport::DefaultSocket);

        let env = lookup(&[
            ("DOCKER_HOST", "tcp://192.168.99.100:2376"),
            ("DOCKER_TLS_VERIFY", ""),
        ]);
        assert_eq!(select_transport(env), Transport::Http);
    }
}
