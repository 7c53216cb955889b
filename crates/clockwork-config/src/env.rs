//! Environment-derived connection resolution

use clockwork_api::{Connection, EngineKind};
use std::path::PathBuf;
use tracing::{debug, warn};

pub const ENV_DB_ENGINE: &str = "CLOCKWORK_DB_ENGINE";
pub const ENV_DB_HOST: &str = "CLOCKWORK_DB_HOST";
pub const ENV_DB_PORT: &str = "CLOCKWORK_DB_PORT";
pub const ENV_DB_USER: &str = "CLOCKWORK_DB_USER";
pub const ENV_DB_PASSWORD: &str = "CLOCKWORK_DB_PASSWORD";
pub const ENV_DB_NAME: &str = "CLOCKWORK_DB_NAME";
pub const ENV_SQLITE_PATH: &str = "CLOCKWORK_SQLITE_PATH";

/// Read the connection parameters from the process environment.
///
/// Returns `None` unless every parameter the declared engine requires is
/// present. An unrecognized engine tag is passed through so that connecting
/// reports it as unsupported.
pub fn resolve_environment_connection() -> Option<Connection> {
    resolve_environment_connection_from(|key| std::env::var(key).ok())
}

/// Same as [`resolve_environment_connection`], reading values through `lookup`
pub fn resolve_environment_connection_from<F>(lookup: F) -> Option<Connection>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let engine = get(ENV_DB_ENGINE)?;

    let kind = match EngineKind::parse(&engine) {
        Ok(kind) => kind,
        Err(_) => {
            warn!(engine = %engine, "Environment declares an unknown database engine");
            return Some(Connection {
                engine,
                ..Default::default()
            });
        }
    };

    let conn = match kind {
        EngineKind::Sqlite => Connection {
            engine,
            sqlite_path: Some(PathBuf::from(get(ENV_SQLITE_PATH)?)),
            ..Default::default()
        },
        _ => {
            let host = get(ENV_DB_HOST)?;
            let db_name = get(ENV_DB_NAME)?;
            let port = match get(ENV_DB_PORT) {
                Some(raw) => match raw.parse::<u16>() {
                    Ok(port) => Some(port),
                    Err(_) => {
                        warn!(port = %raw, "Ignoring environment connection with invalid port");
                        return None;
                    }
                },
                None => None,
            };

            Connection {
                engine,
                host: Some(host),
                port,
                user: get(ENV_DB_USER),
                password: get(ENV_DB_PASSWORD),
                db_name: Some(db_name),
                sqlite_path: None,
            }
        }
    };

    debug!(target = %conn.describe(), "Resolved connection from environment");
    Some(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn nothing_set() {
        assert!(resolve_environment_connection_from(lookup(&[])).is_none());
    }

    #[test]
    fn sqlite_requires_path() {
        let partial = lookup(&[(ENV_DB_ENGINE, "sqlite")]);
        assert!(resolve_environment_connection_from(partial).is_none());

        let full = lookup(&[(ENV_DB_ENGINE, "sqlite"), (ENV_SQLITE_PATH, "/var/lib/hr.db")]);
        let conn = resolve_environment_connection_from(full).unwrap();
        assert_eq!(conn.sqlite_path, Some(PathBuf::from("/var/lib/hr.db")));
        assert!(conn.host.is_none());
        assert_eq!(conn.validate().unwrap(), EngineKind::Sqlite);
    }

    #[test]
    fn server_engine_requires_host_and_name() {
        let no_name = lookup(&[(ENV_DB_ENGINE, "postgres"), (ENV_DB_HOST, "db.local")]);
        assert!(resolve_environment_connection_from(no_name).is_none());

        let blank_host = lookup(&[
            (ENV_DB_ENGINE, "mysql"),
            (ENV_DB_HOST, "  "),
            (ENV_DB_NAME, "hr"),
        ]);
        assert!(resolve_environment_connection_from(blank_host).is_none());

        let full = lookup(&[
            (ENV_DB_ENGINE, "mariadb"),
            (ENV_DB_HOST, "db.local"),
            (ENV_DB_PORT, "3307"),
            (ENV_DB_USER, "hr"),
            (ENV_DB_PASSWORD, "secret"),
            (ENV_DB_NAME, "attendance"),
            (ENV_SQLITE_PATH, "/ignored.db"),
        ]);
        let conn = resolve_environment_connection_from(full).unwrap();
        assert_eq!(conn.port, Some(3307));
        assert_eq!(conn.user.as_deref(), Some("hr"));
        assert!(conn.sqlite_path.is_none());
        assert_eq!(conn.validate().unwrap(), EngineKind::Mariadb);
    }

    #[test]
    fn invalid_port_yields_nothing() {
        let vars = lookup(&[
            (ENV_DB_ENGINE, "postgres"),
            (ENV_DB_HOST, "db.local"),
            (ENV_DB_PORT, "not-a-port"),
            (ENV_DB_NAME, "hr"),
        ]);
        assert!(resolve_environment_connection_from(vars).is_none());
    }

    #[test]
    fn unknown_engine_passes_through() {
        let conn = resolve_environment_connection_from(lookup(&[(ENV_DB_ENGINE, "oracle")])).unwrap();
        assert_eq!(conn.engine, "oracle");
        assert!(conn.validate().is_err());
    }
}
