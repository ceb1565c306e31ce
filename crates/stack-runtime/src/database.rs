use crate::RuntimeError;
use std::process::{Command, Stdio};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
}

/// Administrative access to the stack's database server.
pub trait DatabaseAdmin: Send + Sync {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn DatabaseSession>, RuntimeError>;
}

pub trait DatabaseSession {
    fn execute(&mut self, statement: &str) -> Result<(), RuntimeError>;

    fn close(self: Box<Self>) -> Result<(), RuntimeError>;
}

/// `mysql` client backend. Each statement is one client invocation; the
/// password travels in `MYSQL_PWD` so it never shows up in `ps`.
#[derive(Debug, Clone)]
pub struct MysqlCli {
    program: String,
}

impl Default for MysqlCli {
    fn default() -> Self {
        Self::new()
    }
}

impl MysqlCli {
    pub fn new() -> Self {
        Self {
            program: "mysql".to_owned(),
        }
    }
}

struct MysqlSession {
    program: String,
    params: ConnectParams,
}

impl MysqlSession {
    fn run(&self, statement: &str) -> Result<(), RuntimeError> {
        debug!("mysql {}:{}: {statement}", self.params.host, self.params.port);
        let output = Command::new(&self.program)
            .args([
                "--protocol=TCP",
                "-h",
                &self.params.host,
                "-P",
                &self.params.port,
                "-u",
                &self.params.user,
                "-e",
                statement,
            ])
            .env("MYSQL_PWD", &self.params.password)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| RuntimeError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if output.status.success() {
            Ok(())
        } else {
            Err(RuntimeError::Database(
                String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            ))
        }
    }
}

impl DatabaseAdmin for MysqlCli {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn DatabaseSession>, RuntimeError> {
        let session = MysqlSession {
            program: self.program.clone(),
            params: params.clone(),
        };
        session.run("SELECT 1")?;
        Ok(Box::new(session))
    }
}

impl DatabaseSession for MysqlSession {
    fn execute(&mut self, statement: &str) -> Result<(), RuntimeError> {
        self.run(statement)
    }

    fn close(self: Box<Self>) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Quote an identifier for use in a statement.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_backquoted() {
        assert_eq!(quote_identifier("widget"), "`widget`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }

    #[test]
    fn unreachable_server_fails_to_connect() {
        let admin = MysqlCli {
            program: "definitely-not-a-mysql-client".to_owned(),
        };
        let params = ConnectParams {
            host: "127.0.0.1".to_owned(),
            port: "1".to_owned(),
            user: "root".to_owned(),
            password: String::new(),
        };
        assert!(matches!(
            admin.connect(&params),
            Err(RuntimeError::Spawn { .. })
        ));
    }
}
