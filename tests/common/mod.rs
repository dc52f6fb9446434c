//! Shared test support: a scripted stand-in for the MySQL server and logging
//! setup.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use rowgate::catalog::TableSchema;
use rowgate::{
    Connection, ConnectionConfig, Connector, DataType, DriverError, ExecOutcome, Gateway, Row,
    Statement, Value,
};
use tracing_subscriber::{fmt, EnvFilter};

static INIT_LOGGING: Once = Once::new();

/// Install a test-writer subscriber once. `TEST_LOG`, then `RUST_LOG`, pick
/// the level; the default is `warn`.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = std::env::var("TEST_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .map(EnvFilter::new)
            .unwrap_or_else(|_| EnvFilter::new("warn"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .without_time()
            .try_init()
            .ok();
    });
}

/// Something the gateway asked the stub server to do
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FetchAll { sql: String, params: Vec<Value> },
    Execute { sql: String, params: Vec<Value> },
    Batch { statements: Vec<String> },
    Ping,
    Close,
}

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    connects: usize,
    connect_error: Option<DriverError>,
    connect_delay: Option<Duration>,
    close_error: Option<DriverError>,
    fetch_delay: Option<Duration>,
    fetch_results: VecDeque<Result<Vec<Row>, DriverError>>,
    exec_results: VecDeque<Result<ExecOutcome, DriverError>>,
}

/// Scripted server. Clones share state, so a test keeps one handle while the
/// gateway owns the connector.
#[derive(Clone, Default)]
pub struct StubServer {
    script: Arc<Mutex<Script>>,
}

impl StubServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(StubConnector {
            script: self.script.clone(),
        })
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }

    pub fn fail_connect(&self, error: DriverError) {
        self.with_script(|s| s.connect_error = Some(error));
    }

    pub fn delay_connect(&self, delay: Duration) {
        self.with_script(|s| s.connect_delay = Some(delay));
    }

    pub fn fail_close(&self, error: DriverError) {
        self.with_script(|s| s.close_error = Some(error));
    }

    pub fn delay_fetch(&self, delay: Duration) {
        self.with_script(|s| s.fetch_delay = Some(delay));
    }

    /// Rows for the next read; reads without a scripted result return nothing
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.with_script(|s| s.fetch_results.push_back(Ok(rows)));
    }

    pub fn push_fetch_error(&self, error: DriverError) {
        self.with_script(|s| s.fetch_results.push_back(Err(error)));
    }

    /// Outcome of the next write; writes without one affect no rows
    pub fn push_outcome(&self, rows_affected: u64, last_insert_id: Option<u64>) {
        self.with_script(|s| {
            s.exec_results.push_back(Ok(ExecOutcome {
                rows_affected,
                last_insert_id,
            }))
        });
    }

    pub fn push_exec_error(&self, error: DriverError) {
        self.with_script(|s| s.exec_results.push_back(Err(error)));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with_script(|s| s.calls.clone())
    }

    pub fn connects(&self) -> usize {
        self.with_script(|s| s.connects)
    }

    /// Connection attempts plus everything sent over a connection
    pub fn io_count(&self) -> usize {
        self.with_script(|s| s.connects + s.calls.len())
    }
}

struct StubConnector {
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl Connector for StubConnector {
    async fn connect(
        &self,
        _config: &ConnectionConfig,
    ) -> Result<Box<dyn Connection>, DriverError> {
        let delay = self.script.lock().unwrap().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().unwrap();
        script.connects += 1;
        match script.connect_error.clone() {
            Some(error) => Err(error),
            None => Ok(Box::new(StubConnection {
                script: self.script.clone(),
            })),
        }
    }
}

struct StubConnection {
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl Connection for StubConnection {
    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<Row>, DriverError> {
        let delay = self.script.lock().unwrap().fetch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::FetchAll {
            sql: statement.sql().to_string(),
            params: statement.params().to_vec(),
        });
        script.fetch_results.pop_front().unwrap_or(Ok(Vec::new()))
    }

    async fn execute(&mut self, statement: &Statement) -> Result<ExecOutcome, DriverError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::Execute {
            sql: statement.sql().to_string(),
            params: statement.params().to_vec(),
        });
        script
            .exec_results
            .pop_front()
            .unwrap_or(Ok(ExecOutcome::default()))
    }

    async fn execute_batch(
        &mut self,
        statements: &[Statement],
    ) -> Result<ExecOutcome, DriverError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::Batch {
            statements: statements.iter().map(|s| s.sql().to_string()).collect(),
        });
        script
            .exec_results
            .pop_front()
            .unwrap_or(Ok(ExecOutcome::default()))
    }

    async fn ping(&mut self) -> Result<(), DriverError> {
        self.script.lock().unwrap().calls.push(Call::Ping);
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DriverError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::Close);
        match script.close_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

pub fn test_config() -> ConnectionConfig {
    ConnectionConfig::new("db.test", 3306, "app", "secret", "shop")
}

/// `users (id INT AUTO_INCREMENT PRIMARY KEY, name VARCHAR(100) NOT NULL, email VARCHAR(255))`
pub fn users_schema() -> TableSchema {
    TableSchema::builder("users")
        .primary_key("id")
        .column_not_null("name", DataType::Varchar(100))
        .column("email", DataType::Varchar(255))
        .build()
}

/// A disconnected gateway over a fresh stub server, with `users` registered
pub fn stub_gateway() -> (Gateway, StubServer) {
    init_logging();
    let server = StubServer::new();
    let gateway = Gateway::with_connector(test_config(), server.connector());
    gateway.register_table(users_schema());
    (gateway, server)
}

pub fn alice() -> Row {
    Row::new()
        .with("name", "Alice")
        .with("email", "alice@example.com")
}
