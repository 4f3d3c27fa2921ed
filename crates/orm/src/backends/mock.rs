//! Scripted in-memory connection provider
//!
//! Records every statement it receives and answers queries from a list of
//! rules matched by substring. Used by the test suites and handy for dry runs
//! that only need to see the generated SQL.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::{OrmError, OrmResult};
use crate::model::Record;

use super::{Connection, ConnectionProvider, ConnectionTarget};

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    rows: Vec<Record>,
    once: bool,
}

#[derive(Debug, Default)]
struct MockState {
    log: Vec<(String, String)>,
    rules: Vec<Rule>,
    failures: Vec<String>,
    unreachable: Vec<String>,
    next_identity: i64,
    affected_rows: u64,
    connections_opened: usize,
    connections_closed: usize,
}

/// Connection provider backed by shared scripted state
#[derive(Debug, Clone)]
pub struct MockProvider {
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                next_identity: 1,
                affected_rows: 1,
                ..Default::default()
            })),
        }
    }

    /// Answer every query containing `pattern` with `rows`.
    ///
    /// Rules are tried in registration order; non-object rows are ignored.
    pub fn respond(&self, pattern: impl Into<String>, rows: Vec<Value>) -> &Self {
        self.push_rule(pattern.into(), rows, false);
        self
    }

    /// Like [`respond`](Self::respond) but the rule is consumed by its first match
    pub fn respond_once(&self, pattern: impl Into<String>, rows: Vec<Value>) -> &Self {
        self.push_rule(pattern.into(), rows, true);
        self
    }

    /// Make every statement containing `pattern` fail
    pub fn fail_on(&self, pattern: impl Into<String>) -> &Self {
        self.state.lock().failures.push(pattern.into());
        self
    }

    /// Refuse connections to `url`
    pub fn refuse(&self, url: impl Into<String>) -> &Self {
        self.state.lock().unreachable.push(url.into());
        self
    }

    /// Key returned by the next last-identity query; later inserts count up from it
    pub fn set_next_identity(&self, identity: i64) {
        self.state.lock().next_identity = identity;
    }

    pub fn set_affected_rows(&self, rows: u64) {
        self.state.lock().affected_rows = rows;
    }

    /// Every statement received, in order, across all connections
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().log.iter().map(|(_, sql)| sql.clone()).collect()
    }

    /// Statements received by connections opened against `url`
    pub fn executed_on(&self, url: &str) -> Vec<String> {
        self.state
            .lock()
            .log
            .iter()
            .filter(|(target, _)| target == url)
            .map(|(_, sql)| sql.clone())
            .collect()
    }

    pub fn connections_opened(&self) -> usize {
        self.state.lock().connections_opened
    }

    pub fn connections_closed(&self) -> usize {
        self.state.lock().connections_closed
    }

    fn push_rule(&self, pattern: String, rows: Vec<Value>, once: bool) {
        let rows = rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(record) => Some(record),
                _ => None,
            })
            .collect();
        self.state.lock().rules.push(Rule { pattern, rows, once });
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionProvider for MockProvider {
    async fn connect(&self, target: &ConnectionTarget) -> OrmResult<Box<dyn Connection>> {
        let mut state = self.state.lock();
        if state.unreachable.iter().any(|url| url == &target.url) {
            return Err(OrmError::Execution(format!("connection refused: {}", target.url)));
        }
        state.connections_opened += 1;

        Ok(Box::new(MockConnection {
            url: target.url.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockConnection {
    url: String,
    state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    fn record(&self, sql: &str) -> OrmResult<()> {
        let mut state = self.state.lock();
        state.log.push((self.url.clone(), sql.to_string()));
        if state.failures.iter().any(|pattern| sql.contains(pattern.as_str())) {
            return Err(OrmError::Execution(format!("scripted failure for: {}", sql)));
        }
        Ok(())
    }
}

fn is_identity_query(sql: &str) -> bool {
    ["@@IDENTITY", "LAST_INSERT_ID()", "lastval()", "last_insert_rowid()"]
        .iter()
        .any(|marker| sql.contains(marker))
}

#[async_trait]
impl Connection for MockConnection {
    async fn query(&mut self, sql: &str) -> OrmResult<Vec<Record>> {
        self.record(sql)?;
        let mut state = self.state.lock();

        if is_identity_query(sql) {
            let identity = state.next_identity;
            state.next_identity += 1;
            let mut row = Record::new();
            row.insert("identity".to_string(), json!(identity));
            return Ok(vec![row]);
        }

        let position = state.rules.iter().position(|rule| sql.contains(rule.pattern.as_str()));
        match position {
            Some(index) if state.rules[index].once => Ok(state.rules.remove(index).rows),
            Some(index) => Ok(state.rules[index].rows.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn execute(&mut self, sql: &str) -> OrmResult<u64> {
        self.record(sql)?;
        Ok(self.state.lock().affected_rows)
    }

    async fn begin(&mut self) -> OrmResult<()> {
        self.record("BEGIN")
    }

    async fn commit(&mut self) -> OrmResult<()> {
        self.record("COMMIT")
    }

    async fn rollback(&mut self) -> OrmResult<()> {
        self.record("ROLLBACK")
    }

    async fn close(self: Box<Self>) -> OrmResult<()> {
        self.state.lock().connections_closed += 1;
        Ok(())
    }
}
