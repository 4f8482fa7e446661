//! Shared test fixtures: a recording in-memory connection and a blog schema.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use oxide_query::{
    ColumnInfo, Connection, ExecResult, Model, ModelConfig, QueryError, Registry,
    RelationDeclaration, Result, Row,
};

/// A scripted reply to the next statement.
pub enum Reply {
    Rows(Vec<Row>),
    Error(QueryError),
}

/// A connection that records every statement and serves canned rows.
///
/// Queued replies are consumed first; otherwise a SELECT returns every row
/// registered for the table named after its first `FROM`.
#[derive(Default)]
pub struct MockConnection {
    tables: HashMap<String, Vec<Row>>,
    replies: Mutex<VecDeque<Reply>>,
    statements: Mutex<Vec<String>>,
    transaction_log: Mutex<Vec<&'static str>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str, rows: Vec<Row>) -> Self {
        self.tables.insert(name.to_string(), rows);
        self
    }

    pub fn reply(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.statements.lock().unwrap().clear();
    }

    pub fn transaction_log(&self) -> Vec<&'static str> {
        self.transaction_log.lock().unwrap().clone()
    }

    fn record(&self, sql: &str) -> Option<Reply> {
        self.statements.lock().unwrap().push(sql.to_string());
        self.replies.lock().unwrap().pop_front()
    }
}

fn from_table(sql: &str) -> Option<&str> {
    let start = sql.find("FROM \"")? + "FROM \"".len();
    let end = sql[start..].find('"')?;
    Some(&sql[start..start + end])
}

impl Connection for MockConnection {
    async fn fetch_all(&self, sql: &str) -> Result<Vec<Row>> {
        match self.record(sql) {
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Error(err)) => Err(err),
            None => Ok(from_table(sql)
                .and_then(|t| self.tables.get(t))
                .cloned()
                .unwrap_or_default()),
        }
    }

    async fn execute(&self, sql: &str) -> Result<ExecResult> {
        match self.record(sql) {
            Some(Reply::Rows(rows)) => Ok(ExecResult {
                affected_rows: rows.len() as u64,
                insert_id: None,
            }),
            Some(Reply::Error(err)) => Err(err),
            None => Ok(ExecResult {
                affected_rows: 1,
                insert_id: Some(1),
            }),
        }
    }

    async fn describe(&self, _table: &str) -> Result<Vec<ColumnInfo>> {
        Ok(Vec::new())
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn begin_transaction(&self) -> Result<()> {
        self.transaction_log.lock().unwrap().push("begin");
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.transaction_log.lock().unwrap().push("commit");
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.transaction_log.lock().unwrap().push("rollback");
        Ok(())
    }

    async fn end(&self) -> Result<()> {
        self.transaction_log.lock().unwrap().push("end");
        Ok(())
    }
}

/// Users, posts (soft-deleting), comments, profiles and post subscribers.
pub fn blog_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(Model::new("User", "users")).unwrap();
    registry
        .register(
            Model::new("Post", "posts").config(ModelConfig::new().soft_delete("deleted_at")),
        )
        .unwrap();
    registry.register(Model::new("Comment", "comments")).unwrap();
    registry.register(Model::new("Profile", "profiles")).unwrap();

    registry
        .relate("User", RelationDeclaration::has_many("posts", "Post"))
        .unwrap();
    registry
        .relate("User", RelationDeclaration::has_one("profile", "Profile"))
        .unwrap();
    registry
        .relate("Post", RelationDeclaration::belongs_to("author", "User").local_key("user_id"))
        .unwrap();
    registry
        .relate("Post", RelationDeclaration::has_many("comments", "Comment"))
        .unwrap();
    registry
        .relate(
            "Post",
            RelationDeclaration::belongs_to_many("subscribers", "User")
                .pivot_table("post_subscribers"),
        )
        .unwrap();
    registry
}

pub fn shared(registry: Registry) -> Arc<Registry> {
    Arc::new(registry)
}

pub fn user(id: i64) -> Row {
    Row::new().with("id", id)
}

pub fn post(id: i64, user_id: i64) -> Row {
    Row::new().with("id", id).with("user_id", user_id)
}

/// Ids stored under `key` in each row, for attached lists.
pub fn ids(row: &Row, key: &str) -> Vec<i64> {
    row.get(key)
        .and_then(|v| v.as_rows())
        .unwrap_or_default()
        .iter()
        .filter_map(|r| r.get("id").and_then(|v| v.as_i64()))
        .collect()
}
