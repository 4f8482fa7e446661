use std::sync::Arc;

use oxide_query::{
    transaction, ColumnInfo, Connection, GlobalScope, Model, ModelConfig, QueryError, Registry,
    RelationDeclaration, RelationMode, RelationOptions, Row, Value, Q,
};
use oxide_query_sqlite::{SqliteBackend, SqliteDdl};

async fn backend() -> SqliteBackend {
    SqliteBackend::connect("sqlite::memory:").await.unwrap()
}

async fn run(conn: &SqliteBackend, statements: &[&str]) {
    for sql in statements {
        conn.execute(sql).await.unwrap();
    }
}

/// Three users; posts 10 and 11 by user 1, 12 by user 2 and a deleted 13 by
/// user 3; comments on 10 and 12; readers linked through `post_user`.
async fn blog() -> (SqliteBackend, Arc<Registry>) {
    let conn = backend().await;
    run(
        &conn,
        &[
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, title TEXT, deleted_at TEXT)",
            "CREATE TABLE comments (id INTEGER PRIMARY KEY, post_id INTEGER, body TEXT)",
            "CREATE TABLE post_user (post_id INTEGER, user_id INTEGER)",
            "INSERT INTO users (id, name) VALUES (1, 'ann'), (2, 'bob'), (3, 'cid')",
            "INSERT INTO posts (id, user_id, title, deleted_at) VALUES \
             (10, 1, 'a', NULL), (11, 1, 'b', NULL), (12, 2, 'c', NULL), \
             (13, 3, 'gone', '2024-01-01 00:00:00')",
            "INSERT INTO comments (id, post_id, body) VALUES (100, 10, 'x'), (101, 12, 'y')",
            "INSERT INTO post_user (post_id, user_id) VALUES (10, 2), (10, 3), (12, 1)",
        ],
    )
    .await;

    let mut registry = Registry::new();
    registry.register(Model::new("User", "users")).unwrap();
    registry
        .register(Model::new("Post", "posts").config(ModelConfig::new().soft_delete("deleted_at")))
        .unwrap();
    registry.register(Model::new("Comment", "comments")).unwrap();
    registry
        .relate("User", RelationDeclaration::has_many("posts", "Post"))
        .unwrap();
    registry
        .relate("Post", RelationDeclaration::has_many("comments", "Comment"))
        .unwrap();
    registry
        .relate("Post", RelationDeclaration::belongs_to("author", "User"))
        .unwrap();
    registry
        .relate("Post", RelationDeclaration::belongs_to_many("readers", "User"))
        .unwrap();
    (conn, Arc::new(registry))
}

fn ids(rows: &[Row]) -> Vec<i64> {
    rows.iter()
        .filter_map(|r| r.get("id").and_then(Value::as_i64))
        .collect()
}

fn attached(row: &Row, key: &str) -> Vec<i64> {
    ids(row.get(key).and_then(Value::as_rows).unwrap_or_default())
}

#[tokio::test]
async fn test_has_many_and_belongs_to() {
    let (conn, registry) = blog().await;

    let users = registry
        .query("User")
        .unwrap()
        .order_by("id")
        .with("posts.comments")
        .unwrap()
        .get(&conn)
        .await
        .unwrap();
    assert_eq!(attached(&users[0], "posts"), vec![10, 11]);
    assert_eq!(attached(&users[1], "posts"), vec![12]);
    assert!(attached(&users[2], "posts").is_empty());
    let posts = users[0].get("posts").and_then(Value::as_rows).unwrap();
    assert_eq!(attached(&posts[0], "comments"), vec![100]);

    let posts = registry
        .query("Post")
        .unwrap()
        .order_by("id")
        .with("author")
        .unwrap()
        .get(&conn)
        .await
        .unwrap();
    let author = posts[2].get("author").and_then(Value::as_row).unwrap();
    assert_eq!(author.get("name"), Some(&Value::Text("bob".into())));
}

#[tokio::test]
async fn test_trashed_relation_includes_deleted_rows() {
    let (conn, registry) = blog().await;

    let users = registry
        .query("User")
        .unwrap()
        .filter(Q::eq("id", 3))
        .with_relation("posts", RelationOptions::default().trashed(), Ok)
        .unwrap()
        .get(&conn)
        .await
        .unwrap();

    assert_eq!(attached(&users[0], "posts"), vec![13]);
}

#[tokio::test]
async fn test_belongs_to_many_through_default_pivot() {
    let (conn, registry) = blog().await;

    let posts = registry
        .query("Post")
        .unwrap()
        .order_by("id")
        .with("readers")
        .unwrap()
        .with_count("comments")
        .unwrap()
        .get(&conn)
        .await
        .unwrap();

    assert_eq!(ids(&posts), vec![10, 11, 12]);
    assert_eq!(attached(&posts[0], "readers"), vec![2, 3]);
    assert!(attached(&posts[1], "readers").is_empty());
    assert_eq!(attached(&posts[2], "readers"), vec![1]);
    assert_eq!(posts[0].get("comments"), Some(&Value::Int(1)));
    assert_eq!(posts[1].get("comments"), Some(&Value::Int(0)));
}

#[tokio::test]
async fn test_exists_matches_eager_loading() {
    let (conn, registry) = blog().await;
    let users = registry.query("User").unwrap().order_by("id");

    let loaded = users.clone().with("posts").unwrap().get(&conn).await.unwrap();
    let with_posts: Vec<i64> = loaded
        .iter()
        .filter(|u| !attached(u, "posts").is_empty())
        .filter_map(|u| u.get("id").and_then(Value::as_i64))
        .collect();

    let existing = users.clone().with_exists("posts").unwrap().get(&conn).await.unwrap();
    assert_eq!(ids(&existing), with_posts);
    assert_eq!(ids(&existing), vec![1, 2]);

    let missing = users.clone().with_not_exists("posts").unwrap().get(&conn).await.unwrap();
    assert_eq!(ids(&missing), vec![3]);

    let commented = users
        .clone()
        .with_relation(
            "posts.comments",
            RelationOptions::mode(RelationMode::Exists),
            |q| Ok(q.filter(Q::eq("body", "y"))),
        )
        .unwrap()
        .get(&conn)
        .await
        .unwrap();
    assert_eq!(ids(&commented), vec![2]);

    let read = registry
        .query("Post")
        .unwrap()
        .order_by("id")
        .with_exists("readers")
        .unwrap()
        .get(&conn)
        .await
        .unwrap();
    assert_eq!(ids(&read), vec![10, 12]);
}

#[tokio::test]
async fn test_soft_delete_roundtrip() {
    let (conn, registry) = blog().await;
    let post = registry.query("Post").unwrap().filter(Q::eq("id", 10));

    assert_eq!(post.soft_delete(&conn).await.unwrap(), 1);
    assert_eq!(post.soft_delete(&conn).await.unwrap(), 0);
    assert_eq!(registry.query("Post").unwrap().count(&conn).await.unwrap(), 2);
    assert_eq!(
        registry.query("Post").unwrap().with_trashed().count(&conn).await.unwrap(),
        4
    );
    assert_eq!(
        registry.query("Post").unwrap().only_trashed().count(&conn).await.unwrap(),
        2
    );

    assert_eq!(post.restore(&conn).await.unwrap(), 1);
    assert_eq!(registry.query("Post").unwrap().count(&conn).await.unwrap(), 3);
}

#[tokio::test]
async fn test_missing_table_and_column_are_repaired() {
    let conn = backend().await;
    let mut registry = Registry::new();
    registry
        .register(Model::new("User", "users").columns(vec![
            ColumnInfo::new("id", "INTEGER").primary_key(),
            ColumnInfo::new("email", "TEXT"),
        ]))
        .unwrap();
    registry.set_ddl_provider(Arc::new(SqliteDdl));
    let registry = Arc::new(registry);
    let users = registry.query("User").unwrap();

    users
        .insert(&conn, &Row::new().with("id", 1).with("email", "a@b.c"))
        .await
        .unwrap();
    assert_eq!(users.count(&conn).await.unwrap(), 1);

    run(
        &conn,
        &[
            "DROP TABLE users",
            "CREATE TABLE users (id INTEGER PRIMARY KEY)",
            "INSERT INTO users (id) VALUES (7)",
        ],
    )
    .await;
    let rows = users.get(&conn).await.unwrap();
    assert_eq!(rows[0].get("email"), Some(&Value::Null));
    assert_eq!(conn.describe("users").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_table_without_provider_fails() {
    let conn = backend().await;
    let mut registry = Registry::new();
    registry
        .register(Model::new("User", "users").columns(vec![ColumnInfo::new("id", "INTEGER")]))
        .unwrap();
    let registry = Arc::new(registry);

    let err = registry.query("User").unwrap().get(&conn).await.unwrap_err();
    assert!(matches!(err, QueryError::MissingSchema { .. }));
}

#[tokio::test]
async fn test_transaction_rolls_back_on_error() {
    let (conn, registry) = blog().await;
    let users = registry.query("User").unwrap();

    let result: Result<(), QueryError> = transaction(&conn, |c| {
        let users = users.clone();
        async move {
            users.insert(c, &Row::new().with("id", 4).with("name", "dee")).await?;
            Err(QueryError::NotFound)
        }
    })
    .await;
    assert!(result.is_err());
    assert_eq!(users.count(&conn).await.unwrap(), 3);

    transaction(&conn, |c| {
        let users = users.clone();
        async move {
            users.insert(c, &Row::new().with("id", 4).with("name", "dee")).await
        }
    })
    .await
    .unwrap();
    assert_eq!(users.count(&conn).await.unwrap(), 4);
}

#[tokio::test]
async fn test_pivot_discovery_uses_the_existing_table() {
    let conn = backend().await;
    run(
        &conn,
        &[
            "CREATE TABLE posts (id INTEGER PRIMARY KEY)",
            "CREATE TABLE tags (id INTEGER PRIMARY KEY)",
            "CREATE TABLE tag_post (post_id INTEGER, tag_id INTEGER)",
            "INSERT INTO posts (id) VALUES (1)",
            "INSERT INTO tags (id) VALUES (5)",
            "INSERT INTO tag_post (post_id, tag_id) VALUES (1, 5)",
        ],
    )
    .await;
    let mut registry = Registry::new();
    registry.register(Model::new("Post", "posts")).unwrap();
    registry.register(Model::new("Tag", "tags")).unwrap();
    registry
        .relate("Post", RelationDeclaration::belongs_to_many("tags", "Tag"))
        .unwrap();
    registry.discover_pivot_tables(&conn).await.unwrap();
    let registry = Arc::new(registry);

    let posts = registry
        .query("Post")
        .unwrap()
        .with("tags")
        .unwrap()
        .get(&conn)
        .await
        .unwrap();
    assert_eq!(attached(&posts[0], "tags"), vec![5]);
}

#[tokio::test]
async fn test_introspected_columns_are_selected() {
    let (conn, registry) = blog().await;
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let user = registry
        .query("User")
        .unwrap()
        .debug()
        .find(&conn, 2)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(user.len(), 2);
    assert_eq!(user.get("name"), Some(&Value::Text("bob".into())));
}

/// Posts 1 and 2 share subscriber 5, but the link to post 2 is soft-deleted.
async fn subscriptions() -> (SqliteBackend, Arc<Registry>) {
    let conn = backend().await;
    run(
        &conn,
        &[
            "CREATE TABLE posts (id INTEGER PRIMARY KEY)",
            "CREATE TABLE users (id INTEGER PRIMARY KEY)",
            "CREATE TABLE subs (post_id INTEGER, user_id INTEGER, deleted_at TEXT)",
            "INSERT INTO posts (id) VALUES (1), (2)",
            "INSERT INTO users (id) VALUES (5)",
            "INSERT INTO subs (post_id, user_id, deleted_at) VALUES \
             (1, 5, NULL), (2, 5, '2024-01-01 00:00:00')",
        ],
    )
    .await;
    let mut registry = Registry::new();
    registry.register(Model::new("Post", "posts")).unwrap();
    registry.register(Model::new("User", "users")).unwrap();
    registry
        .register(
            Model::new("Subscription", "subs").config(ModelConfig::new().soft_delete("deleted_at")),
        )
        .unwrap();
    registry
        .relate(
            "Post",
            RelationDeclaration::belongs_to_many("subscribers", "User").pivot_model("Subscription"),
        )
        .unwrap();
    (conn, Arc::new(registry))
}

#[tokio::test]
async fn test_exists_honors_a_soft_deleting_pivot_model() {
    let (conn, registry) = subscriptions().await;
    let posts = registry.query("Post").unwrap().order_by("id");

    let loaded = posts.clone().with("subscribers").unwrap().get(&conn).await.unwrap();
    assert_eq!(attached(&loaded[0], "subscribers"), vec![5]);
    assert!(attached(&loaded[1], "subscribers").is_empty());

    let existing = posts.clone().with_exists("subscribers").unwrap().get(&conn).await.unwrap();
    assert_eq!(ids(&existing), vec![1]);
    let missing = posts
        .clone()
        .with_not_exists("subscribers")
        .unwrap()
        .get(&conn)
        .await
        .unwrap();
    assert_eq!(ids(&missing), vec![2]);

    let trashed = posts
        .clone()
        .with_relation(
            "subscribers",
            RelationOptions::mode(RelationMode::Exists).trashed(),
            Ok,
        )
        .unwrap()
        .get(&conn)
        .await
        .unwrap();
    assert_eq!(ids(&trashed), vec![1, 2]);
    let loaded = posts
        .clone()
        .with_relation("subscribers", RelationOptions::default().trashed(), Ok)
        .unwrap()
        .get(&conn)
        .await
        .unwrap();
    assert_eq!(attached(&loaded[1], "subscribers"), vec![5]);
}

#[tokio::test]
async fn test_scope_limit_does_not_cap_batched_relations() {
    let conn = backend().await;
    run(
        &conn,
        &[
            "CREATE TABLE users (id INTEGER PRIMARY KEY)",
            "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER)",
            "INSERT INTO users (id) VALUES (1), (2), (3)",
            "INSERT INTO posts (id, user_id) VALUES (10, 1), (11, 2), (12, 3)",
        ],
    )
    .await;
    let mut registry = Registry::new();
    registry.register(Model::new("User", "users")).unwrap();
    registry
        .register(Model::new("Post", "posts").global_scope(GlobalScope::new().limit(1)))
        .unwrap();
    registry
        .relate("User", RelationDeclaration::has_many("posts", "Post"))
        .unwrap();
    let registry = Arc::new(registry);
    let users = registry.query("User").unwrap().order_by("id");

    let counted = users.clone().with_count("posts").unwrap().get(&conn).await.unwrap();
    let counts: Vec<Option<&Value>> = counted.iter().map(|u| u.get("posts")).collect();
    assert_eq!(counts, vec![Some(&Value::Int(1)); 3]);

    let loaded = users.clone().with("posts").unwrap().get(&conn).await.unwrap();
    assert_eq!(attached(&loaded[0], "posts"), vec![10]);
    assert_eq!(attached(&loaded[1], "posts"), vec![11]);
    assert_eq!(attached(&loaded[2], "posts"), vec![12]);

    assert_eq!(registry.query("Post").unwrap().get(&conn).await.unwrap().len(), 1);
}
