//! Push-based synchronization against an in-memory SQLite database.

mod common;

use common::{blog_schema, memory_driver, posts, users};
use schemix_core::dialect::SqliteDialect;
use schemix_core::schema::{bigint, boolean, integer, text, varchar, Schema, TableBuilder};
use schemix_core::{
    compile, insert, select, AllowList, Driver, Error, ExecutionMode, Introspect, SqlValue,
};
use schemix_sqlite::{plan, push};

#[tokio::test]
async fn push_then_introspect_round_trips() {
    let driver = memory_driver().await;
    let desired = blog_schema();

    let report = push(&driver, &desired, &AllowList::new()).await.unwrap();
    assert!(report.executed);
    assert_eq!(report.statements.len(), 2);
    assert!(report.statements[0].starts_with(r#"CREATE TABLE "users""#));

    let live = driver.introspect().await.unwrap();
    assert_eq!(live, desired);
}

#[tokio::test]
async fn second_push_is_a_no_op() {
    let driver = memory_driver().await;
    push(&driver, &blog_schema(), &AllowList::new()).await.unwrap();

    let report = push(&driver, &blog_schema(), &AllowList::new()).await.unwrap();
    assert!(report.is_empty());
    assert!(!report.executed);
    assert!(report.statements.is_empty());
}

#[tokio::test]
async fn bigint_autoincrement_key_settles() {
    let driver = memory_driver().await;
    let events = TableBuilder::new("events")
        .column(bigint("id").primary_key().autoincrement())
        .column(text("kind").not_null())
        .build()
        .unwrap();
    let desired = Schema::new([events]).unwrap();
    push(&driver, &desired, &AllowList::new()).await.unwrap();

    let report = plan(&driver, &desired, &AllowList::new()).await.unwrap();
    assert!(report.is_empty());
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn additive_changes_are_applied() {
    let driver = memory_driver().await;
    push(&driver, &blog_schema(), &AllowList::new()).await.unwrap();

    let users_v2 = TableBuilder::new("users")
        .columns(users().columns().iter().cloned())
        .column(text("bio"))
        .build()
        .unwrap();
    let tags = TableBuilder::declare("Tag")
        .column(integer("id").primary_key())
        .column(integer("post_id").not_null().references("posts", "id"))
        .column(varchar("label", 50).not_null())
        .unique(&["post_id", "label"])
        .build()
        .unwrap();
    let desired = Schema::new([users_v2, posts(), tags]).unwrap();

    let report = push(&driver, &desired, &AllowList::new()).await.unwrap();
    assert_eq!(
        report.statements.last().map(String::as_str),
        Some(r#"ALTER TABLE "users" ADD COLUMN "bio" TEXT"#)
    );
    assert_eq!(driver.introspect().await.unwrap(), desired);
}

#[tokio::test]
async fn destructive_changes_need_confirmation() {
    let driver = memory_driver().await;
    push(&driver, &blog_schema(), &AllowList::new()).await.unwrap();
    let only_users = Schema::new([users()]).unwrap();

    let err = push(&driver, &only_users, &AllowList::new()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::RequiresConfirmation { ref operations } if operations == &["drop table posts"]
    ));
    assert!(driver.introspect().await.unwrap().get("posts").is_some());

    let allow = AllowList::new().allow_drop_table("posts");
    let planned = plan(&driver, &only_users, &allow).await.unwrap();
    assert!(!planned.executed);
    assert_eq!(planned.statements, vec![String::from(r#"DROP TABLE "posts""#)]);

    push(&driver, &only_users, &allow).await.unwrap();
    assert_eq!(driver.introspect().await.unwrap(), only_users);
}

#[tokio::test]
async fn populated_related_tables_are_dropped() {
    let driver = memory_driver().await;
    let authors = TableBuilder::new("authors")
        .column(integer("id").primary_key())
        .column(text("name").not_null())
        .build()
        .unwrap();
    let books = TableBuilder::new("books")
        .column(integer("id").primary_key())
        .column(integer("author_id").not_null().references("authors", "id"))
        .build()
        .unwrap();
    push(&driver, &Schema::new([authors, books]).unwrap(), &AllowList::new())
        .await
        .unwrap();
    for (sql, params) in [
        (
            r#"INSERT INTO "authors" ("id", "name") VALUES (?, ?)"#,
            vec![SqlValue::Int(1), SqlValue::Text(String::from("Le Guin"))],
        ),
        (
            r#"INSERT INTO "books" ("id", "author_id") VALUES (?, ?)"#,
            vec![SqlValue::Int(1), SqlValue::Int(1)],
        ),
    ] {
        driver
            .execute(sql, &params, ExecutionMode::AffectedCount)
            .await
            .unwrap();
    }

    let report = push(&driver, &Schema::default(), &AllowList::new().allow_all())
        .await
        .unwrap();
    assert_eq!(
        report.statements,
        vec![
            String::from(r#"DROP TABLE "books""#),
            String::from(r#"DROP TABLE "authors""#),
        ]
    );
    assert!(driver.introspect().await.unwrap().is_empty());
}

#[tokio::test]
async fn unsupported_change_leaves_database_untouched() {
    let driver = memory_driver().await;
    push(&driver, &blog_schema(), &AllowList::new()).await.unwrap();

    let relaxed = TableBuilder::new("users")
        .column(integer("id").primary_key().autoincrement())
        .column(varchar("name", 100))
        .column(varchar("email", 255).not_null().unique())
        .column(boolean("active").not_null().default(true))
        .column(text("bio"))
        .build()
        .unwrap();
    let desired = Schema::new([relaxed, posts()]).unwrap();

    let err = push(&driver, &desired, &AllowList::new()).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedFeature { .. }));
    assert_eq!(driver.introspect().await.unwrap(), blog_schema());
}

#[tokio::test]
async fn compiled_queries_execute() {
    let driver = memory_driver().await;
    let schema = blog_schema();
    push(&driver, &schema, &AllowList::new()).await.unwrap();
    let users = schema.table("users").unwrap();
    let posts = schema.table("posts").unwrap();

    let add_user = insert(users)
        .values([("name", "Ann"), ("email", "ann@example.com")])
        .unwrap()
        .build()
        .unwrap();
    let compiled = compile(&add_user, &SqliteDialect).unwrap();
    assert_eq!(driver.execute_compiled(&compiled).await.unwrap(), 1);

    let add_post = insert(posts)
        .value("title", "Hello")
        .unwrap()
        .value("author_id", 1)
        .unwrap()
        .value("published", true)
        .unwrap()
        .build()
        .unwrap();
    driver
        .execute_compiled(&compile(&add_post, &SqliteDialect).unwrap())
        .await
        .unwrap();

    let listing = select([posts.col("title").unwrap(), users.col("name").unwrap()])
        .from(posts)
        .inner_join(
            users,
            posts
                .col("author_id")
                .unwrap()
                .eq(users.col("id").unwrap())
                .unwrap(),
        )
        .unwrap()
        .where_clause(posts.col("published").unwrap().eq(true).unwrap())
        .unwrap()
        .order_by(posts.col("id").unwrap())
        .limit(10)
        .unwrap()
        .build()
        .unwrap();
    let rows = driver
        .fetch_all(&compile(&listing, &SqliteDialect).unwrap())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get::<String>("title").unwrap(), "Hello");
    assert_eq!(rows[0].get::<String>("name").unwrap(), "Ann");
}

#[tokio::test]
async fn foreign_keys_are_enforced() {
    let driver = memory_driver().await;
    push(&driver, &blog_schema(), &AllowList::new()).await.unwrap();

    let err = driver
        .execute(
            r#"INSERT INTO "posts" ("title", "author_id") VALUES (?, ?)"#,
            &[SqlValue::Text(String::from("orphan")), SqlValue::Int(42)],
            ExecutionMode::AffectedCount,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ExecutionFailed(_)));
}
