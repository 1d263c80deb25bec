#![allow(dead_code)]

use schemix_core::schema::{
    boolean, integer, text, timestamp, varchar, ForeignKeyAction, Schema, Table, TableBuilder,
};
use schemix_sqlite::SqliteDriver;
use sqlx::sqlite::SqlitePoolOptions;

pub async fn memory_driver() -> SqliteDriver {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");
    SqliteDriver::from_pool(pool)
        .await
        .expect("Failed to enable foreign keys")
}

pub fn users() -> Table {
    TableBuilder::new("users")
        .column(integer("id").primary_key().autoincrement())
        .column(varchar("name", 100).not_null())
        .column(varchar("email", 255).not_null().unique())
        .column(boolean("active").not_null().default(true))
        .build()
        .unwrap_or_else(|e| panic!("invalid users table: {e}"))
}

pub fn posts() -> Table {
    TableBuilder::declare("Post")
        .column(integer("id").primary_key().autoincrement())
        .column(varchar("title", 200).not_null())
        .column(text("body"))
        .column(
            integer("author_id")
                .not_null()
                .references("users", "id")
                .on_delete(ForeignKeyAction::Cascade),
        )
        .column(boolean("published").not_null().default(false))
        .column(timestamp("created_at").default_expr("CURRENT_TIMESTAMP"))
        .build()
        .unwrap_or_else(|e| panic!("invalid posts table: {e}"))
}

/// The blog schema: `users` and `posts`, posts referencing their author.
pub fn blog_schema() -> Schema {
    Schema::new([users(), posts()]).unwrap_or_else(|e| panic!("invalid blog schema: {e}"))
}
