#![allow(dead_code)]

use std::sync::Arc;

use schemix_core::schema::{
    boolean, integer, text, timestamp, varchar, ForeignKeyAction, Schema, Table, TableBuilder,
};
use schemix_core::ColumnRef;

/// The blog schema: `users` and `posts`, posts referencing their author.
pub fn blog_schema() -> Schema {
    let users = TableBuilder::new("users")
        .column(integer("id").primary_key().autoincrement())
        .column(varchar("name", 100).not_null())
        .column(varchar("email", 255).not_null().unique())
        .column(boolean("active").not_null().default(true))
        .build()
        .unwrap_or_else(|e| panic!("invalid users table: {e}"));

    let posts = TableBuilder::declare("Post")
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
        .unwrap_or_else(|e| panic!("invalid posts table: {e}"));

    Schema::new([users, posts]).unwrap_or_else(|e| panic!("invalid blog schema: {e}"))
}

pub fn table(schema: &Schema, name: &str) -> Arc<Table> {
    Arc::clone(
        schema
            .table(name)
            .unwrap_or_else(|e| panic!("missing table {name}: {e}")),
    )
}

pub fn col(table: &Table, name: &str) -> ColumnRef {
    table
        .col(name)
        .unwrap_or_else(|e| panic!("missing column {name}: {e}"))
}
