//! # schemix-core
//!
//! A type-safe SQL query builder and schema model.
//!
//! This crate provides:
//! - A schema model: tables and columns declared once, validated on build
//! - A typed expression model whose combinators reject ill-typed operands
//! - Immutable query builders for SELECT, INSERT, UPDATE and DELETE
//! - A dialect compiler producing SQL text plus bound parameters
//! - A schema differ for push-based synchronization
//!
//! The crate performs no I/O. Executing statements and reading the live
//! schema are delegated to driver crates through the [`driver`] traits.
//!
//! ## Building a query
//!
//! ```rust
//! use schemix_core::dialect::SqliteDialect;
//! use schemix_core::schema::{boolean, integer, text, varchar, Schema, TableBuilder};
//! use schemix_core::{compile, select, SqlValue};
//!
//! let users = TableBuilder::new("users")
//!     .column(integer("id").primary_key().autoincrement())
//!     .column(varchar("name", 100).not_null())
//!     .build()
//!     .unwrap();
//! let posts = TableBuilder::declare("Post")
//!     .column(integer("id").primary_key())
//!     .column(varchar("title", 200).not_null())
//!     .column(text("body"))
//!     .column(integer("author_id").not_null().references("users", "id"))
//!     .column(boolean("published").not_null().default(false))
//!     .build()
//!     .unwrap();
//! let schema = Schema::new([users, posts]).unwrap();
//! let (users, posts) = (schema.table("users").unwrap(), schema.table("posts").unwrap());
//!
//! let query = select([posts.col("title").unwrap(), users.col("name").unwrap()])
//!     .from(posts)
//!     .inner_join(users, posts.col("author_id").unwrap().eq(users.col("id").unwrap()).unwrap())
//!     .unwrap()
//!     .where_clause(posts.col("published").unwrap().eq(true).unwrap())
//!     .unwrap()
//!     .order_by(posts.col("id").unwrap())
//!     .limit(10)
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let compiled = compile(&query, &SqliteDialect).unwrap();
//! assert_eq!(
//!     compiled.sql,
//!     r#"SELECT "posts"."title", "users"."name" FROM "posts" INNER JOIN "users" ON "posts"."author_id" = "users"."id" WHERE "posts"."published" = ? ORDER BY "posts"."id" LIMIT ?"#
//! );
//! assert_eq!(compiled.params, vec![SqlValue::Bool(true), SqlValue::Int(10)]);
//! ```
//!
//! ## SQL Injection Prevention
//!
//! Literals are always bound as parameters:
//!
//! ```rust
//! use schemix_core::dialect::SqliteDialect;
//! use schemix_core::schema::{integer, text, TableBuilder};
//! use schemix_core::{compile, select, SqlValue};
//!
//! let users = TableBuilder::new("users")
//!     .column(integer("id").primary_key())
//!     .column(text("name"))
//!     .build()
//!     .unwrap();
//!
//! let user_input = "'; DROP TABLE users; --";
//! let query = select([users.col("id").unwrap()])
//!     .from(&users)
//!     .where_clause(users.col("name").unwrap().eq(user_input).unwrap())
//!     .unwrap()
//!     .build()
//!     .unwrap();
//!
//! let compiled = compile(&query, &SqliteDialect).unwrap();
//! assert_eq!(compiled.sql, r#"SELECT "users"."id" FROM "users" WHERE "users"."name" = ?"#);
//! assert_eq!(compiled.params, vec![SqlValue::Text(user_input.to_string())]);
//! ```

pub mod compile;
pub mod dialect;
pub mod diff;
pub mod driver;
pub mod error;
pub mod expr;
pub mod query;
pub mod schema;
pub mod types;
pub mod value;

pub use compile::{compile, CompiledQuery};
pub use dialect::{Dialect, Feature, PlaceholderStyle};
pub use diff::{diff_schemas, AllowList, DdlOperation, DiffWarning, SchemaDiff};
pub use driver::{Driver, ExecutionMode, ExecutionOutcome, Introspect, Row};
pub use error::{Error, Result};
pub use expr::{
    avg, count, count_all, count_distinct, max, min, sum, ColumnRef, Expr, IntoOperand,
    OrderDirection, Projection,
};
pub use query::{delete, insert, select, update, Query};
pub use schema::{Column, ColumnBuilder, Registry, Schema, Table, TableBuilder};
pub use types::{ColumnType, TypeFamily};
pub use value::{FromSqlValue, SqlValue, ToSqlValue};
