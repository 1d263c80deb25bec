//! # schemix-sqlite
//!
//! SQLite collaborators for `schemix-core`: a [`SqliteDriver`] that executes
//! compiled statements over an `sqlx` pool, introspection of the live schema,
//! and push-based synchronization.
//!
//! # How SQLite differs from other dialects
//!
//! - **[Type affinity]**: any column can store any value regardless of its
//!   declared type. Booleans are stored as `0`/`1`; dates, times, timestamps
//!   and JSON are bound as text.
//! - **Limited [ALTER TABLE]**: SQLite supports `ADD COLUMN` and
//!   `DROP COLUMN` (since 3.35.0) but not `ALTER COLUMN` or
//!   `ADD CONSTRAINT`. A push that needs either fails with
//!   `UnsupportedFeature` before anything is executed.
//! - **[Foreign keys]** are only enforced when `PRAGMA foreign_keys` is on;
//!   [`SqliteDriver`] turns it on for every connection it opens.
//!
//! [Type affinity]: https://www.sqlite.org/datatype3.html
//! [ALTER TABLE]: https://www.sqlite.org/lang_altertable.html
//! [Foreign keys]: https://www.sqlite.org/foreignkeys.html
//!
//! ## Example
//!
//! ```rust,no_run
//! use schemix_core::schema::{integer, text, Schema, TableBuilder};
//! use schemix_core::AllowList;
//! use schemix_sqlite::{push, SqliteDriver};
//!
//! # async fn run() -> schemix_core::Result<()> {
//! let driver = SqliteDriver::connect("sqlite:app.db").await?;
//! let notes = TableBuilder::new("notes")
//!     .column(integer("id").primary_key().autoincrement())
//!     .column(text("body").not_null())
//!     .build()?;
//! let report = push(&driver, &Schema::new([notes])?, &AllowList::new()).await?;
//! for sql in &report.statements {
//!     println!("{sql};");
//! }
//! # Ok(())
//! # }
//! ```

mod driver;
mod introspect;
mod push;

pub use driver::SqliteDriver;
pub use introspect::introspect_pool;
pub use push::{plan, push, PushReport};
