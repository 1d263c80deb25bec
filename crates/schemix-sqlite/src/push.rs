//! Push-based synchronization: make the live schema match a declared one
//! without migration files.

use tracing::info;

use schemix_core::dialect::{compile_plan, stored_schema};
use schemix_core::driver::{Driver, ExecutionMode, Introspect};
use schemix_core::{diff_schemas, AllowList, DdlOperation, DiffWarning, Result, Schema};

/// What a push did, or would do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushReport {
    /// Operations applied (or planned), in order.
    pub operations: Vec<DdlOperation>,
    /// SQL statements executed (or to execute), in order.
    pub statements: Vec<String>,
    /// Differences that were detected but not translated into DDL.
    pub warnings: Vec<DiffWarning>,
    /// Whether the statements were executed.
    pub executed: bool,
}

impl PushReport {
    /// True when the live schema already matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Computes the statements a push would execute, without executing them.
///
/// `desired` is compared in the form the driver's dialect stores it, see
/// [`stored_schema`].
///
/// # Errors
///
/// - [`schemix_core::Error::ExecutionFailed`] if introspection fails.
/// - [`schemix_core::Error::RequiresConfirmation`] if destructive changes
///   are not covered by `allow`.
/// - [`schemix_core::Error::UnsupportedFeature`] if the driver's dialect
///   cannot express an operation.
pub async fn plan<D>(driver: &D, desired: &Schema, allow: &AllowList) -> Result<PushReport>
where
    D: Driver + Introspect,
{
    let desired = stored_schema(desired, driver.dialect())?;
    let actual = driver.introspect().await?;
    let diff = diff_schemas(&desired, &actual, allow);
    let warnings = diff.warnings.clone();
    let operations = diff.confirmed()?;
    let statements = compile_plan(&operations, driver.dialect())?;
    Ok(PushReport {
        operations,
        statements,
        warnings,
        executed: false,
    })
}

/// Brings the live schema in line with `desired`.
///
/// Nothing is executed unless the whole plan compiles, so an unsupported
/// or unconfirmed change leaves the database untouched. Statements run in
/// order; a failure stops the push and earlier statements stay applied.
///
/// # Errors
///
/// Same as [`plan`], plus [`schemix_core::Error::ExecutionFailed`] when a
/// statement fails.
pub async fn push<D>(driver: &D, desired: &Schema, allow: &AllowList) -> Result<PushReport>
where
    D: Driver + Introspect,
{
    let mut report = plan(driver, desired, allow).await?;
    if report.is_empty() {
        info!("Schema is up to date");
        return Ok(report);
    }

    for sql in &report.statements {
        info!(sql = %sql, "Applying schema change");
        driver
            .execute(sql, &[], ExecutionMode::AffectedCount)
            .await?;
    }
    report.executed = true;

    info!(
        statements = report.statements.len(),
        "Schema push applied successfully"
    );
    Ok(report)
}
