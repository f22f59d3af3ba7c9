//! Attribute writes the object API refuses
//!
//! Some attribute types cannot be written through the object interface; the
//! server answers ORA-21602. The same assignment still works from PL/SQL, so
//! the write is retried once through an anonymous block run by the
//! execution layer, with the object bound in and out.

use async_trait::async_trait;

use crate::data::Data;
use crate::dbobject::Object;
use crate::error::{Error, Result};

/// Bind value for a generated statement
#[derive(Debug)]
pub enum Bind<'a> {
    /// Object bound as input
    Object(&'a Object),
    /// Scalar or object value bound as input
    Data(&'a Data),
    /// Object bound as output; the execution layer writes the result into it
    ObjectOut(&'a Object),
}

/// Execution layer able to run a PL/SQL block with positional binds
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Execute `sql` with binds `:1`, `:2`, ... in order
    async fn execute(&self, sql: &str, binds: &[Bind<'_>]) -> Result<()>;
}

fn assignment_block(type_name: &str, attribute: &str) -> String {
    format!(
        "DECLARE\n  v_obj {} := :1;\nBEGIN\n  v_obj.{} := :2;\n  :3 := v_obj;\nEND;",
        type_name, attribute
    )
}

/// Set an attribute, retrying ORA-21602 through an anonymous block
///
/// Other failures, or any failure when `limitation_fallback` is off, are
/// returned as they are. If the retry fails too, both errors are reported.
pub async fn set_attribute_with_fallback<E>(
    executor: &E,
    object: &Object,
    name: &str,
    data: &mut Data,
) -> Result<()>
where
    E: StatementExecutor + ?Sized,
{
    let original = match object.set_attribute(name, data) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    let enabled = object
        .context()
        .is_some_and(|ctx| ctx.config.limitation_fallback);
    if !original.is_server_limitation() || !enabled {
        return Err(original);
    }

    let attr = object.object_type().require_attribute("set", name)?;
    let statement = assignment_block(&object.object_type().full_name(), attr.name());
    tracing::debug!(
        type_name = %object.object_type(),
        attribute = attr.name(),
        statement = statement.as_str(),
        "retrying attribute write through PL/SQL"
    );
    let binds = [Bind::Object(object), Bind::Data(data), Bind::ObjectOut(object)];
    match executor.execute(&statement, &binds).await {
        Ok(()) => Ok(()),
        Err(retry) => Err(Error::FallbackFailed {
            statement,
            retry: Box::new(retry),
            original: Box::new(original),
        }),
    }
}
