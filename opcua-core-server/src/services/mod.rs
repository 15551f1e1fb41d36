//! Service handlers. Each handler consumes an already-decoded request
//! structure against the server core and a session, and produces the
//! response structure. Per-item failures land in the per-item result
//! slots; the service level result is only used for request shape errors.

pub mod attribute;
pub mod method;
pub mod monitored_items;
pub mod node_management;
pub mod subscription;
pub mod view;

use opcua_types::StatusCode;

/// Check the operation count of a request against the per-call limit.
pub(crate) fn check_operation_count(
    count: usize,
    max_operations: usize,
) -> Result<(), StatusCode> {
    if count == 0 {
        return Err(StatusCode::BadNothingToDo);
    }
    if max_operations != 0 && count > max_operations {
        return Err(StatusCode::BadTooManyOperations);
    }
    Ok(())
}
