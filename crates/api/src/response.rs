//! Shared response envelope types for API handlers.
//!
//! All API responses use a `{ "data": ... }` envelope; the recorder
//! webhook replies with its own `{code, msg}` shape defined next to the
//! handler.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
