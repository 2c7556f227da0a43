//! The `{ "data": ... }` envelope every successful response uses.

use serde::Serialize;

/// ```ignore
/// Ok(Json(DataResponse { data: scenarios }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
