use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Roster entry for an active employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "display_name": "John Doe"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    /// Badge number (matricule).
    #[schema(example = "EMP-001")]
    pub employee_code: String,

    #[schema(example = "John Doe")]
    pub display_name: String,
}
