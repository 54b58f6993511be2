use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Immutable identity of a race participant.
///
/// The chip id identifies the timing transponder and is never sent to viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Competitor {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip)]
    pub chip_id: Uuid,
    pub start_number: i32,
}
