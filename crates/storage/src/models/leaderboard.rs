use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Competitor, Timings};

/// One competitor together with its current timing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardRow {
    #[serde(flatten)]
    pub competitor: Competitor,
    pub timings: Timings,
}

impl LeaderboardRow {
    pub fn new(competitor: Competitor) -> Self {
        Self {
            competitor,
            timings: Timings::default(),
        }
    }
}

impl From<Competitor> for LeaderboardRow {
    fn from(competitor: Competitor) -> Self {
        Self::new(competitor)
    }
}
