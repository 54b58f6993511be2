use std::sync::Arc;

use bytes::Bytes;
use sqlx::PgPool;
use storage::{
    dto::{competitor::NewCompetitor, timing::TimingUpdate},
    models::LeaderboardRow,
    repository::competitor::CompetitorRepository,
    services::leaderboard::Leaderboard,
};
use tokio::sync::RwLock;
use validator::Validate;

use crate::error::WebResult;
use crate::live::{ConnectionRegistry, transport::Transport};

/// Applies timing updates to the leaderboard and fans the results out to
/// connected viewers.
///
/// Updates hold the leaderboard write lock until their broadcast is queued,
/// and new viewers hold the read lock while their snapshot is queued. Since
/// the registry applies commands in order, every viewer receives the snapshot
/// first and then exactly the updates the snapshot does not contain.
#[derive(Clone)]
pub struct LeaderboardService {
    leaderboard: Arc<RwLock<Leaderboard>>,
    registry: ConnectionRegistry,
}

impl LeaderboardService {
    pub fn new(leaderboard: Leaderboard, registry: ConnectionRegistry) -> Self {
        Self {
            leaderboard: Arc::new(RwLock::new(leaderboard)),
            registry,
        }
    }

    /// Builds the service from the competitor roster stored in the database.
    pub async fn load(pool: &PgPool, registry: ConnectionRegistry) -> WebResult<Self> {
        let competitors = CompetitorRepository::new(pool).find_all().await?;
        let leaderboard = Leaderboard::new(competitors)?;
        tracing::info!(competitors = leaderboard.len(), "Leaderboard initialized");

        Ok(Self::new(leaderboard, registry))
    }

    pub async fn current_state(&self) -> Vec<LeaderboardRow> {
        self.leaderboard.read().await.current_state()
    }

    pub async fn record_timing(&self, update: TimingUpdate) -> WebResult<LeaderboardRow> {
        let mut leaderboard = self.leaderboard.write().await;

        let row = leaderboard.update(update.chip_id, update.timing_point, update.clock_time)?;
        tracing::info!(
            chip_id = %update.chip_id,
            timing_point = %update.timing_point,
            clock_time = %update.clock_time,
            "Timing recorded"
        );

        let payload = serde_json::to_vec(&row)?;
        self.registry.send_message_to_all(Bytes::from(payload));

        Ok(row)
    }

    /// Serves one viewer: queues the current snapshot, then keeps the
    /// connection open until it terminates.
    pub async fn connect_viewer<T: Transport>(&self, transport: T) -> WebResult<()> {
        let session_id = {
            let leaderboard = self.leaderboard.read().await;
            let snapshot = serde_json::to_vec(&leaderboard.current_state())?;

            let session_id = self.registry.add_client(transport);
            self.registry
                .send_message_to_one(Bytes::from(snapshot), &session_id);
            session_id
        };

        self.registry.start_client(&session_id).await;
        Ok(())
    }
}

/// Inserts the roster entries that are not in the database yet.
pub async fn seed_competitors(pool: &PgPool, roster: &[NewCompetitor]) -> WebResult<usize> {
    let repo = CompetitorRepository::new(pool);
    let mut inserted = 0;

    for competitor in roster {
        competitor.validate()?;
        if repo.add(competitor).await? {
            inserted += 1;
        } else {
            tracing::debug!(chip_id = %competitor.chip_id, "Competitor already registered");
        }
    }

    Ok(inserted)
}
