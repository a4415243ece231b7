use chrono::Utc;
use tracing::info;

use motorhub_db::BlockRepositoryRef;
use motorhub_types::{BlockRelation, CarId, Participant};

use crate::error::ChatError;

/// Who has blocked whom, per car. A block is one-sided: the blocker stops
/// seeing the blocked party's new messages about that car, nothing else.
#[derive(Clone)]
pub struct BlockingPolicy {
    repo: BlockRepositoryRef,
}

impl BlockingPolicy {
    pub fn new(repo: BlockRepositoryRef) -> Self {
        Self { repo }
    }

    pub async fn is_blocked(
        &self,
        blocker: &Participant,
        other: &Participant,
        car_id: &CarId,
    ) -> Result<bool, ChatError> {
        Ok(self.repo.is_blocked(blocker, other, car_id.as_str()).await?)
    }

    /// Returns false if the block already existed.
    pub async fn block(
        &self,
        blocker: &Participant,
        other: &Participant,
        car_id: &CarId,
    ) -> Result<bool, ChatError> {
        if blocker == other {
            return Err(ChatError::InvalidInput("cannot block yourself".into()));
        }

        let created = self
            .repo
            .insert(&BlockRelation {
                blocker: blocker.clone(),
                blocked: other.clone(),
                car_id: car_id.clone(),
                created_at: Utc::now(),
            })
            .await?;

        if created {
            info!(blocker = %blocker, blocked = %other, car = %car_id, "Block added");
        }
        Ok(created)
    }

    /// Returns false if there was no block to remove.
    pub async fn unblock(
        &self,
        blocker: &Participant,
        other: &Participant,
        car_id: &CarId,
    ) -> Result<bool, ChatError> {
        let removed = self.repo.remove(blocker, other, car_id.as_str()).await?;
        if removed {
            info!(blocker = %blocker, blocked = %other, car = %car_id, "Block removed");
        }
        Ok(removed)
    }

    pub async fn blocked_by(&self, blocker: &Participant, car_id: &CarId) -> Result<Vec<BlockRelation>, ChatError> {
        Ok(self.repo.list_blocked(blocker, car_id.as_str()).await?)
    }
}
