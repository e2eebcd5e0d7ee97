//! Campaign use cases.

use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use super::{GiftCardService, ServiceError, cancellable};
use crate::model::{Campaign, CampaignDetails, CampaignId};
use crate::store::{CampaignStore, GiftCardStore, StoreError};

/// Maps a missing campaign to [`ServiceError::CampaignNotFound`].
fn campaign_error(id: CampaignId, err: StoreError) -> ServiceError {
    match err {
        StoreError::NotFound { .. } => ServiceError::CampaignNotFound(id),
        other => ServiceError::Store(other),
    }
}

impl<S: GiftCardStore + CampaignStore> GiftCardService<S> {
    pub async fn create_campaign(
        &self,
        cancel: &CancellationToken,
        details: CampaignDetails,
    ) -> Result<Campaign, ServiceError> {
        details.validate()?;

        let reference = format!("CAMP-{}", Uuid::new_v4());
        let campaign =
            cancellable(cancel, self.store.create_campaign(reference, details)).await??;

        info!(
            id = campaign.id,
            reference = %campaign.reference,
            name = %campaign.details.name,
            "campaign created"
        );
        Ok(campaign)
    }

    pub async fn get_campaign(
        &self,
        cancel: &CancellationToken,
        id: CampaignId,
    ) -> Result<Campaign, ServiceError> {
        cancellable(cancel, self.store.get_campaign(id))
            .await?
            .map_err(|err| campaign_error(id, err))
    }

    pub async fn list_campaigns(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Campaign>, ServiceError> {
        Ok(cancellable(cancel, self.store.list_campaigns()).await??)
    }

    pub async fn search_campaigns(
        &self,
        cancel: &CancellationToken,
        query: &str,
    ) -> Result<Vec<Campaign>, ServiceError> {
        Ok(cancellable(cancel, self.store.search_campaigns(query)).await??)
    }

    /// Replace every editable field of an existing campaign.
    pub async fn update_campaign(
        &self,
        cancel: &CancellationToken,
        id: CampaignId,
        details: CampaignDetails,
    ) -> Result<(), ServiceError> {
        details.validate()?;
        self.get_campaign(cancel, id).await?;

        cancellable(cancel, self.store.update_campaign(id, details))
            .await?
            .map_err(|err| campaign_error(id, err))?;

        info!(id, "campaign updated");
        Ok(())
    }

    /// Delete a campaign no gift card belongs to.
    pub async fn delete_campaign(
        &self,
        cancel: &CancellationToken,
        id: CampaignId,
    ) -> Result<(), ServiceError> {
        self.get_campaign(cancel, id).await?;

        let cards = self
            .list(cancel)
            .await?
            .iter()
            .filter(|card| card.campaign_id == Some(id))
            .count();
        if cards > 0 {
            return Err(ServiceError::CampaignInUse { id, cards });
        }

        cancellable(cancel, self.store.delete_campaign(id))
            .await?
            .map_err(|err| campaign_error(id, err))?;

        info!(id, "campaign deleted");
        Ok(())
    }
}
