//! Error types for gift card use cases.

use thiserror::Error;

use crate::Amount;
use crate::allocator::AllocateError;
use crate::model::{CampaignId, InvalidCampaign};
use crate::store::StoreError;

/// Failure of a use case.
///
/// Business-rule rejections of a redemption are not errors; they come back
/// as a [`RedemptionOutcome`](crate::RedemptionOutcome).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("use amount must be positive, got {0}")]
    InvalidAmount(Amount),

    #[error("invalid gift card request: {0}")]
    InvalidRequest(String),

    #[error("gift card {0} not found")]
    NotFound(String),

    #[error(transparent)]
    InvalidCampaign(#[from] InvalidCampaign),

    #[error("campaign {0} not found")]
    CampaignNotFound(CampaignId),

    /// Gift cards still point at the campaign.
    #[error("campaign {id} still has {cards} gift card(s)")]
    CampaignInUse { id: CampaignId, cards: usize },

    /// The card was read but no longer matched when its new state was written.
    #[error("gift card {code} changed or vanished before its new state was written")]
    ConcurrentModification { code: String },

    #[error("could not allocate a gift card number: {0}")]
    Allocation(AllocateError),

    #[error(transparent)]
    Store(StoreError),

    #[error("operation cancelled")]
    Cancelled,
}

impl ServiceError {
    /// True for failures caused by the request itself (4xx-like), false for
    /// failures of the system (5xx-like).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServiceError::InvalidAmount(_)
                | ServiceError::InvalidRequest(_)
                | ServiceError::NotFound(_)
                | ServiceError::InvalidCampaign(_)
                | ServiceError::CampaignNotFound(_)
                | ServiceError::CampaignInUse { .. }
        )
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { key } => ServiceError::NotFound(key),
            other => ServiceError::Store(other),
        }
    }
}

impl From<AllocateError> for ServiceError {
    fn from(err: AllocateError) -> Self {
        match err {
            AllocateError::Cancelled => ServiceError::Cancelled,
            other => ServiceError::Allocation(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_becomes_not_found() {
        let err: ServiceError = StoreError::not_found("GC1").into();
        assert!(matches!(&err, ServiceError::NotFound(key) if key == "GC1"));
        assert!(err.is_client_error());
    }

    #[test]
    fn campaign_failures_are_client_errors() {
        assert!(ServiceError::CampaignNotFound(3).is_client_error());
        assert!(ServiceError::CampaignInUse { id: 3, cards: 1 }.is_client_error());
        assert!(ServiceError::from(InvalidCampaign::NameLength(1)).is_client_error());
    }

    #[test]
    fn backend_errors_are_kept_verbatim() {
        let err: ServiceError = StoreError::Backend("disk full".to_string()).into();
        assert_eq!(err.to_string(), "storage backend error: disk full");
        assert!(!err.is_client_error());
    }

    #[test]
    fn allocation_cancel_is_a_cancel() {
        let err: ServiceError = AllocateError::Cancelled.into();
        assert!(matches!(err, ServiceError::Cancelled));

        let err: ServiceError = AllocateError::ExhaustedAttempts { attempts: 100 }.into();
        assert!(matches!(
            err,
            ServiceError::Allocation(AllocateError::ExhaustedAttempts { attempts: 100 })
        ));
        assert!(!err.is_client_error());
    }

    #[test]
    fn races_are_system_errors() {
        let err = ServiceError::ConcurrentModification {
            code: "GIFT-1".to_string(),
        };
        assert!(!err.is_client_error());
    }
}
