//! Gift card use cases.
//!
//! Ties the number allocator and the redemption state machine to a
//! [`GiftCardStore`], and manages the campaigns cards can belong to. Every
//! storage call gives way to the caller's [`CancellationToken`] and then
//! fails with [`ServiceError::Cancelled`].

use chrono::{DateTime, NaiveDate, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::Amount;
use crate::allocator::{Allocator, AllocatorConfig};
use crate::engine::{Evaluation, RedemptionOutcome, RedemptionReason, evaluate};
use crate::model::{GiftCardSnapshot, GiftCardStatus, GiftCardUpdate, NewGiftCard};
use crate::store::{CampaignStore, GiftCardStore, StoreError};

mod campaign;
mod error;
pub use error::ServiceError;

/// Run a storage call unless `cancel` fires first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<Result<T, StoreError>, ServiceError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ServiceError::Cancelled),
        result = call => Ok(result),
    }
}

pub struct GiftCardService<S> {
    store: Arc<S>,
    allocator: Allocator,
    /// Seeds a fresh generator for each allocation.
    rng: Mutex<StdRng>,
}

/// Public API
impl<S: GiftCardStore + CampaignStore> GiftCardService<S> {
    pub fn new(store: Arc<S>, config: AllocatorConfig) -> Self {
        Self::with_rng(store, config, StdRng::from_os_rng())
    }

    /// Deterministic number generation, for tests and reproducible runs.
    pub fn with_seed(store: Arc<S>, config: AllocatorConfig, seed: u64) -> Self {
        Self::with_rng(store, config, StdRng::seed_from_u64(seed))
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Allocate a number not yet present in the store.
    pub async fn generate_number(
        &self,
        cancel: &CancellationToken,
    ) -> Result<String, ServiceError> {
        let mut rng = self.call_rng();
        let store = &self.store;
        let number = self
            .allocator
            .allocate(&mut rng, cancel, |candidate| async move {
                store.number_exists(&candidate).await
            })
            .await?;
        Ok(number)
    }

    /// Issue a new gift card under a fresh code and number.
    ///
    /// A `campaign_id`, when given, must name an existing campaign.
    pub async fn create(
        &self,
        cancel: &CancellationToken,
        request: NewGiftCard,
    ) -> Result<GiftCardSnapshot, ServiceError> {
        validate_card(
            request.balance,
            request.status,
            request.expiration_date,
            Utc::now().date_naive(),
        )?;
        if let Some(id) = request.campaign_id {
            self.get_campaign(cancel, id).await?;
        }

        let code = format!("GIFT-{}", Uuid::new_v4());
        let number = self.generate_number(cancel).await?;
        let card = request.into_snapshot(code, number);

        cancellable(cancel, self.store.create(card.clone())).await??;

        info!(
            code = %card.code,
            number = %card.number,
            balance = %card.balance,
            "gift card created"
        );
        Ok(card)
    }

    pub async fn get_by_code(
        &self,
        cancel: &CancellationToken,
        code: &str,
    ) -> Result<GiftCardSnapshot, ServiceError> {
        Ok(cancellable(cancel, self.store.get_by_code(code)).await??)
    }

    pub async fn get_by_number(
        &self,
        cancel: &CancellationToken,
        number: &str,
    ) -> Result<GiftCardSnapshot, ServiceError> {
        Ok(cancellable(cancel, self.store.get_by_number(number)).await??)
    }

    pub async fn list(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<GiftCardSnapshot>, ServiceError> {
        Ok(cancellable(cancel, self.store.list()).await??)
    }

    pub async fn search(
        &self,
        cancel: &CancellationToken,
        query: &str,
    ) -> Result<Vec<GiftCardSnapshot>, ServiceError> {
        Ok(cancellable(cancel, self.store.search(query)).await??)
    }

    pub async fn update(
        &self,
        cancel: &CancellationToken,
        code: &str,
        update: GiftCardUpdate,
    ) -> Result<(), ServiceError> {
        let current = self.get_by_code(cancel, code).await?;
        validate_card(
            update.balance.unwrap_or(current.balance),
            update.status.unwrap_or(current.status),
            update.expiration_date.unwrap_or(current.expiration_date),
            Utc::now().date_naive(),
        )?;

        cancellable(cancel, self.store.update(code, update)).await??;

        info!(code, "gift card updated");
        Ok(())
    }

    pub async fn delete(&self, cancel: &CancellationToken, code: &str) -> Result<(), ServiceError> {
        self.get_by_code(cancel, code).await?;
        cancellable(cancel, self.store.delete(code)).await??;

        info!(code, "gift card deleted");
        Ok(())
    }

    /// Redeem `amount` from the card with the given public number.
    pub async fn use_amount(
        &self,
        cancel: &CancellationToken,
        number: &str,
        amount: Amount,
    ) -> Result<RedemptionOutcome, ServiceError> {
        self.use_amount_at(cancel, number, amount, Utc::now()).await
    }

    /// Same as [`use_amount`](Self::use_amount) with an explicit clock.
    ///
    /// Rejections by business rule come back as `Ok` with a non-success
    /// reason. A card found expired is written back as `expired`; failing to
    /// write that is logged and the `Expired` outcome is still returned.
    /// Failing to write a deduction is an error, since the caller cannot
    /// assume it took effect. Cancellation during either write fails with
    /// [`ServiceError::Cancelled`].
    pub async fn use_amount_at(
        &self,
        cancel: &CancellationToken,
        number: &str,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<RedemptionOutcome, ServiceError> {
        if !amount.is_positive() {
            return Err(ServiceError::InvalidAmount(amount));
        }

        let card = self.get_by_number(cancel, number).await?;
        let Evaluation {
            outcome,
            should_persist,
        } = evaluate(&card, amount, now);

        if !should_persist {
            info!(
                number,
                amount = %amount,
                balance = %card.balance,
                reason = %outcome.reason,
                "gift card use rejected"
            );
            return Ok(outcome);
        }

        let written = cancellable(
            cancel,
            self.store
                .write_balance_and_status(&card.code, outcome.new_balance, outcome.new_status),
        )
        .await?;

        if outcome.reason == RedemptionReason::Expired {
            match written {
                Ok(()) => info!(number, code = %card.code, "gift card marked expired"),
                Err(err) => warn!(
                    number,
                    code = %card.code,
                    error = %err,
                    "could not mark gift card expired"
                ),
            }
            return Ok(outcome);
        }

        match written {
            Ok(()) => {}
            Err(StoreError::NotFound { .. }) => {
                warn!(number, code = %card.code, "gift card vanished before use was recorded");
                return Err(ServiceError::ConcurrentModification { code: card.code });
            }
            Err(err) => return Err(ServiceError::Store(err)),
        }

        info!(
            number,
            amount = %amount,
            balance = %outcome.new_balance,
            status = %outcome.new_status,
            "gift card amount used"
        );
        Ok(outcome)
    }
}

/// Private API
impl<S> GiftCardService<S> {
    fn with_rng(store: Arc<S>, config: AllocatorConfig, rng: StdRng) -> Self {
        Self {
            store,
            allocator: Allocator::new(config),
            rng: Mutex::new(rng),
        }
    }

    /// Independent generator per call so concurrent allocations never share a sequence.
    fn call_rng(&self) -> StdRng {
        let mut parent = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        StdRng::from_rng(&mut *parent)
    }
}

/// Checks the invariants a stored card must keep: a non-negative balance,
/// zero balance once used, and `expired` only after the expiration date.
fn validate_card(
    balance: Amount,
    status: GiftCardStatus,
    expiration_date: NaiveDate,
    today: NaiveDate,
) -> Result<(), ServiceError> {
    if balance < Amount::ZERO {
        return Err(ServiceError::InvalidRequest(format!(
            "balance {balance} is negative"
        )));
    }
    if status == GiftCardStatus::Used && !balance.is_zero() {
        return Err(ServiceError::InvalidRequest(format!(
            "a used card cannot hold balance {balance}"
        )));
    }
    if status == GiftCardStatus::Expired && today <= expiration_date {
        return Err(ServiceError::InvalidRequest(format!(
            "card expiring on {expiration_date} cannot be expired yet"
        )));
    }
    Ok(())
}
