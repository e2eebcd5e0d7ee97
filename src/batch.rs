//! Batch processing of gift card operations.
//!
//! Operations refer to cards by a caller-chosen label. The runner keeps the
//! label to card mapping, applies each operation through the service and
//! logs the result. A failed operation never stops the batch.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use thiserror::Error;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Amount;
use crate::engine::RedemptionReason;
use crate::model::{GiftCardSnapshot, GiftCardStatus, GiftCardUpdate, NewGiftCard, Operation};
use crate::service::{GiftCardService, ServiceError};
use crate::store::{CampaignStore, GiftCardStore};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("card {0} was never issued")]
    UnknownCard(String),

    #[error("card {0} was already issued")]
    DuplicateCard(String),

    #[error("{0}")]
    Rejected(RedemptionReason),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Debug, Clone)]
struct IssuedCard {
    code: String,
    number: String,
}

pub struct BatchRunner<S> {
    service: GiftCardService<S>,
    cancel: CancellationToken,
    cards: HashMap<String, IssuedCard>,
    /// Labels in issue order
    labels: Vec<String>,
}

/// Public API
impl<S: GiftCardStore + CampaignStore> BatchRunner<S> {
    pub fn new(service: GiftCardService<S>) -> Self {
        Self {
            service,
            cancel: CancellationToken::new(),
            cards: HashMap::new(),
            labels: Vec::new(),
        }
    }

    /// Token that aborts in-flight storage calls of this runner.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn service(&self) -> &GiftCardService<S> {
        &self.service
    }

    /// Run the batch with the given operation stream
    pub async fn run(&mut self, mut stream: impl Stream<Item = Operation> + Unpin) {
        while let Some(op) = stream.next().await {
            // failures are logged by `apply` and must not stop the batch
            let _ = self.apply(op).await;
        }
    }

    /// Apply a single operation
    pub async fn apply(&mut self, op: Operation) -> Result<(), BatchError> {
        match op {
            Operation::Issue {
                card,
                amount,
                expires,
            } => {
                let result = self.apply_issue(&card, amount, expires).await;
                Self::log_result("issue", &card, Some(amount), &result);
                result
            }
            Operation::Use { card, amount } => {
                let result = self.apply_use(&card, amount).await;
                Self::log_result("use", &card, Some(amount), &result);
                result
            }
            Operation::Deactivate { card } => {
                let result = self.apply_deactivate(&card).await;
                Self::log_result("deactivate", &card, None, &result);
                result
            }
        }
    }

    /// Current state of every issued card, in issue order.
    pub async fn cards(&self) -> Vec<(String, GiftCardSnapshot)> {
        let mut cards = Vec::with_capacity(self.labels.len());
        for label in &self.labels {
            let Some(issued) = self.cards.get(label) else {
                continue;
            };
            match self.service.get_by_code(&self.cancel, &issued.code).await {
                Ok(snapshot) => cards.push((label.clone(), snapshot)),
                Err(e) => warn!(card = %label, error = %e, "could not read issued card"),
            }
        }
        cards
    }
}

/// Private API
impl<S: GiftCardStore + CampaignStore> BatchRunner<S> {
    fn log_result(op: &str, card: &str, amount: Option<Amount>, result: &Result<(), BatchError>) {
        match (result, amount) {
            (Ok(()), Some(amt)) => info!(card, amount = %amt, "{op} applied"),
            (Ok(()), None) => info!(card, "{op} applied"),
            (Err(e), Some(amt)) => info!(card, amount = %amt, reason = %e, "{op} skipped"),
            (Err(e), None) => info!(card, reason = %e, "{op} skipped"),
        }
    }

    fn issued(&self, card: &str) -> Result<&IssuedCard, BatchError> {
        self.cards
            .get(card)
            .ok_or_else(|| BatchError::UnknownCard(card.to_string()))
    }

    async fn apply_issue(
        &mut self,
        card: &str,
        amount: Amount,
        expires: chrono::NaiveDate,
    ) -> Result<(), BatchError> {
        let Entry::Vacant(slot) = self.cards.entry(card.to_string()) else {
            return Err(BatchError::DuplicateCard(card.to_string()));
        };

        let snapshot = self
            .service
            .create(&self.cancel, NewGiftCard::new("virtual", amount, expires))
            .await?;

        slot.insert(IssuedCard {
            code: snapshot.code,
            number: snapshot.number,
        });
        self.labels.push(card.to_string());
        Ok(())
    }

    async fn apply_use(&self, card: &str, amount: Amount) -> Result<(), BatchError> {
        let issued = self.issued(card)?;
        let outcome = self
            .service
            .use_amount(&self.cancel, &issued.number, amount)
            .await?;

        if outcome.reason.is_rejection() {
            return Err(BatchError::Rejected(outcome.reason));
        }
        Ok(())
    }

    async fn apply_deactivate(&self, card: &str) -> Result<(), BatchError> {
        let issued = self.issued(card)?;
        self.service
            .update(
                &self.cancel,
                &issued.code,
                GiftCardUpdate {
                    status: Some(GiftCardStatus::Inactive),
                    ..Default::default()
                },
            )
            .await?;
        Ok(())
    }
}
