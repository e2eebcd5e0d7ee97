//! Storage contracts for gift cards and campaigns, and an in-memory
//! implementation of both.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::Amount;
use crate::model::{
    Campaign, CampaignDetails, CampaignId, GiftCardSnapshot, GiftCardStatus, GiftCardUpdate,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record matched the key (zero rows affected on writes).
    #[error("record {key} not found")]
    NotFound { key: String },

    #[error("gift card with {field} {value} already exists")]
    Duplicate { field: &'static str, value: String },

    /// Opaque backend failure, passed through unchanged.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(key: impl Into<String>) -> Self {
        StoreError::NotFound { key: key.into() }
    }
}

/// Persistence operations the gift card core relies on.
///
/// Implementations must make each call atomic with respect to their own
/// storage engine.
#[async_trait]
pub trait GiftCardStore: Send + Sync {
    async fn number_exists(&self, number: &str) -> Result<bool, StoreError>;

    /// Fails with `Duplicate` if the code or number is already taken.
    async fn create(&self, card: GiftCardSnapshot) -> Result<(), StoreError>;

    async fn get_by_code(&self, code: &str) -> Result<GiftCardSnapshot, StoreError>;

    async fn get_by_number(&self, number: &str) -> Result<GiftCardSnapshot, StoreError>;

    async fn list(&self) -> Result<Vec<GiftCardSnapshot>, StoreError>;

    /// Cards whose kind or status contains one of the words of `query` as a
    /// whole word, ignoring case.
    async fn search(&self, query: &str) -> Result<Vec<GiftCardSnapshot>, StoreError>;

    async fn update(&self, code: &str, update: GiftCardUpdate) -> Result<(), StoreError>;

    async fn write_balance_and_status(
        &self,
        code: &str,
        balance: Amount,
        status: GiftCardStatus,
    ) -> Result<(), StoreError>;

    async fn delete(&self, code: &str) -> Result<(), StoreError>;
}

/// Persistence operations for campaigns.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Stores a new campaign under the next free id.
    async fn create_campaign(
        &self,
        reference: String,
        details: CampaignDetails,
    ) -> Result<Campaign, StoreError>;

    async fn get_campaign(&self, id: CampaignId) -> Result<Campaign, StoreError>;

    /// All campaigns, by ascending id.
    async fn list_campaigns(&self) -> Result<Vec<Campaign>, StoreError>;

    /// Campaigns whose name or description contains one of the words of
    /// `query` as a whole word, ignoring case.
    async fn search_campaigns(&self, query: &str) -> Result<Vec<Campaign>, StoreError>;

    /// Replaces every editable field.
    async fn update_campaign(
        &self,
        id: CampaignId,
        details: CampaignDetails,
    ) -> Result<(), StoreError>;

    async fn delete_campaign(&self, id: CampaignId) -> Result<(), StoreError>;
}

fn campaign_key(id: CampaignId) -> String {
    format!("campaign {id}")
}

/// Lowercased alphanumeric words of `text`.
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
}

fn contains_any_word(text: &str, query: &[String]) -> bool {
    words(text).any(|word| query.contains(&word))
}

#[derive(Debug, Default)]
struct Cards {
    by_code: HashMap<String, GiftCardSnapshot>,
    /// number -> code
    numbers: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct Campaigns {
    by_id: BTreeMap<CampaignId, Campaign>,
    last_id: CampaignId,
}

/// Gift card and campaign store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    cards: RwLock<Cards>,
    campaigns: RwLock<Campaigns>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.cards.read().await.by_code.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn sorted(mut cards: Vec<GiftCardSnapshot>) -> Vec<GiftCardSnapshot> {
    cards.sort_by(|a, b| a.number.cmp(&b.number));
    cards
}

#[async_trait]
impl GiftCardStore for MemoryStore {
    async fn number_exists(&self, number: &str) -> Result<bool, StoreError> {
        Ok(self.cards.read().await.numbers.contains_key(number))
    }

    async fn create(&self, card: GiftCardSnapshot) -> Result<(), StoreError> {
        let mut cards = self.cards.write().await;
        if cards.by_code.contains_key(&card.code) {
            return Err(StoreError::Duplicate {
                field: "code",
                value: card.code,
            });
        }
        if cards.numbers.contains_key(&card.number) {
            return Err(StoreError::Duplicate {
                field: "number",
                value: card.number,
            });
        }
        debug!(code = %card.code, number = %card.number, "gift card stored");
        cards.numbers.insert(card.number.clone(), card.code.clone());
        cards.by_code.insert(card.code.clone(), card);
        Ok(())
    }

    async fn get_by_code(&self, code: &str) -> Result<GiftCardSnapshot, StoreError> {
        self.cards
            .read()
            .await
            .by_code
            .get(code)
            .cloned()
            .ok_or_else(|| StoreError::not_found(code))
    }

    async fn get_by_number(&self, number: &str) -> Result<GiftCardSnapshot, StoreError> {
        let cards = self.cards.read().await;
        cards
            .numbers
            .get(number)
            .and_then(|code| cards.by_code.get(code))
            .cloned()
            .ok_or_else(|| StoreError::not_found(number))
    }

    async fn list(&self) -> Result<Vec<GiftCardSnapshot>, StoreError> {
        let cards = self.cards.read().await;
        Ok(sorted(cards.by_code.values().cloned().collect()))
    }

    async fn search(&self, query: &str) -> Result<Vec<GiftCardSnapshot>, StoreError> {
        let query: Vec<String> = words(query).collect();
        let cards = self.cards.read().await;
        Ok(sorted(
            cards
                .by_code
                .values()
                .filter(|card| {
                    contains_any_word(&card.kind, &query)
                        || contains_any_word(card.status.as_str(), &query)
                })
                .cloned()
                .collect(),
        ))
    }

    async fn update(&self, code: &str, update: GiftCardUpdate) -> Result<(), StoreError> {
        let mut cards = self.cards.write().await;
        let card = cards
            .by_code
            .get_mut(code)
            .ok_or_else(|| StoreError::not_found(code))?;
        update.apply_to(card);
        Ok(())
    }

    async fn write_balance_and_status(
        &self,
        code: &str,
        balance: Amount,
        status: GiftCardStatus,
    ) -> Result<(), StoreError> {
        let mut cards = self.cards.write().await;
        let card = cards
            .by_code
            .get_mut(code)
            .ok_or_else(|| StoreError::not_found(code))?;
        card.balance = balance;
        card.status = status;
        Ok(())
    }

    async fn delete(&self, code: &str) -> Result<(), StoreError> {
        let mut cards = self.cards.write().await;
        let card = cards
            .by_code
            .remove(code)
            .ok_or_else(|| StoreError::not_found(code))?;
        cards.numbers.remove(&card.number);
        Ok(())
    }
}

#[async_trait]
impl CampaignStore for MemoryStore {
    async fn create_campaign(
        &self,
        reference: String,
        details: CampaignDetails,
    ) -> Result<Campaign, StoreError> {
        let mut campaigns = self.campaigns.write().await;
        let id = campaigns
            .last_id
            .checked_add(1)
            .ok_or_else(|| StoreError::Backend("campaign ids exhausted".to_string()))?;
        let campaign = Campaign {
            id,
            reference,
            details,
        };
        debug!(id, reference = %campaign.reference, "campaign stored");
        campaigns.last_id = id;
        campaigns.by_id.insert(id, campaign.clone());
        Ok(campaign)
    }

    async fn get_campaign(&self, id: CampaignId) -> Result<Campaign, StoreError> {
        self.campaigns
            .read()
            .await
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(campaign_key(id)))
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>, StoreError> {
        Ok(self.campaigns.read().await.by_id.values().cloned().collect())
    }

    async fn search_campaigns(&self, query: &str) -> Result<Vec<Campaign>, StoreError> {
        let query: Vec<String> = words(query).collect();
        let campaigns = self.campaigns.read().await;
        Ok(campaigns
            .by_id
            .values()
            .filter(|campaign| {
                contains_any_word(&campaign.details.name, &query)
                    || contains_any_word(&campaign.details.description, &query)
            })
            .cloned()
            .collect())
    }

    async fn update_campaign(
        &self,
        id: CampaignId,
        details: CampaignDetails,
    ) -> Result<(), StoreError> {
        let mut campaigns = self.campaigns.write().await;
        let campaign = campaigns
            .by_id
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(campaign_key(id)))?;
        campaign.details = details;
        Ok(())
    }

    async fn delete_campaign(&self, id: CampaignId) -> Result<(), StoreError> {
        self.campaigns
            .write()
            .await
            .by_id
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(campaign_key(id)))
    }
}
