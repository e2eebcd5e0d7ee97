//! Core domain types for gift cards.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::Amount;

/// Campaign identifier.
pub type CampaignId = u32;

/// Lifecycle status of a gift card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GiftCardStatus {
    /// Card can be redeemed.
    #[default]
    Active,
    /// Balance was fully spent; always carries a zero balance.
    Used,
    /// Discovered past its expiration date.
    Expired,
    /// Disabled administratively.
    Inactive,
}

impl GiftCardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GiftCardStatus::Active => "active",
            GiftCardStatus::Used => "used",
            GiftCardStatus::Expired => "expired",
            GiftCardStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for GiftCardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown gift card status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for GiftCardStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(GiftCardStatus::Active),
            "used" => Ok(GiftCardStatus::Used),
            "expired" => Ok(GiftCardStatus::Expired),
            "inactive" => Ok(GiftCardStatus::Inactive),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Point-in-time copy of a stored gift card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftCardSnapshot {
    /// Internal storage key, never shown to the card holder.
    pub code: String,
    /// Public checksummed number printed on the card.
    pub number: String,
    pub kind: String,
    pub balance: Amount,
    pub status: GiftCardStatus,
    /// Last calendar day (UTC) on which the card can be redeemed.
    pub expiration_date: NaiveDate,
    pub is_promotional: bool,
    pub campaign_id: Option<CampaignId>,
}

/// Request to issue a new gift card.
#[derive(Debug, Clone)]
pub struct NewGiftCard {
    pub kind: String,
    pub balance: Amount,
    pub expiration_date: NaiveDate,
    pub status: GiftCardStatus,
    pub is_promotional: bool,
    pub campaign_id: Option<CampaignId>,
}

impl NewGiftCard {
    /// An active, non-promotional card with the given balance and expiry.
    pub fn new(kind: impl Into<String>, balance: Amount, expiration_date: NaiveDate) -> Self {
        Self {
            kind: kind.into(),
            balance,
            expiration_date,
            status: GiftCardStatus::Active,
            is_promotional: false,
            campaign_id: None,
        }
    }

    pub fn into_snapshot(self, code: String, number: String) -> GiftCardSnapshot {
        GiftCardSnapshot {
            code,
            number,
            kind: self.kind,
            balance: self.balance,
            status: self.status,
            expiration_date: self.expiration_date,
            is_promotional: self.is_promotional,
            campaign_id: self.campaign_id,
        }
    }
}

/// Administrative update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct GiftCardUpdate {
    pub kind: Option<String>,
    pub balance: Option<Amount>,
    pub expiration_date: Option<NaiveDate>,
    pub status: Option<GiftCardStatus>,
    pub is_promotional: Option<bool>,
}

impl GiftCardUpdate {
    pub fn apply_to(self, card: &mut GiftCardSnapshot) {
        if let Some(kind) = self.kind {
            card.kind = kind;
        }
        if let Some(balance) = self.balance {
            card.balance = balance;
        }
        if let Some(expiration_date) = self.expiration_date {
            card.expiration_date = expiration_date;
        }
        if let Some(status) = self.status {
            card.status = status;
        }
        if let Some(is_promotional) = self.is_promotional {
            card.is_promotional = is_promotional;
        }
    }
}

/// Editable fields of a campaign, used both to create one and to replace them.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignDetails {
    pub name: String,
    pub description: String,
    /// First day of the campaign.
    pub start_date: NaiveDate,
    /// Last day of the campaign, strictly after `start_date`.
    pub end_date: NaiveDate,
    pub is_enabled: bool,
    /// Percent off, from 0 to 100.
    pub discount_percentage: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum InvalidCampaign {
    #[error("campaign name must be 3 to 255 characters, got {0}")]
    NameLength(usize),

    #[error("campaign description must be at most 1000 characters, got {0}")]
    DescriptionTooLong(usize),

    #[error("campaign must end after it starts ({start} .. {end})")]
    EndNotAfterStart { start: NaiveDate, end: NaiveDate },

    #[error("discount percentage must be between 0 and 100, got {0}")]
    DiscountOutOfRange(f64),
}

impl CampaignDetails {
    /// An enabled campaign without description or discount.
    pub fn new(name: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            start_date,
            end_date,
            is_enabled: true,
            discount_percentage: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), InvalidCampaign> {
        let name_len = self.name.chars().count();
        if !(3..=255).contains(&name_len) {
            return Err(InvalidCampaign::NameLength(name_len));
        }
        let description_len = self.description.chars().count();
        if description_len > 1000 {
            return Err(InvalidCampaign::DescriptionTooLong(description_len));
        }
        if self.end_date <= self.start_date {
            return Err(InvalidCampaign::EndNotAfterStart {
                start: self.start_date,
                end: self.end_date,
            });
        }
        // NaN fails the range check too.
        if !(0.0..=100.0).contains(&self.discount_percentage) {
            return Err(InvalidCampaign::DiscountOutOfRange(self.discount_percentage));
        }
        Ok(())
    }
}

/// A stored promotional campaign that gift cards can belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct Campaign {
    pub id: CampaignId,
    /// Public reference, `CAMP-<uuid>`.
    pub reference: String,
    pub details: CampaignDetails,
}

/// A batch operation, as read from the input file.
///
/// `card` is a caller-chosen label; the runner maps it to the allocated number.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Issue a new active card.
    Issue {
        card: String,
        amount: Amount,
        expires: NaiveDate,
    },
    /// Redeem an amount from a card.
    Use { card: String, amount: Amount },
    /// Disable a card.
    Deactivate { card: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            GiftCardStatus::Active,
            GiftCardStatus::Used,
            GiftCardStatus::Expired,
            GiftCardStatus::Inactive,
        ] {
            assert_eq!(status.to_string().parse::<GiftCardStatus>(), Ok(status));
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert_eq!(
            "ACTIVE".parse::<GiftCardStatus>(),
            Err(UnknownStatus("ACTIVE".to_string()))
        );
    }

    #[test]
    fn status_default() {
        assert_eq!(GiftCardStatus::default(), GiftCardStatus::Active);
    }

    #[test]
    fn update_only_touches_given_fields() {
        let expires = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let mut card = NewGiftCard::new("virtual", Amount::from_scaled(1000), expires)
            .into_snapshot("GIFT-1".to_string(), "GC00000000000000".to_string());

        GiftCardUpdate {
            status: Some(GiftCardStatus::Inactive),
            ..Default::default()
        }
        .apply_to(&mut card);

        assert_eq!(card.status, GiftCardStatus::Inactive);
        assert_eq!(card.balance, Amount::from_scaled(1000));
        assert_eq!(card.kind, "virtual");
        assert_eq!(card.expiration_date, expires);
    }

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    #[test]
    fn campaign_details_validation() {
        let valid = CampaignDetails::new("Spring sale", date(3, 1), date(3, 31));
        assert_eq!(valid.validate(), Ok(()));

        let mut short = valid.clone();
        short.name = "ab".to_string();
        assert_eq!(short.validate(), Err(InvalidCampaign::NameLength(2)));

        let mut wordy = valid.clone();
        wordy.description = "x".repeat(1001);
        assert_eq!(
            wordy.validate(),
            Err(InvalidCampaign::DescriptionTooLong(1001))
        );

        let same_day = CampaignDetails::new("One day", date(3, 1), date(3, 1));
        assert!(matches!(
            same_day.validate(),
            Err(InvalidCampaign::EndNotAfterStart { .. })
        ));

        for discount in [-0.5, 100.01, f64::NAN] {
            let mut odd = valid.clone();
            odd.discount_percentage = discount;
            assert!(matches!(
                odd.validate(),
                Err(InvalidCampaign::DiscountOutOfRange(_))
            ));
        }

        let mut full = valid;
        full.discount_percentage = 100.0;
        assert_eq!(full.validate(), Ok(()));
    }
}
