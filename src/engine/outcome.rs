use std::fmt;

use crate::Amount;
use crate::model::GiftCardStatus;

/// Why a redemption attempt ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionReason {
    Success,
    /// Requested amount was zero or negative.
    InvalidAmount,
    NotActive,
    Expired,
    InsufficientBalance,
}

impl RedemptionReason {
    /// Business-rule rejections, as opposed to a completed deduction.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, RedemptionReason::Success)
    }

    /// Human readable message for the card holder.
    pub fn message(&self) -> &'static str {
        match self {
            RedemptionReason::Success => "gift card amount used successfully",
            RedemptionReason::InvalidAmount => "use amount must be positive",
            RedemptionReason::NotActive => "gift card is not active",
            RedemptionReason::Expired => "gift card has expired",
            RedemptionReason::InsufficientBalance => "insufficient gift card balance",
        }
    }
}

impl fmt::Display for RedemptionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of evaluating one redemption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedemptionOutcome {
    pub new_balance: Amount,
    pub new_status: GiftCardStatus,
    /// True only when the amount was actually deducted.
    pub used: bool,
    pub reason: RedemptionReason,
}

impl RedemptionOutcome {
    /// Rejection leaving balance and status as they were.
    pub fn unchanged(balance: Amount, status: GiftCardStatus, reason: RedemptionReason) -> Self {
        Self {
            new_balance: balance,
            new_status: status,
            used: false,
            reason,
        }
    }
}

/// An outcome plus whether the new balance/status must be written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub outcome: RedemptionOutcome,
    pub should_persist: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_success_is_not_a_rejection() {
        assert!(!RedemptionReason::Success.is_rejection());
        assert!(RedemptionReason::InvalidAmount.is_rejection());
        assert!(RedemptionReason::NotActive.is_rejection());
        assert!(RedemptionReason::Expired.is_rejection());
        assert!(RedemptionReason::InsufficientBalance.is_rejection());
    }

    #[test]
    fn unchanged_outcome_is_not_used() {
        let outcome = RedemptionOutcome::unchanged(
            Amount::from_scaled(500),
            GiftCardStatus::Inactive,
            RedemptionReason::NotActive,
        );
        assert!(!outcome.used);
        assert_eq!(outcome.new_balance, Amount::from_scaled(500));
        assert_eq!(outcome.new_status, GiftCardStatus::Inactive);
    }
}
