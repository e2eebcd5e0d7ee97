//! Redemption state machine.
//!
//! Decides, for a single use request against a card snapshot, the resulting
//! balance and status and whether they need to be written back. Nothing in
//! here touches storage; see [`GiftCardService::use_amount`] for persistence.
//!
//! Transitions:
//! - amount zero or negative: rejected, nothing changes
//! - any status other than `active`: rejected, nothing changes
//! - `active` past its expiration date: becomes `expired` (persisted), use rejected
//! - `active`, amount above balance: rejected, nothing changes
//! - `active`, enough balance: deducted (persisted), `used` once the balance hits zero
//!
//! [`GiftCardService::use_amount`]: crate::GiftCardService::use_amount

use chrono::{DateTime, Utc};

use crate::Amount;
use crate::model::{GiftCardSnapshot, GiftCardStatus};

mod outcome;
pub use outcome::{Evaluation, RedemptionOutcome, RedemptionReason};

/// True once `now` is on a later UTC calendar day than the expiration date.
pub fn is_expired(card: &GiftCardSnapshot, now: DateTime<Utc>) -> bool {
    now.date_naive() > card.expiration_date
}

/// Evaluate a request to use `requested` from `card` at time `now`.
pub fn evaluate(card: &GiftCardSnapshot, requested: Amount, now: DateTime<Utc>) -> Evaluation {
    use RedemptionReason::*;

    if !requested.is_positive() {
        return Evaluation {
            outcome: RedemptionOutcome::unchanged(card.balance, card.status, InvalidAmount),
            should_persist: false,
        };
    }

    if card.status != GiftCardStatus::Active {
        return Evaluation {
            outcome: RedemptionOutcome::unchanged(card.balance, card.status, NotActive),
            should_persist: false,
        };
    }

    if is_expired(card, now) {
        // Discovered lazily: the card is stored as expired even though the use fails.
        return Evaluation {
            outcome: RedemptionOutcome::unchanged(card.balance, GiftCardStatus::Expired, Expired),
            should_persist: true,
        };
    }

    let Some(new_balance) = card.balance.checked_sub(requested) else {
        return Evaluation {
            outcome: RedemptionOutcome::unchanged(card.balance, card.status, InsufficientBalance),
            should_persist: false,
        };
    };

    let new_status = if new_balance.is_zero() {
        GiftCardStatus::Used
    } else {
        GiftCardStatus::Active
    };

    Evaluation {
        outcome: RedemptionOutcome {
            new_balance,
            new_status,
            used: true,
            reason: Success,
        },
        should_persist: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewGiftCard;
    use chrono::{Duration, NaiveDate, TimeZone};

    // test utils

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
    }

    fn card(balance: i64, status: GiftCardStatus, expires: NaiveDate) -> GiftCardSnapshot {
        let mut card = NewGiftCard::new("virtual", Amount::from_scaled(balance), expires)
            .into_snapshot("GIFT-test".to_string(), "GC12345678901234".to_string());
        card.status = status;
        card
    }

    fn tomorrow() -> NaiveDate {
        (now() + Duration::days(1)).date_naive()
    }

    fn yesterday() -> NaiveDate {
        (now() - Duration::days(1)).date_naive()
    }

    fn active(balance: i64) -> GiftCardSnapshot {
        card(balance, GiftCardStatus::Active, tomorrow())
    }

    // Successful use

    #[test]
    fn partial_use_keeps_card_active() {
        let eval = evaluate(&active(100), Amount::from_scaled(50), now());

        assert!(eval.should_persist);
        assert_eq!(
            eval.outcome,
            RedemptionOutcome {
                new_balance: Amount::from_scaled(50),
                new_status: GiftCardStatus::Active,
                used: true,
                reason: RedemptionReason::Success,
            }
        );
    }

    #[test]
    fn exact_use_marks_card_used() {
        let eval = evaluate(&active(100), Amount::from_scaled(100), now());

        assert!(eval.should_persist);
        assert_eq!(eval.outcome.new_balance, Amount::ZERO);
        assert_eq!(eval.outcome.new_status, GiftCardStatus::Used);
        assert!(eval.outcome.used);
    }

    #[test]
    fn use_on_expiration_day_succeeds() {
        let expires_today = card(100, GiftCardStatus::Active, now().date_naive());
        let eval = evaluate(&expires_today, Amount::from_scaled(10), now());

        assert_eq!(eval.outcome.reason, RedemptionReason::Success);
    }

    // Rejections

    #[test]
    fn insufficient_balance_is_a_no_op() {
        let eval = evaluate(&active(100), Amount::from_scaled(150), now());

        assert!(!eval.should_persist);
        assert_eq!(
            eval.outcome,
            RedemptionOutcome {
                new_balance: Amount::from_scaled(100),
                new_status: GiftCardStatus::Active,
                used: false,
                reason: RedemptionReason::InsufficientBalance,
            }
        );
    }

    #[test]
    fn non_positive_amount_never_changes_the_card() {
        for requested in [0, -1, -500] {
            let eval = evaluate(&active(100), Amount::from_scaled(requested), now());

            assert!(!eval.should_persist);
            assert_eq!(
                eval.outcome,
                RedemptionOutcome {
                    new_balance: Amount::from_scaled(100),
                    new_status: GiftCardStatus::Active,
                    used: false,
                    reason: RedemptionReason::InvalidAmount,
                }
            );
        }
    }

    #[test]
    fn negative_amount_does_not_trigger_expiry_write() {
        let stale = card(100, GiftCardStatus::Active, yesterday());
        let eval = evaluate(&stale, Amount::from_scaled(-500), now());

        assert!(!eval.should_persist);
        assert_eq!(eval.outcome.new_status, GiftCardStatus::Active);
        assert_eq!(eval.outcome.reason, RedemptionReason::InvalidAmount);
    }

    #[test]
    fn expired_card_is_marked_expired_and_persisted() {
        let stale = card(100, GiftCardStatus::Active, yesterday());

        for requested in [1, 100, 1_000] {
            let eval = evaluate(&stale, Amount::from_scaled(requested), now());
            assert!(eval.should_persist);
            assert_eq!(
                eval.outcome,
                RedemptionOutcome {
                    new_balance: Amount::from_scaled(100),
                    new_status: GiftCardStatus::Expired,
                    used: false,
                    reason: RedemptionReason::Expired,
                }
            );
        }
    }

    #[test]
    fn expiry_is_checked_before_balance() {
        let stale = card(10, GiftCardStatus::Active, yesterday());
        let eval = evaluate(&stale, Amount::from_scaled(500), now());

        assert_eq!(eval.outcome.reason, RedemptionReason::Expired);
    }

    #[test]
    fn inactive_card_is_a_no_op() {
        let eval = evaluate(
            &card(100, GiftCardStatus::Inactive, tomorrow()),
            Amount::from_scaled(10),
            now(),
        );

        assert!(!eval.should_persist);
        assert_eq!(eval.outcome.reason, RedemptionReason::NotActive);
        assert_eq!(eval.outcome.new_status, GiftCardStatus::Inactive);
        assert_eq!(eval.outcome.new_balance, Amount::from_scaled(100));
    }

    #[test]
    fn already_expired_card_is_not_rewritten() {
        let eval = evaluate(
            &card(100, GiftCardStatus::Expired, yesterday()),
            Amount::from_scaled(10),
            now(),
        );

        assert!(!eval.should_persist);
        assert_eq!(eval.outcome.reason, RedemptionReason::NotActive);
    }

    #[test]
    fn used_card_is_never_deducted_twice() {
        let spent = card(0, GiftCardStatus::Used, tomorrow());

        for requested in [1, 50, 100] {
            let eval = evaluate(&spent, Amount::from_scaled(requested), now());
            assert!(!eval.should_persist);
            assert!(!eval.outcome.used);
            assert_eq!(eval.outcome.reason, RedemptionReason::NotActive);
            assert_eq!(eval.outcome.new_balance, Amount::ZERO);
        }
    }

    #[test]
    fn chained_uses_drain_the_card() {
        let mut snapshot = active(100);
        for (requested, expected) in [(30, 70), (70, 0)] {
            let eval = evaluate(&snapshot, Amount::from_scaled(requested), now());
            assert!(eval.outcome.used);
            assert_eq!(eval.outcome.new_balance, Amount::from_scaled(expected));
            snapshot.balance = eval.outcome.new_balance;
            snapshot.status = eval.outcome.new_status;
        }

        assert_eq!(snapshot.status, GiftCardStatus::Used);
        let eval = evaluate(&snapshot, Amount::from_scaled(1), now());
        assert_eq!(eval.outcome.reason, RedemptionReason::NotActive);
    }

    #[test]
    fn is_expired_uses_calendar_days() {
        let expires = now().date_naive();
        let card = card(100, GiftCardStatus::Active, expires);
        let end_of_day = Utc.with_ymd_and_hms(2025, 3, 15, 23, 59, 59).unwrap();
        let next_day = Utc.with_ymd_and_hms(2025, 3, 16, 0, 0, 0).unwrap();

        assert!(!is_expired(&card, end_of_day));
        assert!(is_expired(&card, next_day));
    }
}
