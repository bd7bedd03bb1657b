//! Translation of wallet payment confirmations into ticket purchases.

use tracing::debug;

use super::stake::TicketRequest;
use crate::domain::{MemoKind, PaymentMemo};
use crate::port::PaidInvoice;

/// The ticket purchase a paid invoice stands for, or `None` if the payment
/// was not issued for a ticket.
///
/// The ticket is owned by the wallet that received the stake, and its id is
/// the one carried in the memo.
#[must_use]
pub fn ticket_request(invoice: &PaidInvoice) -> Option<TicketRequest> {
    if !invoice.is_funding() {
        return None;
    }
    let (Some(choice), Some(reward_target)) = (invoice.choice(), invoice.reward_target()) else {
        debug!(payment_hash = %invoice.payment_hash, "funding payment without ticket metadata");
        return None;
    };
    let memo = invoice
        .memo
        .as_deref()
        .and_then(|m| m.parse::<PaymentMemo>().ok())
        .filter(|m| m.kind == MemoKind::Funding)?;

    Some(TicketRequest {
        id: memo.ticket,
        competition: memo.competition,
        account: invoice.wallet.clone(),
        amount: invoice.amount.floor_sats(),
        choice,
        reward_target: reward_target.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AccountId, CompetitionId, Msats, Sats, TicketId};
    use serde_json::json;

    fn invoice(memo: &str, extra: serde_json::Value) -> PaidInvoice {
        PaidInvoice {
            payment_hash: "ph".into(),
            wallet: AccountId::new("owner"),
            amount: Msats::new(100_999),
            memo: Some(memo.into()),
            extra,
        }
    }

    #[test]
    fn funding_invoice_becomes_request() {
        let paid = invoice(
            "BookieTicketId:c1.t1",
            json!({ "tag": "bookie", "choice": 1, "reward_target": "alice@example.com" }),
        );

        let request = ticket_request(&paid).unwrap();

        assert_eq!(request.id, TicketId::new("t1"));
        assert_eq!(request.competition, CompetitionId::new("c1"));
        assert_eq!(request.account, AccountId::new("owner"));
        assert_eq!(request.amount, Sats::new(100));
        assert_eq!(request.choice, 1);
        assert_eq!(request.reward_target, "alice@example.com");
    }

    #[test]
    fn unrelated_payments_are_ignored() {
        let extra = json!({ "tag": "bookie", "choice": 0, "reward_target": "a@b.c" });
        assert!(ticket_request(&invoice("coffee", extra.clone())).is_none());
        assert!(ticket_request(&invoice("BookieReward:c1.t1", extra)).is_none());
        assert!(ticket_request(&invoice(
            "BookieTicketId:c1.t1",
            json!({ "tag": "tipjar", "choice": 0, "reward_target": "a@b.c" })
        ))
        .is_none());
        assert!(ticket_request(&invoice(
            "BookieTicketId:c1.t1",
            json!({ "tag": "bookie", "choice": "0", "reward_target": "a@b.c" })
        ))
        .is_none());
    }
}
