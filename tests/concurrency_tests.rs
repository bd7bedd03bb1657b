mod support;

use std::sync::Arc;

use bookie::application::ProcessOutcome;
use bookie::domain::{CompetitionState, Sats, TicketId, TicketState};
use bookie::error::LedgerError;
use bookie::testkit::config;
use bookie::testkit::domain::ticket_request;
use bookie::testkit::gateway::ScriptedGateway;
use chrono::{Duration, Utc};
use support::ledger::{buy, open, staked, ticket};
use support::temp_db::TempDb;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fundings_are_all_booked() {
    let db = TempDb::create("concurrent-fund");
    let bookie = Arc::new(db.bookie());
    let c = open(&bookie).await;

    let mut tasks = Vec::new();
    for i in 0..24u64 {
        let bookie = bookie.clone();
        let c = c.clone();
        tasks.push(tokio::spawn(async move {
            let request = ticket_request(&format!("t{i}"), c.as_str(), 10 + i, (i % 2) as i64);
            bookie.fund_ticket(&request).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let competition = bookie.competition(&c).await.unwrap().unwrap();
    let tickets = bookie.competition_tickets(&c).await.unwrap();
    let expected: u64 = (0..24u64).map(|i| 10 + i).sum();
    assert_eq!(competition.total_pool(), Sats::new(expected));
    assert_eq!(competition.total_pool(), staked(&tickets, &[TicketState::Funded]));
    assert_eq!(competition.sold, 24);
    assert_eq!(competition.amount_tickets, 76);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn only_one_completion_wins() {
    let db = TempDb::create("concurrent-complete");
    let bookie = Arc::new(db.bookie());
    let c = open(&bookie).await;
    buy(&bookie, &c, "home", 100, 0).await;
    buy(&bookie, &c, "away", 100, 1).await;

    let mut tasks = Vec::new();
    for choice in [0i64, 1, 0, 1, -1, 0, 1, -1] {
        let bookie = bookie.clone();
        let c = c.clone();
        tasks.push(tokio::spawn(async move { bookie.complete(&c, choice).await }));
    }
    let mut won = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => won += 1,
            Err(e) => assert_eq!(e.as_ledger(), Some(&LedgerError::AlreadyCompleted(c.clone()))),
        }
    }
    assert_eq!(won, 1);

    let tickets = bookie.competition_tickets(&c).await.unwrap();
    assert!(tickets.iter().all(|t| t.state != TicketState::Funded));
    let payable = tickets.iter().filter(|t| t.state != TicketState::Lost).count();
    assert_eq!(bookie.pending_payouts().await.unwrap(), payable);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn funding_racing_completion_is_booked_or_refunded() {
    let db = TempDb::create("fund-vs-complete");
    let bookie = Arc::new(db.bookie());
    let c = open(&bookie).await;
    buy(&bookie, &c, "seed-home", 100, 0).await;
    buy(&bookie, &c, "seed-away", 100, 1).await;

    let mut tasks = Vec::new();
    for i in 0..20u64 {
        let bookie = bookie.clone();
        let c = c.clone();
        tasks.push(tokio::spawn(async move {
            let request = ticket_request(&format!("late{i}"), c.as_str(), 50, (i % 2) as i64);
            bookie.fund_ticket(&request).await.unwrap();
        }));
    }
    let completer = {
        let bookie = bookie.clone();
        let c = c.clone();
        tokio::spawn(async move { bookie.complete(&c, 0).await.unwrap() })
    };
    for task in tasks {
        task.await.unwrap();
    }
    completer.await.unwrap();

    let competition = bookie.competition(&c).await.unwrap().unwrap();
    let tickets = bookie.competition_tickets(&c).await.unwrap();
    assert_eq!(tickets.len(), 22);
    for t in &tickets {
        assert!(
            matches!(
                t.state,
                TicketState::WonUnsettled | TicketState::Lost | TicketState::CancelledUnsettled
            ),
            "ticket {} left in {}",
            t.id,
            t.state
        );
    }
    assert_eq!(
        competition.total_pool(),
        staked(&tickets, &[TicketState::WonUnsettled, TicketState::Lost])
    );
    assert_eq!(
        competition.choices[0].total,
        tickets
            .iter()
            .filter(|t| t.state == TicketState::WonUnsettled)
            .map(|t| t.amount)
            .sum::<Sats>()
    );
    assert_eq!(competition.state, CompetitionState::Settling);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sweep_racing_fundings_keeps_capacity_consistent() {
    let db = TempDb::create("sweep-vs-fund");
    let bookie = Arc::new(db.bookie());
    let c = open(&bookie).await;
    for i in 0..10u64 {
        bookie
            .reserve_ticket(&ticket_request(&format!("r{i}"), c.as_str(), 20, 0))
            .await
            .unwrap();
    }
    assert_eq!(bookie.competition(&c).await.unwrap().unwrap().amount_tickets, 90);

    let sweeper = bookie.sweeper(config::sweeper());
    let sweep = tokio::spawn(async move { sweeper.sweep(Utc::now() + Duration::hours(1)).await });
    let mut tasks = Vec::new();
    for i in 0..5u64 {
        let bookie = bookie.clone();
        let c = c.clone();
        tasks.push(tokio::spawn(async move {
            let request = ticket_request(&format!("r{i}"), c.as_str(), 20, 0);
            bookie.fund_ticket(&request).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    sweep.await.unwrap().unwrap();

    let competition = bookie.competition(&c).await.unwrap().unwrap();
    let tickets = bookie.competition_tickets(&c).await.unwrap();
    assert_eq!(competition.sold, 5);
    assert_eq!(competition.amount_tickets + competition.sold, 100);
    assert_eq!(competition.choices[0].total, Sats::new(100));
    assert_eq!(tickets.len(), 5);
    assert!(tickets.iter().all(|t| t.state == TicketState::Funded));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_pay_a_ticket_once() {
    let db = TempDb::create("concurrent-claim");
    let bookie = db.bookie();
    let c = open(&bookie).await;
    buy(&bookie, &c, "home", 100, 0).await;
    buy(&bookie, &c, "away", 300, 1).await;
    bookie.complete(&c, 0).await.unwrap();

    let gateway = Arc::new(ScriptedGateway::slow(std::time::Duration::from_millis(100)));
    let first = bookie.dispatcher(gateway.clone(), config::payout());
    let second = db.bookie().dispatcher(gateway.clone(), config::payout());
    let id = TicketId::new("home");

    let (a, b) = tokio::join!(
        tokio::spawn({
            let id = id.clone();
            async move { first.process(&id).await }
        }),
        tokio::spawn({
            let id = id.clone();
            async move { second.process(&id).await }
        }),
    );
    let mut outcomes = [a.unwrap().unwrap(), b.unwrap().unwrap()];
    outcomes.sort_by_key(|o| matches!(o, ProcessOutcome::Skipped));

    assert!(matches!(outcomes[0], ProcessOutcome::Paid { .. }));
    assert_eq!(outcomes[1], ProcessOutcome::Skipped);
    assert_eq!(gateway.calls().len(), 1);
    assert_eq!(ticket(&bookie, "home").await.state, TicketState::WonPaid);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn recovery_from_another_process_does_not_repay() {
    let db = TempDb::create("concurrent-recover");
    let bookie = db.bookie();
    let c = open(&bookie).await;
    buy(&bookie, &c, "home", 100, 0).await;
    buy(&bookie, &c, "away", 300, 1).await;
    bookie.complete(&c, 0).await.unwrap();

    let gateway = Arc::new(ScriptedGateway::slow(std::time::Duration::from_millis(200)));
    let dispatcher = bookie.dispatcher(gateway.clone(), config::payout());
    let paying = tokio::spawn(async move { dispatcher.drain().await });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let operator = db.bookie();
    assert_eq!(operator.recover_stuck_payouts(&config::payout()).await.unwrap(), 0);
    paying.await.unwrap().unwrap();
    let again = bookie.dispatcher(gateway.clone(), config::payout());
    again.drain().await.unwrap();

    assert_eq!(gateway.calls().len(), 1);
    assert_eq!(ticket(&bookie, "home").await.state, TicketState::WonPaid);
    assert_eq!(bookie.pending_payouts().await.unwrap(), 0);
}
