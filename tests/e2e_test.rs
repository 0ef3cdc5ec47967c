mod helpers;

use chrono::{Duration, TimeZone, Utc};
use helpers::*;
use paisasplit_backend::error::AppError;
use paisasplit_backend::models::*;
use paisasplit_backend::services::RECENT_WINDOW_DAYS;
use rust_decimal::Decimal;
use std::collections::HashSet;
use uuid::Uuid;

// ============================================================================
// Settlement
// ============================================================================

/// Create a shared expense → settle → balances reflect who owes whom
#[tokio::test]
async fn test_settle_split_adjusts_balances() {
    let ctx = TestContext::new();
    ctx.create_balance("bob", "500", Currency::Inr).await;
    ctx.create_balance("carol", "500", Currency::Inr).await;

    let dinner = ctx
        .create_transaction("alice", "Dinner", "900", TransactionType::Split, &["bob", "carol"])
        .await;

    let report = ctx.state.settlements.settle(dinner.id).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.transaction.status, TransactionStatus::Settled);
    assert_eq!(report.applied.len(), 3);

    let alice = ctx.state.balances.list_by_owner(&"alice".into()).await.unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].amount, dec("600"));
    assert_eq!(alice[0].name, "Auto-generated");

    let bob = ctx.state.balances.total_for_owner(&"bob".into()).await.unwrap();
    assert_eq!(bob.total_balance, dec("200"));
    let carol = ctx.state.balances.total_for_owner(&"carol".into()).await.unwrap();
    assert_eq!(carol.total_balance, dec("200"));
}

#[tokio::test]
async fn test_settle_reports_debits_without_balance() {
    let ctx = TestContext::new();
    ctx.create_balance("bob", "100", Currency::Inr).await;

    let tx = ctx
        .create_transaction("alice", "Cab", "300", TransactionType::Split, &["bob", "dave"])
        .await;
    let report = ctx.state.settlements.settle(tx.id).await.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].delta.user_id, UserId::from("dave"));
    assert_eq!(report.failed[0].delta.amount, dec("-100"));

    // Status still moved; the ledger shows what was applied
    assert_eq!(
        ctx.state.transactions.get(tx.id).await.unwrap().status,
        TransactionStatus::Settled
    );
    assert!(ctx.state.balances.list_by_owner(&"dave".into()).await.unwrap().is_empty());
    assert_eq!(
        ctx.state.balances.total_for_owner(&"bob".into()).await.unwrap().total_balance,
        Decimal::ZERO
    );
}

#[tokio::test]
async fn test_settle_twice_is_invalid_and_applies_once() {
    let ctx = TestContext::new();
    let tx = ctx
        .create_transaction("alice", "Refundable deposit", "40", TransactionType::Refund, &["bob"])
        .await;
    ctx.create_balance("alice", "100", Currency::Inr).await;

    ctx.state.settlements.settle(tx.id).await.unwrap();
    let again = ctx.state.settlements.settle(tx.id).await;
    assert!(matches!(again, Err(AppError::InvalidTransition { .. })));

    let alice = ctx.state.balances.total_for_owner(&"alice".into()).await.unwrap();
    assert_eq!(alice.total_balance, dec("60"));
    let bob = ctx.state.balances.total_for_owner(&"bob".into()).await.unwrap();
    assert_eq!(bob.total_balance, dec("40"));
}

#[tokio::test]
async fn test_cancel_leaves_balances_alone() {
    let ctx = TestContext::new();
    ctx.create_balance("bob", "100", Currency::Inr).await;
    let tx = ctx
        .create_transaction("alice", "Dinner", "100", TransactionType::Payment, &["bob"])
        .await;

    let cancelled = ctx.state.settlements.cancel(tx.id).await.unwrap();
    assert_eq!(cancelled.status, TransactionStatus::Cancelled);
    assert!(ctx.state.balances.list_by_owner(&"alice".into()).await.unwrap().is_empty());

    let settle = ctx.state.settlements.settle(tx.id).await;
    assert!(matches!(
        settle,
        Err(AppError::InvalidTransition {
            from: TransactionStatus::Cancelled,
            to: TransactionStatus::Settled
        })
    ));
}

// ============================================================================
// Activity feed
// ============================================================================

#[tokio::test]
async fn test_activities_follow_transactions() {
    let ctx = TestContext::new();
    ctx.add_group("flat", "Flatmates", &["alice", "bob"]).await;

    let mut input = new_transaction("alice", "Groceries", "800", TransactionType::Split, &["bob"]);
    input.group_id = Some("flat".into());
    let tx = ctx.state.transactions.create(input).await.unwrap();

    let item = ctx.state.activities.get(tx.id).await.unwrap();
    assert_eq!(item.id, tx.id);
    assert_eq!(item.status, TransactionStatus::Pending);
    assert_eq!(item.group_name.as_deref(), Some("Flatmates"));

    ctx.state.transactions.set_status(tx.id, TransactionStatus::Settled).await.unwrap();
    let item = ctx.state.activities.get(tx.id).await.unwrap();
    assert_eq!(item.status, TransactionStatus::Settled);

    assert!(ctx.state.activities.get(Uuid::new_v4()).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_by_user_covers_creator_and_participant() {
    let ctx = TestContext::new();
    let created = ctx
        .create_transaction("alice", "Lunch", "200", TransactionType::Split, &["bob"])
        .await;
    ctx.advance(Duration::minutes(1));
    let joined = ctx
        .create_transaction("carol", "Movie", "600", TransactionType::Split, &["alice", "dave"])
        .await;
    ctx.create_transaction("erin", "Unrelated", "50", TransactionType::Payment, &["bob"])
        .await;

    let items = ctx
        .state
        .activities
        .by_user(&"alice".into(), None, Page::default())
        .await
        .unwrap();
    assert_eq!(items.iter().map(|a| a.id).collect::<Vec<_>>(), vec![joined.id, created.id]);

    // The list filter's user is the creator only
    let owned = ctx
        .state
        .activities
        .list(
            &ActivityFilter {
                user_id: Some("alice".into()),
                ..Default::default()
            },
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].id, created.id);
}

#[tokio::test]
async fn test_activity_filters_by_type_and_since() {
    let ctx = TestContext::new();
    let old = ctx
        .create_transaction("alice", "Old loan", "100", TransactionType::Loan, &["bob"])
        .await;
    ctx.advance(Duration::days(3));
    let cutoff = ctx.now();
    let recent = ctx
        .create_transaction("alice", "New loan", "100", TransactionType::Loan, &["bob"])
        .await;
    ctx.create_transaction("alice", "Dinner", "100", TransactionType::Split, &["bob"])
        .await;

    let loans = ctx
        .state
        .activities
        .list(
            &ActivityFilter {
                activity_type: Some(TransactionType::Loan),
                ..Default::default()
            },
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(loans.iter().map(|a| a.id).collect::<Vec<_>>(), vec![recent.id, old.id]);

    let since = ctx
        .state
        .activities
        .list(
            &ActivityFilter {
                activity_type: Some(TransactionType::Loan),
                since: Some(cutoff),
                ..Default::default()
            },
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(since.len(), 1);
    assert_eq!(since[0].id, recent.id);
}

#[tokio::test]
async fn test_by_group() {
    let ctx = TestContext::new();
    ctx.add_group("trip", "Goa Trip", &["alice", "bob"]).await;

    let mut input = new_transaction("bob", "Hotel", "4000", TransactionType::Split, &["alice"]);
    input.group_id = Some("trip".into());
    let hotel = ctx.state.transactions.create(input).await.unwrap();
    ctx.create_transaction("bob", "Personal", "40", TransactionType::Payment, &[]).await;

    let items = ctx
        .state
        .activities
        .by_group(&"trip".into(), None, Page::default())
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, hotel.id);
    assert_eq!(items[0].group_name.as_deref(), Some("Goa Trip"));
}

#[tokio::test]
async fn test_feed_is_union_of_own_and_group_activity() {
    let ctx = TestContext::new();
    ctx.add_group("flat", "Flatmates", &["alice", "bob", "carol"]).await;
    ctx.add_group("office", "Office", &["dave", "erin"]).await;

    // Own activity outside any group
    let own = ctx
        .create_transaction("alice", "Books", "300", TransactionType::Payment, &["frank"])
        .await;
    ctx.advance(Duration::minutes(1));

    // Group activity alice is not a participant of
    let mut input = new_transaction("bob", "Internet bill", "900", TransactionType::Split, &["carol"]);
    input.group_id = Some("flat".into());
    let group_only = ctx.state.transactions.create(input).await.unwrap();
    ctx.advance(Duration::minutes(1));

    // Group activity alice also participates in: must appear once
    let mut input = new_transaction("carol", "Rent", "30000", TransactionType::Split, &["alice", "bob"]);
    input.group_id = Some("flat".into());
    let both = ctx.state.transactions.create(input).await.unwrap();
    ctx.advance(Duration::minutes(1));

    // A group alice is not in
    let mut input = new_transaction("dave", "Snacks", "100", TransactionType::Split, &["erin"]);
    input.group_id = Some("office".into());
    ctx.state.transactions.create(input).await.unwrap();

    let feed = ctx
        .state
        .activities
        .feed(&"alice".into(), Page::default())
        .await
        .unwrap();

    let ids: Vec<Uuid> = feed.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![both.id, group_only.id, own.id]);
    let unique: HashSet<Uuid> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
}

#[tokio::test]
async fn test_recent_for_user_uses_seven_day_window() {
    let ctx = TestContext::new();
    ctx.create_transaction("alice", "Ancient", "10", TransactionType::Split, &[]).await;
    ctx.advance(Duration::days(RECENT_WINDOW_DAYS + 1));
    let fresh = ctx
        .create_transaction("alice", "Fresh", "10", TransactionType::Split, &[])
        .await;
    ctx.advance(Duration::days(1));

    let recent = ctx
        .state
        .activities
        .recent_for_user(&"alice".into(), 10)
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, fresh.id);
}

#[tokio::test]
async fn test_stats_for_user() {
    let ctx = TestContext::new();
    ctx.create_transaction("alice", "Before window", "999", TransactionType::Split, &[])
        .await;
    ctx.advance(Duration::days(2));
    let since = ctx.now();

    ctx.create_transaction("alice", "Dinner", "100", TransactionType::Split, &["bob"])
        .await;
    let mut usd = new_transaction("bob", "Tickets", "2", TransactionType::Payment, &["alice"]);
    usd.currency = Currency::Usd;
    let tickets = ctx.state.transactions.create(usd).await.unwrap();
    ctx.state.transactions.set_status(tickets.id, TransactionStatus::Settled).await.unwrap();

    let stats = ctx
        .state
        .activities
        .stats_for_user(&"alice".into(), since)
        .await
        .unwrap();

    assert_eq!(stats.since, since);
    assert_eq!(stats.total_activities, 2);
    assert_eq!(stats.count_by_type.get(&TransactionType::Split), Some(&1));
    assert_eq!(stats.count_by_type.get(&TransactionType::Payment), Some(&1));
    assert_eq!(stats.count_by_status.get(&TransactionStatus::Settled), Some(&1));
    assert_eq!(stats.total_amount, dec("266"));
    assert_eq!(stats.currency, Currency::Inr);
}

// ============================================================================
// Spending reports
// ============================================================================

#[tokio::test]
async fn test_generate_monthly_report() {
    let ctx = TestContext::starting_at(Utc.with_ymd_and_hms(2024, 4, 10, 9, 0, 0).unwrap());
    ctx.create_transaction("alice", "Lunch", "500", TransactionType::Split, &["bob"]).await;

    ctx.set_time(Utc.with_ymd_and_hms(2024, 5, 3, 9, 0, 0).unwrap());
    ctx.create_transaction("alice", "Team dinner", "600", TransactionType::Split, &["bob"]).await;
    ctx.create_transaction("alice", "Uber home", "200", TransactionType::Payment, &["bob"]).await;
    ctx.create_transaction("alice", "Electricity bill", "200", TransactionType::Split, &[]).await;
    ctx.create_transaction("alice", "Loan to bob", "5000", TransactionType::Loan, &["bob"]).await;
    ctx.create_transaction("alice", "Refund", "50", TransactionType::Refund, &["bob"]).await;
    let cancelled = ctx
        .create_transaction("alice", "Cancelled dinner", "700", TransactionType::Split, &["bob"])
        .await;
    ctx.state.transactions.set_status(cancelled.id, TransactionStatus::Cancelled).await.unwrap();
    ctx.create_transaction("bob", "Someone else", "100", TransactionType::Split, &["alice"]).await;

    // Last instant of May still counts, the first of June does not
    ctx.set_time(Utc.with_ymd_and_hms(2024, 5, 31, 23, 59, 59).unwrap());
    ctx.create_transaction("alice", "Late snack", "0.50", TransactionType::Split, &[]).await;
    ctx.set_time(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
    ctx.create_transaction("alice", "June lunch", "300", TransactionType::Split, &[]).await;

    let report = ctx.state.reports.generate(&"alice".into(), 2024, 5).await.unwrap();

    assert_eq!(report.total_spent, dec("1000.50"));
    assert_eq!(report.currency, Currency::Inr);
    let names: Vec<&str> = report.categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Food", "Bills", "Transport"]);
    assert_eq!(report.categories[0].amount, dec("600.50"));
    assert_eq!(report.categories[0].color, "#FF6B6B");
    assert_eq!(report.categories[1].percentage, dec("19.99"));

    assert_eq!(report.trends["transaction_count"], 4);
    assert_eq!(report.trends["top_category"], "Food");
    assert_eq!(report.trends["previous_month_total"], "500");
    assert_eq!(report.trends["change_percentage"], "100.10");

    let trends = report.trend_summary().unwrap();
    assert_eq!(trends.transaction_count, 4);
    assert_eq!(trends.previous_month_total, dec("500"));
    assert_eq!(trends.top_category.as_deref(), Some("Food"));
}

#[tokio::test]
async fn test_regenerating_report_keeps_one_record() {
    let ctx = TestContext::starting_at(Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap());
    ctx.create_transaction("alice", "Pizza", "400", TransactionType::Split, &["bob"]).await;

    let first = ctx.state.reports.generate(&"alice".into(), 2024, 3).await.unwrap();
    let second = ctx.state.reports.generate(&"alice".into(), 2024, 3).await.unwrap();
    assert_eq!(first, second);

    // New data and a later generation time replace the figures, not the id
    ctx.create_transaction("alice", "Coffee", "100", TransactionType::Split, &[]).await;
    ctx.advance(Duration::hours(1));
    let third = ctx.state.reports.generate(&"alice".into(), 2024, 3).await.unwrap();
    assert_eq!(third.id, first.id);
    assert_eq!(third.total_spent, dec("500"));
    assert!(!third.same_figures(&first));

    let stored = ctx.state.reports.list(&"alice".into(), None, 10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], third);
}

#[tokio::test]
async fn test_empty_month_report() {
    let ctx = TestContext::new();
    let report = ctx.state.reports.generate(&"nobody".into(), 2024, 2).await.unwrap();
    assert!(report.total_spent.is_zero());
    assert!(report.categories.is_empty());
    assert!(report.trends["top_category"].is_null());
    assert_eq!(report.trends["change_percentage"], "0");
    assert_eq!(report.trend_summary().unwrap().transaction_count, 0);
}

#[tokio::test]
async fn test_report_month_is_validated() {
    let ctx = TestContext::new();
    for month in [0, 13] {
        let result = ctx.state.reports.generate(&"alice".into(), 2024, month).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}

#[tokio::test]
async fn test_report_year_out_of_range() {
    let ctx = TestContext::new();
    for (year, month) in [(i32::MAX, 12), (i32::MAX, 6), (i32::MIN, 1), (i32::MIN, 7)] {
        let result = ctx.state.reports.generate(&"alice".into(), year, month).await;
        assert!(matches!(result, Err(AppError::Validation(_))), "{}-{}", year, month);
    }
    assert!(ctx.state.reports.list(&"alice".into(), None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_and_list_reports() {
    let ctx = TestContext::new();
    let user = UserId::from("alice");

    assert!(ctx.state.reports.get(&user, 2024, 1).await.unwrap_err().is_not_found());

    for (year, month) in [(2023, 11), (2024, 2), (2023, 12), (2024, 1)] {
        ctx.state.reports.generate(&user, year, month).await.unwrap();
    }

    let all = ctx.state.reports.list(&user, None, 10).await.unwrap();
    let periods: Vec<(i32, u32)> = all.iter().map(|r| r.period()).collect();
    assert_eq!(periods, vec![(2024, 2), (2024, 1), (2023, 12), (2023, 11)]);

    let limited = ctx.state.reports.list(&user, None, 2).await.unwrap();
    assert_eq!(limited.len(), 2);

    let only_2023 = ctx.state.reports.list(&user, Some(2023), 10).await.unwrap();
    assert_eq!(only_2023.len(), 2);

    let fetched = ctx.state.reports.get(&user, 2024, 1).await.unwrap();
    assert_eq!(fetched.period(), (2024, 1));
}

// ============================================================================
// Support content
// ============================================================================

#[tokio::test]
async fn test_faq_lifecycle() {
    let ctx = TestContext::new();
    let support = &ctx.state.support;

    let second = support
        .create("How do I settle up?", "Open the transaction and tap Settle.", "Payments", 2)
        .await
        .unwrap();
    let first = support
        .create("How do I split a bill?", "Add an expense and pick friends.", "Payments", 1)
        .await
        .unwrap();
    let account = support
        .create("How do I change my avatar?", "From your profile.", "Account", 1)
        .await
        .unwrap();

    let payments = support.list(Some("Payments")).await.unwrap();
    assert_eq!(payments.iter().map(|f| f.id).collect::<Vec<_>>(), vec![first.id, second.id]);

    let updated = support
        .update(account.id, &FaqUpdate { is_active: Some(false), ..Default::default() })
        .await
        .unwrap();
    assert!(!updated.is_active);
    assert_eq!(support.categories().await.unwrap(), vec!["Payments".to_string()]);
    assert_eq!(support.list(None).await.unwrap().len(), 2);

    // Inactive items are still reachable by id
    assert_eq!(support.get(account.id).await.unwrap().id, account.id);

    assert!(support.delete(second.id).await.unwrap());
    assert!(support.get(second.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_faq_validation() {
    let ctx = TestContext::new();
    let support = &ctx.state.support;

    let blank = support.create(" ", "answer", "General", 0).await;
    assert!(matches!(blank, Err(AppError::Validation(_))));

    let missing = support.update(Uuid::new_v4(), &FaqUpdate::default()).await;
    assert!(missing.unwrap_err().is_not_found());
}
