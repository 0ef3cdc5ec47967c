mod helpers;

use helpers::*;
use paisasplit_backend::error::AppError;
use paisasplit_backend::models::*;
use paisasplit_backend::services::*;
use rust_decimal::Decimal;

// ============================================================================
// Currency conversion
// ============================================================================

#[test]
fn test_rate_table() {
    let expected = [
        (Currency::Usd, 83),
        (Currency::Eur, 89),
        (Currency::Gbp, 104),
        (Currency::Cad, 61),
        (Currency::Aud, 54),
        (Currency::Inr, 1),
    ];
    for (currency, rate) in expected {
        assert_eq!(convert_to_inr(Decimal::ONE, currency).unwrap(), Decimal::from(rate));
    }
}

#[test]
fn test_unknown_currency_is_rejected() {
    let err = "JPY".parse::<Currency>().unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[test]
fn test_currency_wire_format() {
    let json = serde_json::to_string(&Currency::Gbp).unwrap();
    assert_eq!(json, "\"GBP\"");
}

// ============================================================================
// Transaction model
// ============================================================================

#[test]
fn test_transaction_serializes_type_field() {
    let tx = Transaction::new(
        new_transaction("alice", "Dinner", "10", TransactionType::Split, &["bob"]),
        default_start(),
    );
    let value = serde_json::to_value(&tx).unwrap();
    assert_eq!(value["type"], "split");
    assert_eq!(value["status"], "pending");
}

#[test]
fn test_activity_mirrors_transaction() {
    let tx = Transaction::new(
        new_transaction("alice", "Cab", "250", TransactionType::Payment, &["bob"]),
        default_start(),
    );
    let item = ActivityItem::from_transaction(&tx, Some("Flatmates".to_string()));

    assert_eq!(item.id, tx.id);
    assert_eq!(item.timestamp, tx.created_at);
    assert_eq!(item.created_by, tx.user_id);
    assert_eq!(item.group_name.as_deref(), Some("Flatmates"));
    assert_eq!(item.description, "payment of 250 INR");
}

// ============================================================================
// Settlement plans
// ============================================================================

#[test]
fn test_plans_always_net_to_zero() {
    let cases = [
        (TransactionType::Split, "100", vec!["bob", "carol"]),
        (TransactionType::Split, "10.01", vec!["bob", "carol", "dave"]),
        (TransactionType::Payment, "99.99", vec!["bob", "carol"]),
        (TransactionType::Loan, "500", vec!["bob"]),
        (TransactionType::Refund, "33.33", vec!["bob", "carol", "dave", "erin"]),
    ];

    for (kind, amount, participants) in cases {
        let tx = Transaction::new(
            new_transaction("alice", "Case", amount, kind, &participants),
            default_start(),
        );
        let plan = SettlementPlan::for_transaction(&tx).unwrap();
        assert!(!plan.is_empty(), "{} {} produced no deltas", kind, amount);
        assert!(plan.net().is_zero(), "{} {} does not net to zero", kind, amount);
    }
}

#[test]
fn test_loan_plan_credits_lender() {
    let tx = Transaction::new(
        new_transaction("alice", "Rent advance", "500", TransactionType::Loan, &["bob"]),
        default_start(),
    );
    let plan = SettlementPlan::for_transaction(&tx).unwrap();
    assert_eq!(plan.delta_for(&"alice".into()), dec("500"));
    assert_eq!(plan.delta_for(&"bob".into()), dec("-500"));
}

#[test]
fn test_creator_listed_as_participant_is_not_a_counterparty() {
    let tx = Transaction::new(
        new_transaction("alice", "Groceries", "60", TransactionType::Split, &["alice", "bob"]),
        default_start(),
    );
    let plan = SettlementPlan::for_transaction(&tx).unwrap();
    assert_eq!(plan.deltas.len(), 2);
    assert_eq!(plan.delta_for(&"alice".into()), dec("30"));
    assert_eq!(plan.delta_for(&"bob".into()), dec("-30"));
}

// ============================================================================
// Pagination
// ============================================================================

#[test]
fn test_page_bounds() {
    assert!(Page::new(0, 0).is_ok());
    assert!(Page::new(0, MAX_PAGE_LIMIT).is_ok());
    assert!(matches!(Page::new(-1, 10), Err(AppError::Validation(_))));
}

// ============================================================================
// Group directory
// ============================================================================

#[test]
fn test_memory_group_directory() {
    use paisasplit_backend::repositories::{GroupDirectory, MemoryStore};

    let store = MemoryStore::new();
    tokio_test::block_on(async {
        store
            .upsert_group(Group::new(
                "flat",
                "Flatmates",
                vec![GroupMember::new("alice", "Alice"), GroupMember::new("bob", "Bob")],
            ))
            .await;
        store
            .upsert_group(Group::new("trip", "Goa", vec![GroupMember::new("bob", "Bob")]))
            .await;

        let alice_groups = tokio_test::assert_ok!(store.groups_for_user(&"alice".into()).await);
        assert_eq!(alice_groups.len(), 1);
        assert_eq!(alice_groups[0].name, "Flatmates");

        let bob_groups = tokio_test::assert_ok!(store.groups_for_user(&"bob".into()).await);
        assert_eq!(bob_groups.len(), 2);

        assert!(store.remove_group(&"trip".into()).await);
        let name = tokio_test::assert_ok!(store.group_name(&"trip".into()).await);
        assert_eq!(name, None);
        let members = tokio_test::assert_ok!(store.members(&"trip".into()).await);
        assert!(members.is_empty());
    });
}
