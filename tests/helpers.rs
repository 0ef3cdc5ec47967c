#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use paisasplit_backend::config::{AppConfig, DatabaseConfig};
use paisasplit_backend::database::Database;
use paisasplit_backend::models::*;
use paisasplit_backend::repositories::*;
use paisasplit_backend::{AppState, Clock, ManualClock};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;

/// Services over a fresh in-memory store with a hand-driven clock
pub struct TestContext {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::starting_at(default_start())
    }

    pub fn starting_at(start: DateTime<Utc>) -> Self {
        let clock = Arc::new(ManualClock::new(start));
        let config = AppConfig {
            database: DatabaseConfig::in_memory(),
            ..AppConfig::default()
        };
        let (state, store) = AppState::in_memory(config, clock.clone());
        Self {
            state,
            store,
            clock,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn set_time(&self, at: DateTime<Utc>) {
        self.clock.set(at);
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Register a group whose members are the given user ids
    pub async fn add_group(&self, id: &str, name: &str, members: &[&str]) {
        let members = members.iter().map(|m| GroupMember::new(*m, *m)).collect();
        self.store.upsert_group(Group::new(id, name, members)).await;
    }

    pub async fn create_balance(&self, user: &str, amount: &str, currency: Currency) -> Balance {
        self.state
            .balances
            .create(new_balance(user, amount, currency))
            .await
            .expect("Failed to create balance")
    }

    pub async fn create_transaction(
        &self,
        user: &str,
        title: &str,
        amount: &str,
        transaction_type: TransactionType,
        participants: &[&str],
    ) -> Transaction {
        self.state
            .transactions
            .create(new_transaction(user, title, amount, transaction_type, participants))
            .await
            .expect("Failed to create transaction")
    }
}

/// Noon on 15 June 2024, UTC
pub fn default_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("Invalid decimal literal")
}

pub fn new_balance(user: &str, amount: &str, currency: Currency) -> NewBalance {
    NewBalance {
        user_id: user.into(),
        name: format!("{} wallet", user),
        avatar: String::new(),
        amount: dec(amount),
        currency,
    }
}

pub fn new_transaction(
    user: &str,
    title: &str,
    amount: &str,
    transaction_type: TransactionType,
    participants: &[&str],
) -> NewTransaction {
    NewTransaction {
        user_id: user.into(),
        title: title.to_string(),
        amount: dec(amount),
        currency: Currency::Inr,
        transaction_type,
        group_id: None,
        participants: participants.iter().map(|p| UserId::from(*p)).collect(),
        description: None,
    }
}

/// Postgres-backed fixtures, only available when TEST_DATABASE_URL is set
pub struct TestDatabase {
    pub pool: PgPool,
}

impl TestDatabase {
    /// Connect and migrate, or `None` when no test database is configured
    pub async fn from_env() -> Option<Self> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;

        let config = DatabaseConfig {
            url,
            max_connections: 5,
            acquire_timeout_secs: 10,
            idle_timeout_secs: 300,
            max_lifetime_secs: 600,
            test_before_acquire: true,
        };

        let database = Database::connect(&config)
            .await
            .expect("Failed to connect to test database");

        database
            .migrate(None)
            .await
            .expect("Failed to run migrations");

        Some(Self {
            pool: database.into_pool(),
        })
    }

    pub async fn add_group(&self, id: &str, name: &str, members: &[&str]) {
        sqlx::query("INSERT INTO groups (id, name) VALUES ($1, $2)")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await
            .expect("Failed to insert group");

        for member in members {
            sqlx::query("INSERT INTO group_members (group_id, user_id, name) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(*member)
                .bind(*member)
                .execute(&self.pool)
                .await
                .expect("Failed to insert group member");
        }
    }
}
