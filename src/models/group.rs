//! Group records as seen by the ledger. Groups are owned by the group
//! component; the ledger only reads names and membership.

use super::{Currency, GroupId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A user's membership in a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub user_id: UserId,
    pub name: String,
    pub avatar: String,
    #[serde(default)]
    pub balance: Decimal,
    #[serde(default)]
    pub currency: Currency,
}

impl GroupMember {
    pub fn new(user_id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            avatar: String::new(),
            balance: Decimal::ZERO,
            currency: Currency::Inr,
        }
    }
}

/// Group with its member list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub members: Vec<GroupMember>,
}

impl Group {
    pub fn new(id: impl Into<GroupId>, name: impl Into<String>, members: Vec<GroupMember>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            members,
        }
    }

    /// Check if a user is a member of the group
    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.iter().any(|m| &m.user_id == user_id)
    }
}

/// Lightweight reference used when resolving feed audiences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: GroupId,
    pub name: String,
}
