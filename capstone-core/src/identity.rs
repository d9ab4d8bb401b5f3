//! Identity types for Capstone entities

use crate::EntityType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Common behaviour of the strongly-typed entity IDs.
pub trait EntityIdType: Copy + Eq + std::hash::Hash + fmt::Debug + fmt::Display {
    /// Entity type this ID refers to (used in NotFound errors).
    const ENTITY_TYPE: EntityType;

    /// Wrap a raw UUID.
    fn from_uuid(uuid: Uuid) -> Self;

    /// Access the underlying UUID.
    fn as_uuid(&self) -> Uuid;
}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident => $entity:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing UUID.
            pub const fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Generate a fresh timestamp-sortable ID.
            pub fn now_v7() -> Self {
                Self(Uuid::now_v7())
            }

            /// The nil ID (all zeroes).
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }
        }

        impl EntityIdType for $name {
            const ENTITY_TYPE: EntityType = EntityType::$entity;

            fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_entity_id!(
    /// Identifier of a thesis topic.
    TopicId => Topic
);
define_entity_id!(
    /// Identifier of an account in the external directory.
    AccountId => Account
);
define_entity_id!(
    /// Identifier of an approval record.
    ApprovalId => Approval
);
define_entity_id!(
    /// Identifier of a topic membership row.
    MembershipId => Membership
);
define_entity_id!(
    /// Identifier of a final defense council.
    DefenseCouncilId => DefenseCouncil
);
define_entity_id!(
    /// Identifier of a milestone review council.
    MilestoneCouncilId => MilestoneCouncil
);
