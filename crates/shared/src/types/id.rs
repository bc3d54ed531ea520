//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `SettlementId` where an `ObligationId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(UserId, "Unique identifier for a user acting on the ledger.");
typed_id!(EntityId, "Unique identifier for a legal entity (company).");
typed_id!(BranchId, "Unique identifier for a branch of a legal entity.");
typed_id!(PartyId, "Unique identifier for a counterparty.");
typed_id!(CategoryId, "Unique identifier for an obligation category.");
typed_id!(ObligationId, "Unique identifier for an obligation (document).");
typed_id!(ObligationLineId, "Unique identifier for an itemized obligation line.");
typed_id!(InstallmentId, "Unique identifier for a scheduled installment of an obligation.");
typed_id!(SettlementId, "Unique identifier for a settlement (payment).");
typed_id!(AllocationId, "Unique identifier for an allocation.");
typed_id!(AccountingPeriodId, "Unique identifier for an accounting period.");
typed_id!(CashboxId, "Unique identifier for a cashbox.");
typed_id!(BankAccountId, "Unique identifier for a bank account.");
