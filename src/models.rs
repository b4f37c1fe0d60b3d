//! Domain types shared by every layer.
//!
//! These are the shapes persisted by the local JSON store (camelCase keys) and
//! exchanged with the relay. The relational store maps them to its own
//! entities in [`crate::entities`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the contract a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Obligated to pay; marks installments paid
    Debtor,
    /// Owed payment; confirms receipt and owns the PIX key
    Creditor,
}

impl Role {
    /// Stable identifier used as the user id of the single user holding this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debtor => "debtor",
            Self::Creditor => "creditor",
        }
    }

    /// The other party.
    #[must_use]
    pub const fn counterpart(self) -> Self {
        match self {
            Self::Debtor => Self::Creditor,
            Self::Creditor => Self::Debtor,
        }
    }

    /// Parses a user id or role string.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "debtor" => Some(Self::Debtor),
            "creditor" => Some(Self::Creditor),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Equal to `role.as_str()`
    pub id: String,
    /// Display name
    pub name: String,
    /// Debtor or creditor
    pub role: Role,
    /// Payment-routing key, only meaningful for the creditor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pix_key: Option<String>,
}

/// Persisted installment status. `overdue` is derived, see [`Installment::is_overdue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    /// Awaiting payment
    Pending,
    /// Debtor says it is paid; awaiting creditor confirmation
    PaidByDebtor,
    /// Creditor confirmed receipt (terminal)
    Confirmed,
}

impl InstallmentStatus {
    /// Column value used by the relational store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PaidByDebtor => "paid_by_debtor",
            Self::Confirmed => "confirmed",
        }
    }

    /// Parses a stored column value. Legacy rows may carry `overdue`, which was
    /// never a real persisted state and reads back as `pending`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" | "overdue" => Some(Self::Pending),
            "paid_by_debtor" => Some(Self::PaidByDebtor),
            "confirmed" => Some(Self::Confirmed),
            _ => None,
        }
    }
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status as shown to users, including the derived overdue state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    /// Pending and not yet due
    Pending,
    /// Pending and past due
    Overdue,
    /// Marked paid by the debtor
    PaidByDebtor,
    /// Confirmed by the creditor
    Confirmed,
}

/// One scheduled payment ("promissory").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installment {
    /// `prom-<number>`
    pub id: String,
    /// 1-based ordering key
    pub number: u32,
    /// Amount due
    pub amount: f64,
    /// Due instant
    pub due_date: DateTime<Utc>,
    /// Persisted status
    pub status: InstallmentStatus,
    /// When the debtor marked it paid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debtor_confirmed_at: Option<DateTime<Utc>>,
    /// When the creditor confirmed receipt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creditor_confirmed_at: Option<DateTime<Utc>>,
    /// Receipt URI or embedded image payload
    #[serde(default, rename = "receiptUrl", skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
    /// When the debtor paid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Installment {
    /// Builds the id for installment `number`.
    #[must_use]
    pub fn id_for(number: u32) -> String {
        format!("prom-{number}")
    }

    /// Pending and due before `now`.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == InstallmentStatus::Pending && self.due_date < now
    }

    /// Status with overdue computed at read time.
    #[must_use]
    pub fn display_status(&self, now: DateTime<Utc>) -> DisplayStatus {
        match self.status {
            InstallmentStatus::Pending if self.is_overdue(now) => DisplayStatus::Overdue,
            InstallmentStatus::Pending => DisplayStatus::Pending,
            InstallmentStatus::PaidByDebtor => DisplayStatus::PaidByDebtor,
            InstallmentStatus::Confirmed => DisplayStatus::Confirmed,
        }
    }
}

/// The single contract aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    /// Always `contract-1`
    pub id: String,
    /// Debtor display name snapshot
    pub debtor_name: String,
    /// Debtor tax document, if configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debtor_document: Option<String>,
    /// Debtor phone, if configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debtor_phone: Option<String>,
    /// Creditor display name snapshot
    pub creditor_name: String,
    /// Creditor tax document, if configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creditor_document: Option<String>,
    /// Where the debtor sends money
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creditor_pix_key: Option<String>,
    /// Sum of all installment amounts at creation
    pub total_amount: f64,
    /// Ordered by `number`
    #[serde(rename = "promissories")]
    pub installments: Vec<Installment>,
    /// When the contract was first created
    pub created_at: DateTime<Utc>,
}

impl Contract {
    /// Identifier of the one contract per deployment.
    pub const ID: &'static str = "contract-1";

    /// Looks up an installment by id.
    #[must_use]
    pub fn installment(&self, id: &str) -> Option<&Installment> {
        self.installments.iter().find(|p| p.id == id)
    }

    /// Mutable lookup by id.
    pub fn installment_mut(&mut self, id: &str) -> Option<&mut Installment> {
        self.installments.iter_mut().find(|p| p.id == id)
    }

    /// Amount of a single installment. All installments share it.
    #[must_use]
    pub fn unit_amount(&self) -> f64 {
        self.installments.first().map_or(0.0, |p| p.amount)
    }
}

/// Kind of notification, also used as the push `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Debtor marked an installment paid
    PaymentMarked,
    /// Creditor confirmed receipt
    PaymentConfirmed,
    /// Installment due soon
    Reminder,
}

impl NotificationType {
    /// Column value used by the relational store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PaymentMarked => "payment_marked",
            Self::PaymentConfirmed => "payment_confirmed",
            Self::Reminder => "reminder",
        }
    }

    /// Parses a stored column value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "payment_marked" => Some(Self::PaymentMarked),
            "payment_confirmed" => Some(Self::PaymentConfirmed),
            "reminder" => Some(Self::Reminder),
            _ => None,
        }
    }
}

/// An in-app notification row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// `notif-<uuid>`
    pub id: String,
    /// Target user id
    pub user_id: String,
    /// Short title
    pub title: String,
    /// Human-readable body
    pub message: String,
    /// Kind
    #[serde(rename = "type")]
    pub kind: NotificationType,
    /// Flipped by the recipient
    #[serde(default)]
    pub read: bool,
    /// Creation instant
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Creates an unread notification with a fresh id.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("notif-{}", uuid::Uuid::new_v4()),
            user_id: user_id.into(),
            title: title.into(),
            message: message.into(),
            kind,
            read: false,
            created_at: now,
        }
    }
}

/// Per-subscription key material produced by the push service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// Client public key (P-256, URL-safe base64)
    pub p256dh: String,
    /// Auth secret (URL-safe base64)
    pub auth: String,
}

/// Endpoint plus keys, the wire shape of a browser push subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionData {
    /// Push service URI
    pub endpoint: String,
    /// Encryption keys
    pub keys: SubscriptionKeys,
}

/// A stored device registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    /// Owning user id
    pub user_id: String,
    /// Push service URI; unique together with `user_id`
    pub endpoint: String,
    /// Client public key
    pub p256dh: String,
    /// Auth secret
    pub auth: String,
}

impl PushSubscription {
    /// Builds the stored row from the wire shape.
    #[must_use]
    pub fn from_data(user_id: impl Into<String>, data: SubscriptionData) -> Self {
        Self {
            user_id: user_id.into(),
            endpoint: data.endpoint,
            p256dh: data.keys.p256dh,
            auth: data.keys.auth,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::TimeZone;

    fn pending(due: DateTime<Utc>) -> Installment {
        Installment {
            id: Installment::id_for(1),
            number: 1,
            amount: 1000.0,
            due_date: due,
            status: InstallmentStatus::Pending,
            debtor_confirmed_at: None,
            creditor_confirmed_at: None,
            receipt: None,
            paid_at: None,
        }
    }

    #[test]
    fn test_overdue_is_derived_from_due_date() {
        let due = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        let mut installment = pending(due);

        assert_eq!(
            installment.display_status(due - chrono::Duration::days(1)),
            DisplayStatus::Pending
        );
        assert_eq!(
            installment.display_status(due + chrono::Duration::days(1)),
            DisplayStatus::Overdue
        );

        installment.status = InstallmentStatus::PaidByDebtor;
        assert!(!installment.is_overdue(due + chrono::Duration::days(1)));
    }

    #[test]
    fn test_installment_json_uses_legacy_keys() {
        let due = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
        let mut installment = pending(due);
        installment.receipt = Some("https://example.com/r.png".to_string());

        let json = serde_json::to_value(&installment).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["dueDate"], "2026-01-10T00:00:00Z");
        assert_eq!(json["receiptUrl"], "https://example.com/r.png");
        assert!(json.get("paidAt").is_none());
    }

    #[test]
    fn test_status_parse_maps_legacy_overdue_to_pending() {
        assert_eq!(
            InstallmentStatus::parse("overdue"),
            Some(InstallmentStatus::Pending)
        );
        assert_eq!(
            InstallmentStatus::parse("paid_by_debtor"),
            Some(InstallmentStatus::PaidByDebtor)
        );
        assert_eq!(InstallmentStatus::parse("rejected"), None);
    }

    #[test]
    fn test_notification_type_serializes_snake_case() {
        let json = serde_json::to_string(&NotificationType::PaymentConfirmed).unwrap();
        assert_eq!(json, "\"payment_confirmed\"");
        assert_eq!(Role::Debtor.counterpart(), Role::Creditor);
    }
}
