//! Field and auction checks run before any network call.

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use auction_types::Auction;

// ASCII classes only: `\d` would also accept non-ASCII digits.
static BID_AMOUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(\.[0-9]{1,18})?$").expect("valid bid amount regex"));

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub const MIN_NAME_LEN: usize = 2;

/// Decimal amount with up to 18 fraction digits.
pub fn is_valid_bid_amount(value: &str) -> bool {
    BID_AMOUNT_RE.is_match(value)
}

pub fn is_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Contact,
    BidAmount,
    Auction,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Name => "name",
            Field::Contact => "contact",
            Field::BidAmount => "bidAmount",
            Field::Auction => "auction",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

/// Every field error found in one validation pass, in form order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Message for `field`, if it failed.
    pub fn get(&self, field: Field) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    fn push(&mut self, field: Field, message: &str) {
        self.0.push(FieldError {
            field,
            message: message.to_string(),
        });
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

/// Raw form input as typed by the bidder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BidFormInput {
    pub name: String,
    /// Email or Telegram handle
    pub contact: String,
    pub bid_amount: String,
}

pub fn validate_form(input: &BidFormInput, require_email: bool) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    let name = input.name.trim();
    if name.is_empty() {
        errors.push(Field::Name, "Name is required");
    } else if name.chars().count() < MIN_NAME_LEN {
        errors.push(Field::Name, "Name must be at least 2 characters");
    }

    if require_email {
        let contact = input.contact.trim();
        if contact.is_empty() {
            errors.push(Field::Contact, "Email is required");
        } else if !is_email(contact) {
            errors.push(Field::Contact, "Invalid email format");
        }
    }

    let amount = input.bid_amount.as_str();
    if amount.is_empty() {
        errors.push(Field::BidAmount, "Bid amount is required");
    } else if !is_valid_bid_amount(amount) {
        errors.push(Field::BidAmount, "Invalid bid amount");
    }

    errors
}

pub fn validate_auction(auction: &Auction, now: DateTime<Utc>) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    if !auction.is_sealed() {
        errors.push(Field::Auction, "This auction is not a sealed-bid auction!");
    } else if auction.is_ended(now) {
        errors.push(Field::Auction, "This auction has ended");
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn input(name: &str, contact: &str, amount: &str) -> BidFormInput {
        BidFormInput {
            name: name.to_string(),
            contact: contact.to_string(),
            bid_amount: amount.to_string(),
        }
    }

    #[test]
    fn test_bid_amount_accepts() {
        for amount in ["0", "1", "123.45", "007", "1.000000000000000001"] {
            assert!(is_valid_bid_amount(amount), "{amount} should be valid");
        }
    }

    #[test]
    fn test_bid_amount_rejects() {
        for amount in [
            "",
            "-1",
            "1.",
            ".5",
            "1.0000000000000000001",
            "abc",
            "1e5",
            "1,5",
            " 1",
            "١٢",
        ] {
            assert!(!is_valid_bid_amount(amount), "{amount:?} should be invalid");
        }
    }

    #[test]
    fn test_email_shape() {
        assert!(is_email("alice@example.com"));
        assert!(!is_email("@alice"));
        assert!(!is_email("alice@example"));
        assert!(!is_email("a lice@example.com"));
    }

    #[test]
    fn test_validate_form_name_rules() {
        let errors = validate_form(&input("  ", "", "1"), false);
        assert_eq!(errors.get(Field::Name), Some("Name is required"));

        let errors = validate_form(&input(" A ", "", "1"), false);
        assert_eq!(errors.get(Field::Name), Some("Name must be at least 2 characters"));

        assert!(validate_form(&input("Al", "", "1"), false).is_empty());
    }

    #[test]
    fn test_validate_form_contact_only_when_required() {
        assert!(validate_form(&input("Alice", "@alice", "1"), false).is_empty());

        let errors = validate_form(&input("Alice", "@alice", "1"), true);
        assert_eq!(errors.get(Field::Contact), Some("Invalid email format"));

        let errors = validate_form(&input("Alice", "", "1"), true);
        assert_eq!(errors.get(Field::Contact), Some("Email is required"));
    }

    #[test]
    fn test_validate_form_amount_taken_as_typed() {
        for amount in [" 1 ", "1 ", "\t2.5"] {
            let errors = validate_form(&input("Alice", "", amount), false);
            assert_eq!(
                errors.get(Field::BidAmount),
                Some("Invalid bid amount"),
                "{amount:?} should be invalid"
            );
        }
        let errors = validate_form(&input("Alice", "", "   "), false);
        assert_eq!(errors.get(Field::BidAmount), Some("Invalid bid amount"));
    }

    #[test]
    fn test_validate_form_collects_every_error() {
        let errors = validate_form(&input("", "nope", "-3"), true);
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.get(Field::BidAmount), Some("Invalid bid amount"));
        assert_eq!(
            errors.to_string(),
            "Name is required; Invalid email format; Invalid bid amount"
        );
    }

    #[test]
    fn test_validate_auction() {
        let expiration = Utc.with_ymd_and_hms(2025, 11, 17, 12, 0, 0).unwrap();
        let json = serde_json::json!({
            "id": 1,
            "name": "Devconnect",
            "slug": "devconnect",
            "walletAddress": "0x0000000000000000000000000000000000000001",
            "expirationTime": expiration,
            "countDownTime": 0,
            "type": "sealed",
            "createdAt": expiration,
            "updatedAt": expiration
        });
        let mut auction: Auction = serde_json::from_value(json).unwrap();

        let before = expiration - chrono::Duration::minutes(1);
        assert!(validate_auction(&auction, before).is_empty());
        assert_eq!(
            validate_auction(&auction, expiration).get(Field::Auction),
            Some("This auction has ended")
        );

        auction.auction_type = "english".to_string();
        assert_eq!(
            validate_auction(&auction, before).get(Field::Auction),
            Some("This auction is not a sealed-bid auction!")
        );
    }
}
