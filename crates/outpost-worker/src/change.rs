//! Change-feed records and decoding of account images.
//!
//! Records arrive in the DynamoDB Streams event shape. Attribute values
//! are a closed set of tagged variants; an unknown tag fails
//! deserialization of the batch instead of being skipped.

use std::collections::HashMap;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use outpost_core::error::{OutpostError, OutpostResult};
use outpost_core::keys::{AccountKey, EntityKind};
use outpost_core::models::account::{Account, AccountStatus, CloudCredentials};
use serde::{Deserialize, Deserializer};
use tracing::warn;

pub type Image = HashMap<String, AttributeValue>;

/// A single dynamically-typed attribute value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    String(String),
    /// Numbers travel as decimal strings.
    #[serde(rename = "N")]
    Number(String),
    #[serde(rename = "B", deserialize_with = "base64_bytes")]
    Binary(Vec<u8>),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "L")]
    List(Vec<AttributeValue>),
    #[serde(rename = "M")]
    Map(HashMap<String, AttributeValue>),
    #[serde(rename = "SS")]
    StringSet(Vec<String>),
    #[serde(rename = "NS")]
    NumberSet(Vec<String>),
    #[serde(rename = "BS", deserialize_with = "base64_byte_set")]
    BinarySet(Vec<Vec<u8>>),
}

impl AttributeValue {
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::String(_) => "S",
            Self::Number(_) => "N",
            Self::Binary(_) => "B",
            Self::Bool(_) => "BOOL",
            Self::Null(_) => "NULL",
            Self::List(_) => "L",
            Self::Map(_) => "M",
            Self::StringSet(_) => "SS",
            Self::NumberSet(_) => "NS",
            Self::BinarySet(_) => "BS",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number<T: FromStr>(&self) -> Option<T> {
        match self {
            Self::Number(n) => n.parse().ok(),
            _ => None,
        }
    }
}

fn base64_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    STANDARD.decode(encoded).map_err(serde::de::Error::custom)
}

fn base64_byte_set<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
    Vec::<String>::deserialize(deserializer)?
        .into_iter()
        .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Insert,
    Modify,
    Remove,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamRecord {
    #[serde(default)]
    pub keys: Image,
    #[serde(default)]
    pub new_image: Option<Image>,
    #[serde(default)]
    pub sequence_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeRecord {
    #[serde(rename = "eventID", default)]
    pub event_id: String,
    #[serde(rename = "eventName")]
    pub event_name: EventKind,
    pub dynamodb: StreamRecord,
}

/// One invocation's worth of change records.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeBatch {
    #[serde(rename = "Records")]
    pub records: Vec<ChangeRecord>,
}

impl ChangeRecord {
    /// Inserts and modifications carry a new image worth acting on.
    pub fn is_upsert(&self) -> bool {
        matches!(self.event_name, EventKind::Insert | EventKind::Modify)
    }

    /// Entity kind from the `pk` key, or `None` if it is missing, not a
    /// string, or has an unknown prefix.
    pub fn entity_kind(&self) -> Option<EntityKind> {
        match self.dynamodb.keys.get("pk") {
            Some(AttributeValue::String(pk)) => EntityKind::of_partition_key(pk),
            Some(other) => {
                warn!(
                    event_id = %self.event_id,
                    tag = other.type_tag(),
                    "Partition key is not a string"
                );
                None
            }
            None => None,
        }
    }
}

/// An account decoded from a change record's new image.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAccount {
    pub key: AccountKey,
    pub account: Account,
}

pub fn decode_account(record: &ChangeRecord) -> OutpostResult<DecodedAccount> {
    let image = record.dynamodb.new_image.as_ref().ok_or_else(|| {
        OutpostError::Decode(format!("record {} has no new image", record.event_id))
    })?;

    let key = AccountKey::parse(string_attr(image, "pk")?, string_attr(image, "sk")?)?;
    let name = string_attr(image, "account_name")?;
    if name != key.account {
        return Err(OutpostError::Decode(format!(
            "account_name `{name}` does not match sort key `{}`",
            key.account
        )));
    }

    let account = Account {
        name: name.to_string(),
        email: string_attr(image, "email")?.to_string(),
        parent_id: string_attr(image, "parent_id")?.to_string(),
        credentials: CloudCredentials {
            access_key: string_attr(image, "aws_access_key")?.to_string(),
            secret_key: string_attr(image, "aws_secret_key")?.to_string(),
            session_token: string_attr(image, "aws_session_token")?.to_string(),
        },
        version: number_attr(image, "account_version")?,
        status: status_attr(image, "account_status")?,
    };

    Ok(DecodedAccount { key, account })
}

fn attr<'a>(image: &'a Image, name: &str) -> OutpostResult<&'a AttributeValue> {
    image
        .get(name)
        .ok_or_else(|| OutpostError::Decode(format!("missing attribute `{name}`")))
}

fn wrong_type(name: &str, expected: &str, found: &AttributeValue) -> OutpostError {
    OutpostError::Decode(format!(
        "attribute `{name}` should be {expected}, found {}",
        found.type_tag()
    ))
}

fn string_attr<'a>(image: &'a Image, name: &str) -> OutpostResult<&'a str> {
    let value = attr(image, name)?;
    value.as_str().ok_or_else(|| wrong_type(name, "S", value))
}

fn number_attr<T: FromStr>(image: &Image, name: &str) -> OutpostResult<T> {
    let value = attr(image, name)?;
    value.as_number().ok_or_else(|| wrong_type(name, "N", value))
}

/// Status is stored by name; numeric ordinals from older writers are
/// accepted too.
fn status_attr(image: &Image, name: &str) -> OutpostResult<AccountStatus> {
    match attr(image, name)? {
        AttributeValue::String(s) => s.parse().map_err(OutpostError::Decode),
        value @ AttributeValue::Number(_) => value
            .as_number::<u64>()
            .and_then(AccountStatus::from_ordinal)
            .ok_or_else(|| OutpostError::Decode(format!("attribute `{name}` is not a status"))),
        other => Err(wrong_type(name, "S or N", other)),
    }
}
