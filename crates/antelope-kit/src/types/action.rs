//! Action types.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Name;
use crate::abi::serializer::{ByteReader, ByteWriter};
use crate::error::{ParseNameError, SerializationError};

/// An `(actor, permission)` pair authorizing an action, written `alice@active`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: Name,
    pub permission: Name,
}

impl PermissionLevel {
    /// Create a permission level.
    pub fn new(actor: Name, permission: Name) -> Self {
        Self { actor, permission }
    }

    fn pack(&self, w: &mut ByteWriter) {
        w.write_u64(self.actor.as_u64());
        w.write_u64(self.permission.as_u64());
    }

    fn unpack(r: &mut ByteReader<'_>) -> Result<Self, SerializationError> {
        Ok(Self {
            actor: Name::from_u64(r.read_u64("authorization.actor")?),
            permission: Name::from_u64(r.read_u64("authorization.permission")?),
        })
    }
}

impl FromStr for PermissionLevel {
    type Err = ParseNameError;

    /// Parse `actor@permission`; a bare `actor` means `actor@active`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (actor, permission) = s.split_once('@').unwrap_or((s, "active"));
        Ok(Self {
            actor: actor.parse()?,
            permission: permission.parse()?,
        })
    }
}

impl Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.actor, self.permission)
    }
}

/// Action payload.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionData {
    /// Named fields, encoded through the contract ABI and validated against it.
    Fields(Map<String, Value>),
    /// Pre-encoded bytes. Skips the ABI lookup entirely; the caller is responsible
    /// for the bytes matching what the contract expects.
    Raw(Vec<u8>),
}

impl ActionData {
    /// Build a field payload from a JSON object.
    pub fn from_json(value: Value) -> Result<Self, SerializationError> {
        match value {
            Value::Object(map) => Ok(ActionData::Fields(map)),
            other => Err(SerializationError::invalid(
                "action data",
                format!("expected a JSON object, got {}", other),
            )),
        }
    }
}

impl From<Map<String, Value>> for ActionData {
    fn from(map: Map<String, Value>) -> Self {
        ActionData::Fields(map)
    }
}

impl From<Vec<u8>> for ActionData {
    fn from(bytes: Vec<u8>) -> Self {
        ActionData::Raw(bytes)
    }
}

/// A contract action as described by the caller.
///
/// # Example
///
/// ```
/// use antelope_kit::{Action, ActionData};
/// use serde_json::json;
///
/// let action = Action::new(
///     "eosio.token".parse().unwrap(),
///     "transfer".parse().unwrap(),
///     ActionData::from_json(json!({
///         "from": "alice",
///         "to": "bob",
///         "quantity": "1.0000 TOK",
///         "memo": "",
///     }))
///     .unwrap(),
/// )
/// .authorize("alice@active".parse().unwrap());
/// assert_eq!(action.authorization.len(), 1);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    /// Contract account.
    pub account: Name,
    /// Action name.
    pub name: Name,
    /// Ordered authorizations.
    pub authorization: Vec<PermissionLevel>,
    /// Payload.
    pub data: ActionData,
}

impl Action {
    /// Create an action with no authorizations.
    pub fn new(account: Name, name: Name, data: ActionData) -> Self {
        Self {
            account,
            name,
            authorization: Vec::new(),
            data,
        }
    }

    /// Append an authorization.
    pub fn authorize(mut self, level: PermissionLevel) -> Self {
        self.authorization.push(level);
        self
    }

    /// Replace the authorization list.
    pub fn with_authorization(mut self, authorization: Vec<PermissionLevel>) -> Self {
        self.authorization = authorization;
        self
    }
}

/// An action whose payload has been binary encoded; the form carried inside a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedAction {
    pub account: Name,
    pub name: Name,
    pub authorization: Vec<PermissionLevel>,
    #[serde(with = "super::hex_bytes")]
    pub data: Vec<u8>,
}

impl SerializedAction {
    pub(crate) fn pack(&self, w: &mut ByteWriter) -> Result<(), SerializationError> {
        w.write_u64(self.account.as_u64());
        w.write_u64(self.name.as_u64());
        w.write_len(self.authorization.len())?;
        for level in &self.authorization {
            level.pack(w);
        }
        w.write_bytes(&self.data)
    }

    pub(crate) fn unpack(r: &mut ByteReader<'_>) -> Result<Self, SerializationError> {
        let account = Name::from_u64(r.read_u64("action.account")?);
        let name = Name::from_u64(r.read_u64("action.name")?);
        let count = r.read_len("action.authorization", 16)?;
        let authorization = (0..count)
            .map(|_| PermissionLevel::unpack(r))
            .collect::<Result<Vec<_>, _>>()?;
        let data = r.read_bytes("action.data")?.to_vec();
        Ok(Self {
            account,
            name,
            authorization,
            data,
        })
    }
}
