//! Local identity objects that can be pushed to a directory.
//!
//! The identity store owns these; the sync engine only reads them. Each object
//! exposes a stable reference used as the link-table key, a canonical address
//! used for adoption and default identifiers, and a JSON view handed to the
//! property-mapping evaluator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

/// Kind of local object. Mappings are selected by kind and links are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    User,
    Group,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::User => "User",
            ObjectKind::Group => "Group",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "User" => Ok(ObjectKind::User),
            "Group" => Ok(ObjectKind::Group),
            other => Err(format!("unknown object kind '{}'", other)),
        }
    }
}

/// An identity object the sync client can write to or delete from a directory.
pub trait SyncObject: Send + Sync {
    fn kind(&self) -> ObjectKind;

    /// Stable local identifier.
    fn object_ref(&self) -> &str;

    /// Address used as the primary identifier when no mapping sets one, and as
    /// the external id when adopting a pre-existing remote object.
    fn canonical_address(&self) -> &str;

    /// JSON view of the object exposed to property mappings.
    fn to_context(&self) -> Value;
}

/// A user from the identity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

fn default_active() -> bool {
    true
}

impl LocalUser {
    pub fn new(id: impl Into<String>, username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            name: String::new(),
            email: email.into(),
            is_active: true,
            groups: Vec::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

impl SyncObject for LocalUser {
    fn kind(&self) -> ObjectKind {
        ObjectKind::User
    }

    fn object_ref(&self) -> &str {
        &self.id
    }

    fn canonical_address(&self) -> &str {
        &self.email
    }

    fn to_context(&self) -> Value {
        json!({
            "id": self.id,
            "username": self.username,
            "name": self.name,
            "email": self.email,
            "is_active": self.is_active,
            "groups": self.groups,
            "attributes": self.attributes,
        })
    }
}

/// A group from the identity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalGroup {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl LocalGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            members: Vec::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members = members.into_iter().map(Into::into).collect();
        self
    }
}

impl SyncObject for LocalGroup {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Group
    }

    fn object_ref(&self) -> &str {
        &self.id
    }

    fn canonical_address(&self) -> &str {
        &self.email
    }

    fn to_context(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "members": self.members,
            "attributes": self.attributes,
        })
    }
}

/// Owned copy of what the schema builder reads from an object, so a build can
/// move to another thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSnapshot {
    kind: ObjectKind,
    object_ref: String,
    canonical_address: String,
    context: Value,
}

impl ObjectSnapshot {
    pub fn of<O>(object: &O) -> Self
    where
        O: SyncObject + ?Sized,
    {
        Self {
            kind: object.kind(),
            object_ref: object.object_ref().to_string(),
            canonical_address: object.canonical_address().to_string(),
            context: object.to_context(),
        }
    }
}

impl SyncObject for ObjectSnapshot {
    fn kind(&self) -> ObjectKind {
        self.kind
    }

    fn object_ref(&self) -> &str {
        &self.object_ref
    }

    fn canonical_address(&self) -> &str {
        &self.canonical_address
    }

    fn to_context(&self) -> Value {
        self.context.clone()
    }
}
