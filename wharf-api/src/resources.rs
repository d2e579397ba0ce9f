//! Resource definitions for the collections served by the API.
//!
//! Each [`ResourceSpec`] drives the generic handlers in
//! [`crate::routes::resource`]: which collection to read, which JSON keys to
//! answer with, and how to validate and transform incoming documents.

use wharf_core::{Collection, ValidationError};

/// Static description of one REST resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSpec {
    /// Store collection and cache key prefix.
    pub collection: &'static str,
    /// JSON key wrapping a single record.
    pub singular: &'static str,
    /// JSON key wrapping a list of records.
    pub plural: &'static str,
    /// Name used in messages.
    pub display_name: &'static str,
    /// Field identifying an existing record on create. `None` always inserts.
    pub natural_key: Option<&'static str>,
    /// Fields that must be present and non-empty on create.
    pub required_fields: &'static [&'static str],
    /// String fields replaced by their bcrypt hash before storage.
    pub hashed_fields: &'static [&'static str],
    /// Fields removed from every response.
    pub redacted_fields: &'static [&'static str],
    /// Query parameters accepted in addition to `id`.
    pub id_aliases: &'static [&'static str],
}

impl ResourceSpec {
    /// Validated collection name.
    pub fn collection(&self) -> Result<Collection, ValidationError> {
        Collection::new(self.collection)
    }

    /// Route path under `/api`.
    pub fn path(&self) -> String {
        format!("/{}", self.singular)
    }
}

pub const PORTS: ResourceSpec = ResourceSpec {
    collection: "ports",
    singular: "port",
    plural: "ports",
    display_name: "Port",
    natural_key: Some("portCode"),
    required_fields: &["portCode", "portName", "connectionType"],
    hashed_fields: &[],
    redacted_fields: &[],
    id_aliases: &[],
};

pub const USERS: ResourceSpec = ResourceSpec {
    collection: "users",
    singular: "user",
    plural: "users",
    display_name: "User",
    natural_key: None,
    required_fields: &["name", "email", "password"],
    hashed_fields: &["password"],
    redacted_fields: &["password"],
    id_aliases: &["userId"],
};

pub const ROLES: ResourceSpec = ResourceSpec {
    collection: "roles",
    singular: "role",
    plural: "roles",
    display_name: "Role",
    natural_key: Some("roleName"),
    required_fields: &["roleName"],
    hashed_fields: &[],
    redacted_fields: &[],
    id_aliases: &[],
};

/// Every resource mounted by the router.
pub const ALL: [ResourceSpec; 3] = [PORTS, USERS, ROLES];
