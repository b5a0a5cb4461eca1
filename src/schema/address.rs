//! Address validation for built documents.
//!
//! Runs before any network call so a malformed or foreign address fails the
//! sync permanently instead of bouncing off the directory on every retry.

use crate::config::SyncConfig;
use crate::provider::Provider;
use crate::schema::ExternalDocument;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

/// An address that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidAddress {
    pub field: String,
    pub address: String,
    pub reason: &'static str,
}

impl fmt::Display for InvalidAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid address '{}' in '{}': {}",
            self.address, self.field, self.reason
        )
    }
}

impl std::error::Error for InvalidAddress {}

/// `local@domain` with the RFC 5322 atom characters in the local part and
/// dotted alphanumeric/hyphen labels in the domain.
static ADDRESS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?$",
    )
    .expect("ADDRESS_REGEX is a valid regex pattern")
});

/// Maximum address length (RFC 5321).
const MAX_ADDRESS_LENGTH: usize = 254;

/// Maximum local-part length (RFC 5321).
const MAX_LOCAL_PART_LENGTH: usize = 64;

/// Maximum length of a single domain label.
const MAX_LABEL_LENGTH: usize = 63;

/// Syntactic check for `local@domain` addresses.
///
/// No quoting, comments or address literals. Length bounds are checked first
/// so their reason is specific; anything else the pattern rejects gets a
/// generic reason.
pub fn check_address_syntax(address: &str) -> Result<(), &'static str> {
    if address.is_empty() {
        return Err("address is empty");
    }
    if address.len() > MAX_ADDRESS_LENGTH {
        return Err("address is longer than 254 characters");
    }
    if address.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("address contains whitespace");
    }

    let Some((local, domain)) = address.rsplit_once('@') else {
        return Err("address has no '@'");
    };
    if local.is_empty() || local.len() > MAX_LOCAL_PART_LENGTH {
        return Err("local part must be 1 to 64 characters");
    }
    if domain.split('.').any(|label| label.len() > MAX_LABEL_LENGTH) {
        return Err("domain label must be 1 to 63 characters");
    }
    if !ADDRESS_REGEX.is_match(address) {
        return Err("address is not a valid local@domain address");
    }
    Ok(())
}

fn in_allowed_domain(address: &str, domains: &[String]) -> bool {
    if domains.is_empty() {
        return true;
    }
    let domain = address.rsplit_once('@').map(|(_, d)| d).unwrap_or_default();
    domains
        .iter()
        .any(|allowed| domain.eq_ignore_ascii_case(allowed.trim_start_matches('@')))
}

/// Collect every address in `document` that the directory will key on.
///
/// That is the primary identifier field plus the configured sub-field of each
/// entry in the address list field.
pub fn collect_addresses<'a>(
    document: &'a ExternalDocument,
    config: &SyncConfig,
) -> Result<Vec<(String, &'a str)>, InvalidAddress> {
    let mut addresses = Vec::new();

    match document.get(&config.primary_identifier_field) {
        Some(Value::String(address)) => {
            addresses.push((config.primary_identifier_field.clone(), address.as_str()))
        }
        Some(other) => {
            return Err(InvalidAddress {
                field: config.primary_identifier_field.clone(),
                address: other.to_string(),
                reason: "value is not a string",
            });
        }
        None => {}
    }

    if let Some(Value::Array(entries)) = document.get(&config.address_list_field) {
        let field = format!("{}.{}", config.address_list_field, config.address_field);
        for entry in entries {
            match entry.get(&config.address_field) {
                Some(Value::String(address)) => addresses.push((field.clone(), address.as_str())),
                Some(Value::Null) | None => {}
                Some(other) => {
                    return Err(InvalidAddress {
                        field,
                        address: other.to_string(),
                        reason: "value is not a string",
                    });
                }
            }
        }
    }

    Ok(addresses)
}

/// Validate all addresses in `document` against syntax and the provider's domains.
pub fn validate_addresses(
    document: &ExternalDocument,
    config: &SyncConfig,
    provider: &Provider,
) -> Result<(), InvalidAddress> {
    for (field, address) in collect_addresses(document, config)? {
        if let Err(reason) = check_address_syntax(address) {
            return Err(InvalidAddress {
                field,
                address: address.to_string(),
                reason,
            });
        }
        if !in_allowed_domain(address, &provider.address_domains) {
            return Err(InvalidAddress {
                field,
                address: address.to_string(),
                reason: "domain is not managed by this provider",
            });
        }
    }
    Ok(())
}
