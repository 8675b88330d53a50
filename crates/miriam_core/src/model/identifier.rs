//! Registry identifier formatting.
//!
//! # Responsibility
//! - Map each entity kind to its `MIR:` prefix and backing table.
//! - Format and parse `MIR:<prefix><sequence>` identifiers.
//!
//! # Invariants
//! - An identifier is `MIR:` + 3-digit kind prefix + 5-digit zero-padded
//!   sequence, 12 characters in total.
//! - Sequences run from `1` to `MAX_SEQUENCE`; there is no fallback value.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const IDENTIFIER_SCHEME: &str = "MIR:";

/// Largest sequence number that fits in five digits.
pub const MAX_SEQUENCE: u32 = 99_999;

/// Identifier of a data collection (published or draft).
pub type CollectionId = String;

/// Identifier of a resource (published or draft).
pub type ResourceId = String;

/// Entity kinds that receive registry identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdKind {
    /// Published collection, `MIR:000xxxxx`.
    Collection,
    /// Published resource, `MIR:001xxxxx`.
    Resource,
    /// Draft collection in the curation pipeline, `MIR:009xxxxx`.
    DraftCollection,
    /// Draft resource. Shares the `001` prefix but counts draft rows only.
    DraftResource,
}

impl IdKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Collection => "000",
            Self::Resource | Self::DraftResource => "001",
            Self::DraftCollection => "009",
        }
    }

    /// Table whose row count drives the next sequence number.
    pub fn table(self) -> &'static str {
        match self {
            Self::Collection => "mir_datatype",
            Self::Resource => "mir_resource",
            Self::DraftCollection => "cura_datatype",
            Self::DraftResource => "cura_resource",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Resource => "resource",
            Self::DraftCollection => "draft_collection",
            Self::DraftResource => "draft_resource",
        }
    }
}

impl Display for IdKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formats `sequence` as an identifier of `kind`.
///
/// Returns `None` when the sequence is zero or exceeds [`MAX_SEQUENCE`].
pub fn format_identifier(kind: IdKind, sequence: u32) -> Option<String> {
    if sequence == 0 || sequence > MAX_SEQUENCE {
        return None;
    }
    Some(format!("{IDENTIFIER_SCHEME}{}{sequence:05}", kind.prefix()))
}

/// Splits a well-formed identifier into `(prefix, sequence)`.
pub fn parse_identifier(value: &str) -> Option<(&str, u32)> {
    let body = value.strip_prefix(IDENTIFIER_SCHEME)?;
    if body.len() != 8 || !body.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (prefix, sequence) = body.split_at(3);
    let sequence = sequence.parse::<u32>().ok()?;
    if sequence == 0 {
        return None;
    }
    Some((prefix, sequence))
}

/// Returns whether `value` is a well-formed identifier of `kind`.
pub fn is_identifier_of(kind: IdKind, value: &str) -> bool {
    parse_identifier(value).is_some_and(|(prefix, _)| prefix == kind.prefix())
}

#[cfg(test)]
mod tests {
    use super::{format_identifier, is_identifier_of, parse_identifier, IdKind};

    #[test]
    fn formats_with_kind_prefix_and_padding() {
        assert_eq!(
            format_identifier(IdKind::Collection, 1).as_deref(),
            Some("MIR:00000001")
        );
        assert_eq!(
            format_identifier(IdKind::Resource, 42).as_deref(),
            Some("MIR:00100042")
        );
        assert_eq!(
            format_identifier(IdKind::DraftCollection, 99_999).as_deref(),
            Some("MIR:00999999")
        );
    }

    #[test]
    fn rejects_out_of_range_sequences() {
        assert_eq!(format_identifier(IdKind::Collection, 0), None);
        assert_eq!(format_identifier(IdKind::Collection, 100_000), None);
    }

    #[test]
    fn parses_well_formed_identifiers_only() {
        assert_eq!(parse_identifier("MIR:00900012"), Some(("009", 12)));
        assert_eq!(parse_identifier("MIR:0090001"), None);
        assert_eq!(parse_identifier("MIR:009000x2"), None);
        assert_eq!(parse_identifier("urn:miriam:x"), None);
        assert_eq!(parse_identifier("MIR:00000000"), None);
    }

    #[test]
    fn draft_and_published_resources_share_a_prefix() {
        assert!(is_identifier_of(IdKind::DraftResource, "MIR:00100003"));
        assert!(is_identifier_of(IdKind::Resource, "MIR:00100003"));
        assert!(!is_identifier_of(IdKind::Collection, "MIR:00100003"));
    }
}
