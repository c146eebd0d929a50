use std::fmt;

use serde::{Deserialize, Serialize};

pub const IDENTITY_DELIMITER: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkIdentity {
    pub document_id: String,
    pub page_number: u32,
    pub paragraph_number: u32,
    pub chunk_index: u32,
}

impl ChunkIdentity {
    pub fn new(
        document_id: impl Into<String>,
        page_number: u32,
        paragraph_number: u32,
        chunk_index: u32,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            page_number,
            paragraph_number,
            chunk_index,
        }
    }

    /// Parses a full four-field identity. The numeric fields are taken from the
    /// right so a document path that itself contains `:` still round-trips.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut fields = raw.rsplitn(4, IDENTITY_DELIMITER);
        let chunk_index = fields.next()?.trim().parse::<u32>().ok()?;
        let paragraph_number = fields.next()?.trim().parse::<u32>().ok()?;
        let page_number = fields.next()?.trim().parse::<u32>().ok()?;
        let document_id = fields.next()?;
        if document_id.is_empty() {
            return None;
        }

        Some(Self {
            document_id: document_id.to_string(),
            page_number,
            paragraph_number,
            chunk_index,
        })
    }

    pub fn paragraph_id(&self) -> String {
        format!(
            "{}{IDENTITY_DELIMITER}{}{IDENTITY_DELIMITER}{}",
            self.document_id, self.page_number, self.paragraph_number
        )
    }
}

impl fmt::Display for ChunkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{IDENTITY_DELIMITER}{}",
            self.paragraph_id(),
            self.chunk_index
        )
    }
}

pub fn split_identity(raw: &str) -> Vec<&str> {
    let reversed = raw.rsplitn(4, IDENTITY_DELIMITER).collect::<Vec<&str>>();
    let trailing_numeric = reversed.len() == 4
        && reversed[..3]
            .iter()
            .all(|field| !field.is_empty() && field.chars().all(|ch| ch.is_ascii_digit()));

    if trailing_numeric {
        return reversed.into_iter().rev().collect();
    }

    raw.split(IDENTITY_DELIMITER).collect()
}

pub fn document_filename(document_id: &str) -> &str {
    document_id
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(document_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_round_trip_all_fields() {
        let identity = ChunkIdentity::new("data/monopoly.pdf", 6, 2, 1);
        let serialized = identity.to_string();

        assert_eq!(serialized, "data/monopoly.pdf:6:2:1");
        assert_eq!(ChunkIdentity::parse(&serialized), Some(identity));
    }

    #[test]
    fn parse_keeps_colons_inside_document_path() {
        let identity = ChunkIdentity::new("C:/docs/report.pdf", 12, 3, 4);
        let parsed = ChunkIdentity::parse(&identity.to_string());

        assert_eq!(parsed, Some(identity));
    }

    #[test]
    fn parse_rejects_partial_or_non_numeric_identities() {
        assert_eq!(ChunkIdentity::parse("data/a.pdf:3:1"), None);
        assert_eq!(ChunkIdentity::parse("data/a.pdf:x:1:1"), None);
        assert_eq!(ChunkIdentity::parse(":1:1:1"), None);
        assert_eq!(ChunkIdentity::parse(""), None);
    }

    #[test]
    fn ordering_compares_numeric_fields_as_integers() {
        let mut identities = vec![
            ChunkIdentity::new("data/a.pdf", 10, 1, 1),
            ChunkIdentity::new("data/a.pdf", 2, 11, 1),
            ChunkIdentity::new("data/a.pdf", 2, 9, 2),
            ChunkIdentity::new("data/a.pdf", 2, 9, 10),
        ];
        identities.sort();

        let rendered = identities
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<String>>();
        assert_eq!(
            rendered,
            vec![
                "data/a.pdf:2:9:2",
                "data/a.pdf:2:9:10",
                "data/a.pdf:2:11:1",
                "data/a.pdf:10:1:1",
            ]
        );
    }

    #[test]
    fn split_identity_degrades_to_fewer_fields() {
        assert_eq!(split_identity("data/a.pdf:4:2:1"), vec!["data/a.pdf", "4", "2", "1"]);
        assert_eq!(split_identity("data/a.pdf:4:2"), vec!["data/a.pdf", "4", "2"]);
        assert_eq!(split_identity("data/a.pdf:4"), vec!["data/a.pdf", "4"]);
        assert_eq!(split_identity("data/a.pdf"), vec!["data/a.pdf"]);
        assert_eq!(
            split_identity("C:/x/a.pdf:4:2:1"),
            vec!["C:/x/a.pdf", "4", "2", "1"]
        );
    }

    #[test]
    fn document_filename_takes_last_path_segment() {
        assert_eq!(document_filename("data/sub/report.pdf"), "report.pdf");
        assert_eq!(document_filename("report.pdf"), "report.pdf");
        assert_eq!(document_filename("data\\report.pdf"), "report.pdf");
    }
}
