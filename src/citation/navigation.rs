use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use super::identity::{ChunkIdentity, document_filename, split_identity};
use super::rewrite::RenumberedCitation;

const DEFAULT_LOCATION_FIELD: &str = "1";

/// Where a cited chunk lives on disk. `exists` and `size_bytes` are read at
/// resolve time and may be stale by the time the caller opens the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLocation {
    pub exists: bool,
    pub filename: String,
    pub document_path: String,
    pub absolute_path: Option<PathBuf>,
    pub page: String,
    pub paragraph: String,
    pub chunk: String,
    pub size_bytes: u64,
    pub system_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NavigationResolver {
    document_root: PathBuf,
}

impl NavigationResolver {
    pub fn new(document_root: impl Into<PathBuf>) -> Self {
        Self {
            document_root: document_root.into(),
        }
    }

    pub fn resolve(&self, identity: &str) -> ResolvedLocation {
        let fields = split_identity(identity.trim());
        let field = |index: usize| {
            fields
                .get(index)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .unwrap_or(DEFAULT_LOCATION_FIELD)
                .to_string()
        };

        let document_path = fields.first().map(|value| value.trim()).unwrap_or_default();
        let filename = document_filename(document_path).to_string();
        let page = field(1);
        let paragraph = field(2);
        let chunk = field(3);

        if filename.is_empty() {
            return ResolvedLocation {
                exists: false,
                filename,
                document_path: document_path.to_string(),
                absolute_path: None,
                page,
                paragraph,
                chunk,
                size_bytes: 0,
                system_url: None,
            };
        }

        let joined = self.document_root.join(&filename);
        let absolute_path = std::path::absolute(&joined).unwrap_or(joined);
        let metadata = fs::metadata(&absolute_path)
            .ok()
            .filter(|metadata| metadata.is_file());
        let system_url = format!("file://{}#page={page}", absolute_path.display());

        ResolvedLocation {
            exists: metadata.is_some(),
            filename,
            document_path: document_path.to_string(),
            size_bytes: metadata.map(|metadata| metadata.len()).unwrap_or(0),
            absolute_path: Some(absolute_path),
            page,
            paragraph,
            chunk,
            system_url: Some(system_url),
        }
    }

    pub fn resolve_citation(&self, citation: &RenumberedCitation) -> ResolvedLocation {
        if ChunkIdentity::parse(&citation.source_id).is_some() {
            return self.resolve(&citation.source_id);
        }

        let page = first_integer(&citation.page_reference).unwrap_or(1);
        self.resolve(&format!("{}:{page}:1:1", citation.filename))
    }
}

fn first_integer(text: &str) -> Option<u32> {
    let digits = text
        .chars()
        .skip_while(|ch| !ch.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect::<String>();
    digits.parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(source_id: &str, filename: &str, page_reference: &str) -> RenumberedCitation {
        RenumberedCitation {
            new_source_num: 1,
            original_source_num: 1,
            filename: filename.to_string(),
            page_reference: page_reference.to_string(),
            source_id: source_id.to_string(),
            relevance_score: None,
            content: String::new(),
        }
    }

    #[test]
    fn resolve_full_identity_under_document_root() {
        let root = tempfile::tempdir().expect("tempdir");
        fs::write(root.path().join("rules.pdf"), b"%PDF-1.4 test").expect("write pdf");
        let resolver = NavigationResolver::new(root.path());

        let location = resolver.resolve("data/rules.pdf:4:2:3");

        assert!(location.exists);
        assert_eq!(location.filename, "rules.pdf");
        assert_eq!(location.document_path, "data/rules.pdf");
        assert_eq!(location.page, "4");
        assert_eq!(location.paragraph, "2");
        assert_eq!(location.chunk, "3");
        assert_eq!(location.size_bytes, 13);
        assert_eq!(
            location.absolute_path.as_deref(),
            Some(root.path().join("rules.pdf").as_path())
        );
        let url = location.system_url.expect("system url");
        assert!(url.starts_with("file:///"));
        assert!(url.ends_with("rules.pdf#page=4"));
    }

    #[test]
    fn resolve_defaults_missing_trailing_fields() {
        let resolver = NavigationResolver::new("data");

        let two_fields = resolver.resolve("data/rules.pdf:7");
        assert_eq!(
            (two_fields.page.as_str(), two_fields.paragraph.as_str(), two_fields.chunk.as_str()),
            ("7", "1", "1")
        );

        let three_fields = resolver.resolve("data/rules.pdf:7:3");
        assert_eq!(
            (three_fields.page.as_str(), three_fields.paragraph.as_str(), three_fields.chunk.as_str()),
            ("7", "3", "1")
        );

        let bare = resolver.resolve("rules.pdf");
        assert_eq!(bare.page, "1");
        assert_eq!(bare.filename, "rules.pdf");
    }

    #[test]
    fn resolve_reports_missing_document() {
        let root = tempfile::tempdir().expect("tempdir");
        let resolver = NavigationResolver::new(root.path());

        let location = resolver.resolve("data/missing.pdf:1:1:1");

        assert!(!location.exists);
        assert_eq!(location.size_bytes, 0);
        assert!(location.absolute_path.is_some());
    }

    #[test]
    fn resolve_without_filename_is_best_effort() {
        let resolver = NavigationResolver::new("data");

        for identity in ["", ":3:2:1", "data/:2"] {
            let location = resolver.resolve(identity);
            assert!(!location.exists, "{identity}");
            assert_eq!(location.absolute_path, None, "{identity}");
            assert_eq!(location.system_url, None, "{identity}");
        }
    }

    #[test]
    fn resolve_does_not_treat_directories_as_documents() {
        let root = tempfile::tempdir().expect("tempdir");
        fs::create_dir(root.path().join("folder.pdf")).expect("create dir");
        let resolver = NavigationResolver::new(root.path());

        assert!(!resolver.resolve("data/folder.pdf:1:1:1").exists);
    }

    #[test]
    fn resolve_citation_uses_identity_when_available() {
        let resolver = NavigationResolver::new("data");
        let location =
            resolver.resolve_citation(&citation("data/rules.pdf:5:2:1", "rules.pdf", "5 (\u{b6}2.1)"));

        assert_eq!(location.page, "5");
        assert_eq!(location.paragraph, "2");
    }

    #[test]
    fn resolve_citation_falls_back_to_page_reference() {
        let resolver = NavigationResolver::new("data");

        let location = resolver.resolve_citation(&citation("Unknown", "rules.pdf", "page 12 (\u{b6}3)"));
        assert_eq!(location.filename, "rules.pdf");
        assert_eq!(location.page, "12");
        assert_eq!(location.paragraph, "1");

        let no_page = resolver.resolve_citation(&citation("Unknown", "rules.pdf", "N/A"));
        assert_eq!(no_page.page, "1");
    }

    #[test]
    fn first_integer_finds_leading_digits_run() {
        assert_eq!(first_integer("12 (\u{b6}3.1)"), Some(12));
        assert_eq!(first_integer("p. 7"), Some(7));
        assert_eq!(first_integer("N/A"), None);
    }
}
