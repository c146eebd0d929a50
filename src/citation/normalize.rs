use anyhow::{Context, Result};
use regex::Regex;

const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&hellip;", "..."),
    ("&mdash;", "\u{2014}"),
    ("&ndash;", "\u{2013}"),
    ("&rsquo;", "'"),
    ("&lsquo;", "'"),
    ("&rdquo;", "\""),
    ("&ldquo;", "\""),
];

const DOCUMENT_EXTENSIONS: &[&str] = &[".pdf", ".txt", ".docx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizerOptions {
    /// Strip trailing filename and page-number artifacts left by PDF text
    /// extraction. Best effort: a legitimate trailing 3-4 digit number, or
    /// anything after a "Page N" / "p. N" mention, is removed as well.
    pub strip_filename_references: bool,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            strip_filename_references: true,
        }
    }
}

#[derive(Debug)]
pub struct ContentNormalizer {
    options: NormalizerOptions,
    tag_regex: Regex,
    whitespace_regex: Regex,
    trailing_artifact_regexes: Vec<Regex>,
}

impl ContentNormalizer {
    pub fn new(options: NormalizerOptions) -> Result<Self> {
        let tag_regex = Regex::new(r"<[^>]+>").context("failed to compile markup tag regex")?;
        let whitespace_regex =
            Regex::new(r"\s+").context("failed to compile whitespace regex")?;

        let trailing_artifact_regexes = [
            r"(?i)\s*\d{3,4}\s*$",
            r"(?i)\s*Page \d+.*$",
            r"(?i)\s*p\.\s*\d+.*$",
            r"(?i)\s*\d+/\d+\s*$",
            r"\s+$",
        ]
        .iter()
        .map(|pattern| {
            Regex::new(pattern)
                .with_context(|| format!("failed to compile trailing artifact regex {pattern}"))
        })
        .collect::<Result<Vec<Regex>>>()?;

        Ok(Self {
            options,
            tag_regex,
            whitespace_regex,
            trailing_artifact_regexes,
        })
    }

    pub fn normalize(&self, raw: &str, filename: &str) -> String {
        let cleaned = self.strip_markup(raw);
        if self.options.strip_filename_references {
            self.strip_filename_references(&cleaned, filename)
        } else {
            cleaned
        }
    }

    pub fn strip_markup(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }

        let mut text = self.tag_regex.replace_all(raw, "").into_owned();
        for (entity, replacement) in NAMED_ENTITIES {
            if text.contains(entity) {
                text = text.replace(entity, replacement);
            }
        }

        self.whitespace_regex
            .replace_all(&text, " ")
            .trim()
            .to_string()
    }

    pub fn strip_filename_references(&self, content: &str, filename: &str) -> String {
        let base_filename = DOCUMENT_EXTENSIONS
            .iter()
            .fold(filename.to_string(), |name, extension| {
                name.replace(extension, "")
            });

        let mut patterns = Vec::<String>::new();
        if !filename.trim().is_empty() {
            patterns.push(format!(r"(?i)\s*{}\s*$", regex::escape(filename)));
        }
        if !base_filename.trim().is_empty() {
            let escaped_base = regex::escape(&base_filename);
            patterns.push(format!(r"(?i)\s*{escaped_base}\s*$"));
            patterns.push(format!(r"(?i)\s*{escaped_base}\s*\d+\s*$"));
        }

        let mut cleaned = content.to_string();
        for regex in patterns
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
        {
            cleaned = regex.replace_all(&cleaned, "").into_owned();
        }
        for regex in &self.trailing_artifact_regexes {
            cleaned = regex.replace_all(&cleaned, "").into_owned();
        }

        cleaned.trim().to_string()
    }
}
