//! Search index generation and fuzzy lookup.
//!
//! The index is a flat JSON array built by a batch job that walks the
//! content tree; at request time it is only read.

use std::path::Path;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use super::frontmatter::split_front_matter;
use super::toc::TOC_FILE_NAME;
use crate::Error;

/// Default number of hits returned by [`SearchIndex::search`].
pub const DEFAULT_LIMIT: usize = 5;

/// Score added to title matches so they rank above body matches.
const TITLE_BONUS: i64 = 25;

/// One tutorial document in the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SearchIndexEntry {
    pub title: String,
    pub content: String,
    pub url: String,
    pub lang: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Walk `content_dir` and build one entry per markdown document.
///
/// `Table_Of_Contents.md` files and markdown files directly under the root
/// (no language directory) are skipped. Output order follows file names.
pub fn build_index(content_dir: &Path, route_prefix: &str, snippet_len: usize) -> Result<Vec<SearchIndexEntry>, Error> {
    let mut entries = Vec::new();

    for entry in WalkDir::new(content_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Content(format!("failed to walk {}: {e}", content_dir.display())))?;
        let path = entry.path();

        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "md") {
            continue;
        }
        if entry.file_name() == TOC_FILE_NAME {
            continue;
        }

        let Ok(relative) = path.strip_prefix(content_dir) else {
            continue;
        };
        let parts: Vec<String> = relative
            .with_extension("")
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        let [lang, slug_parts @ ..] = parts.as_slice() else {
            continue;
        };
        let Some(last) = slug_parts.last() else {
            tracing::debug!(path = %path.display(), "skipping markdown outside a language directory");
            continue;
        };

        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Content(format!("failed to read {}: {e}", path.display())))?;
        let (front, body) = split_front_matter(&source)?;

        entries.push(SearchIndexEntry {
            title: front.title.unwrap_or_else(|| title_from_slug(last)),
            content: snippet(body, snippet_len),
            url: format!("{}/{}/{}", route_prefix.trim_end_matches('/'), lang, slug_parts.join("/")),
            lang: lang.clone(),
            kind: "Tutorial".to_string(),
        });
    }

    tracing::info!(count = entries.len(), dir = %content_dir.display(), "built search index");
    Ok(entries)
}

/// Write the index as pretty-printed JSON, creating parent directories.
pub fn write_index(path: &Path, entries: &[SearchIndexEntry]) -> Result<(), Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::Content(format!("failed to create {}: {e}", parent.display())))?;
    }
    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| Error::Content(format!("failed to serialize search index: {e}")))?;
    std::fs::write(path, json).map_err(|e| Error::Content(format!("failed to write {}: {e}", path.display())))
}

/// Read a previously written index.
pub fn load_index(path: &Path) -> Result<Vec<SearchIndexEntry>, Error> {
    let json =
        std::fs::read_to_string(path).map_err(|e| Error::Content(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&json).map_err(|e| Error::Content(format!("invalid search index {}: {e}", path.display())))
}

/// Strip `#`, `*` and backticks, collapse whitespace, keep `len` chars.
fn snippet(body: &str, len: usize) -> String {
    let stripped: String = body.chars().filter(|c| !matches!(c, '#' | '*' | '`')).collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out: String = collapsed.chars().take(len).collect();
    out.push_str("...");
    out
}

/// `"getting-started"` -> `"Getting Started"`.
fn title_from_slug(slug: &str) -> String {
    let mut out = String::with_capacity(slug.len());
    let mut prev_is_word = false;
    for c in slug.chars() {
        let c = if c == '-' { ' ' } else { c };
        let is_word = c.is_alphanumeric() || c == '_';
        if is_word && !prev_is_word {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_is_word = is_word;
    }
    out
}

/// A search result with its match score.
#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct SearchHit {
    pub score: i64,
    #[serde(flatten)]
    pub entry: SearchIndexEntry,
}

/// Read-only fuzzy matcher over the index.
pub struct SearchIndex {
    entries: Vec<SearchIndexEntry>,
    matcher: SkimMatcherV2,
}

impl SearchIndex {
    pub fn new(entries: Vec<SearchIndexEntry>) -> Self {
        Self { entries, matcher: SkimMatcherV2::default().ignore_case() }
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        Ok(Self::new(load_index(path)?))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fuzzy-match `query` against titles and snippets.
    ///
    /// Queries shorter than two characters return nothing.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let query = query.trim();
        if query.chars().count() < 2 {
            return Vec::new();
        }

        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let title = self
                    .matcher
                    .fuzzy_match(&entry.title, query)
                    .map(|s| s + TITLE_BONUS);
                let content = self.matcher.fuzzy_match(&entry.content, query);
                let score = title.max(content)?;
                Some(SearchHit { score, entry: entry.clone() })
            })
            .collect();

        hits.sort_by(|a, b| b.score.cmp(&a.score));
        hits.truncate(limit);
        hits
    }
}
