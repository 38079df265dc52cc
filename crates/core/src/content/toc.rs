//! Table of contents documents.
//!
//! A `Table_Of_Contents.md` carries `title`/`description` front matter and a
//! body split into sections by level-2 headings.

use std::path::Path;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};

use super::frontmatter::split_front_matter;
use crate::Error;

pub const TOC_FILE_NAME: &str = "Table_Of_Contents.md";

/// One `## ` section: its heading text and the raw markdown under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Section {
    pub title: String,
    pub content: String,
}

impl Section {
    pub fn slug(&self) -> String {
        section_slug(&self.title)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TocDocument {
    pub title: Option<String>,
    pub description: Option<String>,
    pub sections: Vec<Section>,
}

/// Parse a table of contents document.
pub fn parse_toc(markdown: &str) -> Result<TocDocument, Error> {
    let (front, body) = split_front_matter(markdown)?;
    Ok(TocDocument { title: front.title, description: front.description, sections: extract_sections(body) })
}

/// Read `{content_dir}/{language}/Table_Of_Contents.md`.
pub fn load_toc(content_dir: &Path, language: &str) -> Result<TocDocument, Error> {
    if language.is_empty() || language.contains(['/', '\\']) || language == ".." {
        return Err(Error::InvalidInput(format!("invalid language: {language:?}")));
    }
    let path = content_dir.join(language).join(TOC_FILE_NAME);
    let source =
        std::fs::read_to_string(&path).map_err(|e| Error::Content(format!("failed to read {}: {e}", path.display())))?;
    parse_toc(&source)
}

/// Split markdown at level-2 headings.
///
/// Anything before the first `##` is ignored, and a heading with nothing
/// under it before the next `##` produces no section.
pub fn extract_sections(body: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<(String, usize)> = None;
    let mut heading: Option<String> = None;

    for (event, range) in Parser::new_ext(body, Options::empty()).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { level: HeadingLevel::H2, .. }) => {
                if let Some((title, start)) = current.take() {
                    push_section(&mut sections, &title, &body[start..range.start]);
                }
                heading = Some(String::new());
            }
            Event::End(TagEnd::Heading(HeadingLevel::H2)) => {
                if let Some(title) = heading.take() {
                    current = Some((title.trim().to_string(), range.end));
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some(title) = heading.as_mut() {
                    title.push_str(&text);
                }
            }
            _ => {}
        }
    }

    if let Some((title, start)) = current {
        push_section(&mut sections, &title, &body[start..]);
    }

    sections
}

fn push_section(sections: &mut Vec<Section>, title: &str, content: &str) {
    let content = content.trim();
    if !title.is_empty() && !content.is_empty() {
        sections.push(Section { title: title.to_string(), content: content.to_string() });
    }
}

/// `"Getting Started!"` -> `"getting-started"`.
pub fn section_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOC: &str = "---
title: JavaScript
description: From zero to async
---
Intro text that is not a section.

## Basics

- [Intro](/language/javascript/intro)
- [Variables](/language/javascript/variables)

## Empty

## Async `await`

Promises and friends.
";

    #[test]
    fn test_parse_toc() {
        let toc = parse_toc(TOC).unwrap();
        assert_eq!(toc.title.as_deref(), Some("JavaScript"));
        assert_eq!(toc.description.as_deref(), Some("From zero to async"));

        let titles: Vec<&str> = toc.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Basics", "Async await"]);

        assert!(toc.sections[0].content.starts_with("- [Intro]"));
        assert!(toc.sections[0].content.ends_with("(/language/javascript/variables)"));
        assert_eq!(toc.sections[1].content, "Promises and friends.");
    }

    #[test]
    fn test_no_sections_without_h2() {
        let toc = parse_toc("# Title\n\n### Deep\ntext\n").unwrap();
        assert!(toc.sections.is_empty());
        assert!(toc.title.is_none());
    }

    #[test]
    fn test_nested_headings_stay_in_section() {
        let sections = extract_sections("## Loops\n### for\nbody\n### while\nmore\n");
        assert_eq!(sections.len(), 1);
        assert!(sections[0].content.contains("### while"));
    }

    #[test]
    fn test_section_slug() {
        assert_eq!(section_slug("Getting Started!"), "getting-started");
        assert_eq!(section_slug("  Async / Await  "), "async-await");
        assert_eq!(section_slug("Basics"), "basics");
    }

    #[test]
    fn test_load_toc_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("javascript")).unwrap();
        std::fs::write(dir.path().join("javascript").join(TOC_FILE_NAME), TOC).unwrap();

        let toc = load_toc(dir.path(), "javascript").unwrap();
        assert_eq!(toc.sections.len(), 2);

        assert!(matches!(load_toc(dir.path(), "python"), Err(Error::Content(_))));
        assert!(matches!(load_toc(dir.path(), "../etc"), Err(Error::InvalidInput(_))));
    }
}
