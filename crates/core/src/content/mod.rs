//! Markdown content tree utilities.
//!
//! The tutorial content lives on disk as `{language}/{track?}/{slug}.md`,
//! optionally with a `Table_Of_Contents.md` per directory. This module reads
//! that tree to build the search index, the table of contents and the list
//! of URLs to pre-cache.

pub mod frontmatter;
pub mod precache;
pub mod search;
pub mod toc;

pub use frontmatter::{FrontMatter, split_front_matter};
pub use precache::precache_paths;
pub use search::{DEFAULT_LIMIT, SearchHit, SearchIndex, SearchIndexEntry, build_index, load_index, write_index};
pub use toc::{Section, TOC_FILE_NAME, TocDocument, load_toc, parse_toc, section_slug};
