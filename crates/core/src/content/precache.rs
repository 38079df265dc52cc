//! Paths to pre-cache when a response bucket is installed.

use std::path::Path;

use crate::Error;

/// Site-relative paths to warm into a fresh bucket.
///
/// Always starts with `/`, followed by `{route_prefix}/{lang}/{slug}/` for
/// every markdown file directly inside each language directory. Nested
/// tracks are left to write-through.
pub fn precache_paths(content_dir: &Path, route_prefix: &str) -> Result<Vec<String>, Error> {
    let prefix = route_prefix.trim_end_matches('/');
    let mut paths = vec!["/".to_string()];

    let read_dir = |dir: &Path| {
        std::fs::read_dir(dir).map_err(|e| Error::Content(format!("failed to read {}: {e}", dir.display())))
    };

    let mut langs: Vec<_> = read_dir(content_dir)?
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .collect();
    langs.sort_by_key(|e| e.file_name());

    for lang in langs {
        let lang_name = lang.file_name().to_string_lossy().into_owned();
        let mut slugs: Vec<String> = read_dir(&lang.path())?
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".md").map(str::to_string)
            })
            .collect();
        slugs.sort();

        paths.extend(slugs.into_iter().map(|slug| format!("{prefix}/{lang_name}/{slug}/")));
    }

    Ok(paths)
}
