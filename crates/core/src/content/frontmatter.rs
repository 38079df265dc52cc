//! YAML front matter.

use serde::{Deserialize, Serialize};

use crate::Error;

/// The front matter keys the site reads. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Split a document into its front matter and body.
///
/// Front matter must open on the very first line with `---` and close with a
/// line containing only `---`. A document without an opening fence, or with
/// an unterminated one, is returned whole as body.
pub fn split_front_matter(source: &str) -> Result<(FrontMatter, &str), Error> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);

    let Some(rest) = source.strip_prefix("---\n").or_else(|| source.strip_prefix("---\r\n")) else {
        return Ok((FrontMatter::default(), source));
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let front = if yaml.trim().is_empty() {
                FrontMatter::default()
            } else {
                serde_yaml::from_str(yaml).map_err(|e| Error::Content(format!("invalid front matter: {e}")))?
            };
            return Ok((front, body));
        }
        offset += line.len();
    }

    Ok((FrontMatter::default(), source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_with_front_matter() {
        let doc = "---\ntitle: Rust Basics\ndescription: Start here\norder: 2\n---\n# Body\n";
        let (front, body) = split_front_matter(doc).unwrap();
        assert_eq!(front.title.as_deref(), Some("Rust Basics"));
        assert_eq!(front.description.as_deref(), Some("Start here"));
        assert_eq!(body, "# Body\n");
    }

    #[test]
    fn test_split_without_front_matter() {
        let doc = "# Just markdown\n";
        let (front, body) = split_front_matter(doc).unwrap();
        assert_eq!(front, FrontMatter::default());
        assert_eq!(body, doc);
    }

    #[test]
    fn test_split_unterminated_is_body() {
        let doc = "---\ntitle: Oops\n# Body\n";
        let (front, body) = split_front_matter(doc).unwrap();
        assert!(front.title.is_none());
        assert_eq!(body, doc);
    }

    #[test]
    fn test_split_crlf() {
        let doc = "---\r\ntitle: Windows\r\n---\r\nbody";
        let (front, body) = split_front_matter(doc).unwrap();
        assert_eq!(front.title.as_deref(), Some("Windows"));
        assert_eq!(body, "body");
    }

    #[test]
    fn test_split_invalid_yaml() {
        let doc = "---\ntitle: [unclosed\n---\nbody";
        assert!(matches!(split_front_matter(doc), Err(Error::Content(_))));
    }
}
