//! Reading the package title from its entry document.

use crate::constants::ENTRY_DOCUMENT;
use crate::error::PipelineError;
use std::fs;
use std::path::Path;

const TITLE_OPEN: &str = "<title>";
const TITLE_CLOSE: &str = "</title>";

/// Reverse the entity escaping applied to titles by the packager.
///
/// Only five entities are recognized; `&amp;` is handled last so that
/// `&amp;lt;` becomes `&lt;` rather than `<`.
pub fn unescape_html(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Raw text of the first `<title>...</title>` on a single line.
///
/// The match is greedy within the line: it runs to the last `</title>`
/// on the line containing the opening tag.
pub fn find_title(document: &str) -> Option<&str> {
    for line in document.lines() {
        let mut search_from = 0;
        while let Some(offset) = line[search_from..].find(TITLE_OPEN) {
            let start = search_from + offset + TITLE_OPEN.len();
            if let Some(end) = line[start..].rfind(TITLE_CLOSE) {
                return Some(&line[start..start + end]);
            }
            search_from = start;
        }
    }
    None
}

/// Human-readable title of the package in `dir`.
pub fn project_title(dir: &Path) -> Result<String, PipelineError> {
    let path = dir.join(ENTRY_DOCUMENT);
    let contents = fs::read_to_string(&path)
        .map_err(|e| PipelineError::io(format!("reading {}", path.display()), e))?;
    find_title(&contents)
        .map(unescape_html)
        .ok_or(PipelineError::TitleNotFound { document: path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn unescapes_known_entities() {
        assert_eq!(
            unescape_html("&quot;Tom&apos;s&quot; &lt;Game&gt; &amp; more"),
            "\"Tom's\" <Game> & more"
        );
    }

    #[test]
    fn unescape_does_not_double_decode() {
        assert_eq!(unescape_html("&amp;lt;"), "&lt;");
    }

    #[test]
    fn unescape_leaves_unknown_entities() {
        assert_eq!(unescape_html("&nbsp;&#39;"), "&nbsp;&#39;");
    }

    #[test]
    fn finds_title() {
        let html = "<!DOCTYPE html>\n<html><head><title>Demo App</title></head>\n</html>";
        assert_eq!(find_title(html), Some("Demo App"));
    }

    #[test]
    fn title_match_is_greedy_within_line() {
        let html = "<title>A</title><title>B</title>";
        assert_eq!(find_title(html), Some("A</title><title>B"));
    }

    #[test]
    fn title_must_be_on_one_line() {
        let html = "<title>Split\nTitle</title>\n<title>Second</title>";
        assert_eq!(find_title(html), Some("Second"));
    }

    #[test]
    fn empty_title_is_found() {
        assert_eq!(find_title("<title></title>"), Some(""));
    }

    #[test]
    fn missing_title() {
        assert_eq!(find_title("<html><head></head></html>"), None);
    }

    #[test]
    fn project_title_reads_and_unescapes() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("index.html"),
            "<html><head><title>Cats &amp; Dogs</title></head></html>",
        )
        .unwrap();

        assert_eq!(project_title(dir.path()).unwrap(), "Cats & Dogs");
    }

    #[test]
    fn project_title_reports_missing_tag() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();

        let err = project_title(dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::TitleNotFound { .. }));
    }
}
