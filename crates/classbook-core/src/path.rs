//! Path resolution
//!
//! Paths are `/`-delimited strings such as `grades/2025_2026/winter/math/u1`.
//! Each segment addresses one level of nesting in the document tree.
//! Empty segments are dropped, so leading, trailing, and doubled slashes are
//! harmless, and the empty string addresses the root.

/// Split a path into its non-empty segments.
pub fn parse(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

/// Join segments into a path string.
///
/// Segments are trimmed of surrounding slashes so joining `["a/", "/b"]`
/// yields `a/b`. Empty segments are skipped.
pub fn join<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .filter_map(|segment| {
            let trimmed = segment.as_ref().trim_matches('/');
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Build a path from a list of segments.
///
/// ```
/// use classbook_core::tree_path;
/// assert_eq!(tree_path!["grades", "2025_2026", "winter"], "grades/2025_2026/winter");
/// ```
#[macro_export]
macro_rules! tree_path {
    ($($segment:expr),* $(,)?) => {
        $crate::path::join([$(::std::convert::AsRef::<str>::as_ref(&$segment)),*])
    };
}
