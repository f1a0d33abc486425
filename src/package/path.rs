//! Archive path resolution.
//!
//! EPUB documents reference each other with relative hrefs whose base is the
//! directory of the *referencing* document, not the archive root. Packages in
//! the wild mix conventions freely, so resolution is kept deliberately
//! forgiving: `..` pops one segment, `.` and empty segments vanish, and a
//! leading `/` addresses the archive root.

/// Resolve `href` against the file that referenced it.
///
/// `base_file` is the archive path of the referencing document (a file, not a
/// directory); its final segment is dropped before joining.
///
/// ```
/// use riffle::package::path::resolve_href;
///
/// assert_eq!(
///     resolve_href("OEBPS/text/ch1.xhtml", "../images/a.png"),
///     "OEBPS/images/a.png"
/// );
/// ```
pub fn resolve_href(base_file: &str, href: &str) -> String {
    if let Some(rooted) = href.strip_prefix('/') {
        return rooted.to_string();
    }

    let mut segments: Vec<&str> = base_file.split('/').collect();
    segments.pop(); // drop the file name

    for part in href.split('/') {
        match part {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Split an href into its path and optional fragment identifier.
pub fn strip_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((path, frag)) => (path, Some(frag)),
        None => (href, None),
    }
}
