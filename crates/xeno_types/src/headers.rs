//! Classification and ordering of `#include` targets.
//!
//! Headers accumulate from many places (type mappings, per-function options)
//! in whatever order registrations happen. Generated source must include them
//! in a stable, category-ordered sequence so both compilation and the content
//! hash are reproducible.

/// The interop toolkit's primary header. Always the last third-party include.
pub const TOOLKIT_HEADER: &str = "<pybind11/pybind11.h>";

const HEADER_EXTENSIONS: &[&str] = &["h", "hh", "hpp", "hxx", "h++"];

/// Headers sorted into the four include groups, in render order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderGroups {
    /// Anything not recognised as a header (inline sources, bare tokens).
    pub other: Vec<String>,
    /// Project-local headers in quoted form.
    pub local: Vec<String>,
    /// Third-party headers in angle-bracket form with an extension,
    /// terminated by [`TOOLKIT_HEADER`].
    pub third_party: Vec<String>,
    /// Standard library headers (angle brackets, no extension).
    pub stdlib: Vec<String>,
}

impl HeaderGroups {
    /// Returns the groups in render order.
    pub fn as_slices(&self) -> [&[String]; 4] {
        [&self.other, &self.local, &self.third_party, &self.stdlib]
    }

    /// Iterates over every header in render order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.as_slices()
            .into_iter()
            .flat_map(|group| group.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKind {
    Other,
    Local,
    ThirdParty,
    Stdlib,
}

fn has_header_extension(path: &str) -> bool {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && HEADER_EXTENSIONS.contains(&ext),
        None => false,
    }
}

fn classify(header: &str) -> HeaderKind {
    if let Some(inner) = header
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        if has_header_extension(inner) {
            return HeaderKind::Local;
        }
        return HeaderKind::Other;
    }
    if let Some(inner) = header
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
    {
        if inner.is_empty() {
            return HeaderKind::Other;
        }
        if has_header_extension(inner) {
            return HeaderKind::ThirdParty;
        }
        if !inner.contains('.') {
            return HeaderKind::Stdlib;
        }
    }
    HeaderKind::Other
}

fn push_unique(group: &mut Vec<String>, header: &str) {
    if !group.iter().any(|h| h == header) {
        group.push(header.to_string());
    }
}

/// Groups headers into other / local / third-party / stdlib.
///
/// Whitespace around each entry is trimmed before classification. Within a
/// group, headers keep their first-seen order and duplicates are dropped.
pub fn group_headers<S: AsRef<str>>(headers: &[S]) -> HeaderGroups {
    let mut groups = HeaderGroups::default();
    for raw in headers {
        let header = raw.as_ref().trim();
        if header.is_empty() || header == TOOLKIT_HEADER {
            continue;
        }
        let group = match classify(header) {
            HeaderKind::Other => &mut groups.other,
            HeaderKind::Local => &mut groups.local,
            HeaderKind::ThirdParty => &mut groups.third_party,
            HeaderKind::Stdlib => &mut groups.stdlib,
        };
        push_unique(group, header);
    }
    groups.third_party.push(TOOLKIT_HEADER.to_string());
    groups
}
