//! Virtual URI parsing.
//!
//! Host URIs look like `azurestorage://account/Blob Containers/container/dir/file`
//! (the marker segment may also sit deeper, after a tree path such as
//! `/subscriptions/.../storageAccounts/account`). The fixed marker segment is the
//! boundary between "where roots live" and "the path inside a root": the
//! segment right after it names the container or share, everything after that
//! is the relative path.
//!
//! Parsing is pure and total. Input without a marker yields an empty root name
//! and an empty relative path, which later fails root resolution.

use percent_encoding::percent_decode_str;
use url::Url;

use crate::config::FsConfig;

/// Marker segment delimiting the root from the relative path.
///
/// The segment strings are part of the host's URI scheme and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RootMarker {
    /// `Blob Containers`: roots are blob containers.
    BlobContainers,
    /// `File Shares`: roots are file shares.
    FileShares,
}

impl RootMarker {
    /// The literal path segment.
    pub const fn segment(self) -> &'static str {
        match self {
            RootMarker::BlobContainers => "Blob Containers",
            RootMarker::FileShares => "File Shares",
        }
    }
}

/// Identity of one container or share: the cache key for resolved roots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootIdentity {
    /// Account portion: URI authority plus any tree path before the marker.
    pub account: String,
    /// Which kind of root this is.
    pub marker: RootMarker,
    /// Container or share name. Empty when the URI had no root segment.
    pub name: String,
}

impl RootIdentity {
    /// Path of the root node in the host's account tree, e.g.
    /// `account/Blob Containers/container`.
    pub fn root_path(&self) -> String {
        if self.account.is_empty() {
            format!("{}/{}", self.marker.segment(), self.name)
        } else {
            format!("{}/{}/{}", self.account, self.marker.segment(), self.name)
        }
    }
}

/// Structured form of a virtual URI. Produced per call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    /// Root the path lives in.
    pub root: RootIdentity,
    /// Segments between the root and the target, outermost first.
    pub parent_path: Vec<String>,
    /// Final segment. Empty means the root itself.
    pub base_name: String,
}

impl ParsedPath {
    /// True when the path addresses the container/share itself.
    pub fn is_root(&self) -> bool {
        self.base_name.is_empty()
    }

    /// Relative path inside the root, `/`-joined, no leading or trailing `/`.
    pub fn relative_path(&self) -> String {
        join(self.parent_path.iter().map(String::as_str).chain(non_empty(&self.base_name)))
    }

    /// Relative path of the parent directory (empty for direct children of the root).
    pub fn parent_dir(&self) -> String {
        join(self.parent_path.iter().map(String::as_str))
    }

    /// Every segment from the root down to the target.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.parent_path
            .iter()
            .map(String::as_str)
            .chain(non_empty(&self.base_name))
    }

    /// The path of the parent directory as its own [`ParsedPath`].
    pub fn parent(&self) -> ParsedPath {
        let mut parent_path = self.parent_path.clone();
        let base_name = parent_path.pop().unwrap_or_default();
        ParsedPath {
            root: self.root.clone(),
            parent_path,
            base_name,
        }
    }

    /// Whether this is a speculative host probe (workspace config files and the like).
    pub fn is_probe(&self, config: &FsConfig) -> bool {
        let relative = self.relative_path();
        config.probe_paths.iter().any(|p| *p == relative)
            || config.probe_root_names.iter().any(|n| *n == self.root.name)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn join<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    segments.collect::<Vec<_>>().join("/")
}

/// Parse a virtual URI (or a bare path) against `marker`.
///
/// URIs must be percent-encoded: a raw `#` or `?` starts the fragment or
/// query and trailing spaces are trimmed by the URL parser. Segments are
/// decoded after splitting on `/`, so `%23`, `%3F` and `%20` come back as
/// `#`, `?` and ` `.
pub fn parse(uri: &str, marker: RootMarker) -> ParsedPath {
    let (authority, decoded) = split_uri(uri);
    let segments: Vec<&str> = decoded
        .iter()
        .map(String::as_str)
        .filter(|s| !s.is_empty())
        .collect();

    let Some(marker_at) = segments.iter().position(|s| *s == marker.segment()) else {
        return ParsedPath {
            root: RootIdentity {
                account: authority,
                marker,
                name: String::new(),
            },
            parent_path: Vec::new(),
            base_name: String::new(),
        };
    };

    let account = std::iter::once(authority.as_str())
        .filter(|a| !a.is_empty())
        .chain(segments[..marker_at].iter().copied())
        .collect::<Vec<_>>()
        .join("/");

    let name = segments.get(marker_at + 1).copied().unwrap_or_default();
    let mut rest: Vec<String> = segments
        .iter()
        .skip(marker_at + 2)
        .map(|s| s.to_string())
        .collect();
    let base_name = rest.pop().unwrap_or_default();

    ParsedPath {
        root: RootIdentity {
            account,
            marker,
            name: name.to_string(),
        },
        parent_path: rest,
        base_name,
    }
}

/// Split into (authority, path segments). URI segments are decoded one by
/// one so an encoded `/` stays inside its segment. Inputs that are not
/// absolute URIs are treated as bare paths.
fn split_uri(uri: &str) -> (String, Vec<String>) {
    match Url::parse(uri) {
        Ok(url) if !url.cannot_be_a_base() => {
            let authority = url.host_str().unwrap_or_default().to_string();
            let segments = url
                .path()
                .split('/')
                .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
                .collect();
            (authority, segments)
        }
        _ => (String::new(), uri.split('/').map(str::to_string).collect()),
    }
}
