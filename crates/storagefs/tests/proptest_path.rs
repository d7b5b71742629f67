//! Property-based tests for virtual URI parsing
//!
//! Verifies that parsing reconstructs the relative path it was built from,
//! with or without a trailing slash, and that percent-encoded segments decode
//! to their raw form.

use proptest::prelude::*;
use storagefs::path::parse;
use storagefs::RootMarker;

/// One path segment: no `/`, no `%`, never `.` or `..`, no trailing space.
fn segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]([a-zA-Z0-9._ -]{0,10}[a-zA-Z0-9_])?"
}

/// A segment made of characters the URL parser would cut or trim unencoded.
fn awkward_segment() -> impl Strategy<Value = String> {
    "[a-z#? %]{1,8}"
}

fn encode(segment: &str) -> String {
    segment
        .replace('%', "%25")
        .replace('#', "%23")
        .replace('?', "%3F")
        .replace(' ', "%20")
}

fn relative_path() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment(), 1..6)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// parent_path + base_name reproduces the relative path
    #[test]
    fn parse_reconstructs_relative_path(segments in relative_path(), root in segment()) {
        let rel = segments.join("/");
        let uri = format!("azurestorage://acct/Blob Containers/{root}/{rel}");
        let parsed = parse(&uri, RootMarker::BlobContainers);

        prop_assert_eq!(&parsed.root.name, &root);
        prop_assert_eq!(parsed.relative_path(), rel);
        prop_assert_eq!(&parsed.base_name, segments.last().unwrap());
        prop_assert_eq!(parsed.parent_path.len(), segments.len() - 1);
    }

    /// A trailing slash never changes the result
    #[test]
    fn trailing_slash_is_normalized(segments in relative_path()) {
        let rel = segments.join("/");
        let shares = RootMarker::FileShares;
        let with = parse(&format!("azurestorage://acct/File Shares/s/{rel}/"), shares);
        let without = parse(&format!("azurestorage://acct/File Shares/s/{rel}"), shares);
        prop_assert_eq!(with, without);
    }

    /// Bare paths and URIs agree on the relative part
    #[test]
    fn bare_path_matches_uri(segments in relative_path()) {
        let rel = segments.join("/");
        let blobs = RootMarker::BlobContainers;
        let bare = parse(&format!("/acct/Blob Containers/c/{rel}"), blobs);
        let uri = parse(&format!("azurestorage://acct/Blob Containers/c/{rel}"), blobs);
        prop_assert_eq!(bare.relative_path(), uri.relative_path());
        prop_assert_eq!(bare.root, uri.root);
    }

    /// The relative path never has empty segments
    #[test]
    fn no_empty_segments(segments in relative_path(), slashes in 1usize..4) {
        let sep = "/".repeat(slashes);
        let uri = format!("azurestorage://acct/Blob Containers/c/{}", segments.join(&sep));
        let parsed = parse(&uri, RootMarker::BlobContainers);
        prop_assert!(!parsed.relative_path().contains("//"));
        prop_assert!(!parsed.relative_path().ends_with('/'));
        prop_assert_eq!(parsed.relative_path(), segments.join("/"));
    }

    /// `%23`, `%3F`, `%20` and `%25` come back as `#`, `?`, ` ` and `%`
    #[test]
    fn encoded_segments_round_trip(segments in prop::collection::vec(awkward_segment(), 1..4)) {
        let encoded: Vec<String> = segments.iter().map(|s| encode(s)).collect();
        let uri = format!("azurestorage://acct/Blob%20Containers/c/{}", encoded.join("/"));
        let parsed = parse(&uri, RootMarker::BlobContainers);
        prop_assert_eq!(parsed.relative_path(), segments.join("/"));
        prop_assert_eq!(&parsed.base_name, segments.last().unwrap());
    }
}
