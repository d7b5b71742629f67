//! Resolved filesystem entries.

use crate::provider::FileType;

/// What a path resolved to. Built fresh by every lookup; entries hold paths,
/// never references to parents or children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// The container or share itself.
    Root,
    /// A remotely confirmed directory: a share directory, or a blob prefix
    /// with at least one blob beneath it.
    Directory { path: String },
    /// A blob or share file.
    File {
        path: String,
        size: Option<u64>,
        content_type: Option<String>,
    },
    /// A blob directory created by `create_directory` that has no blob
    /// beneath it yet. Tracked only in memory.
    VirtualDirectory { path: String },
}

impl Entry {
    /// Relative path inside the root (`""` for the root).
    pub fn path(&self) -> &str {
        match self {
            Entry::Root => "",
            Entry::Directory { path }
            | Entry::File { path, .. }
            | Entry::VirtualDirectory { path } => path,
        }
    }

    pub fn file_type(&self) -> FileType {
        match self {
            Entry::File { .. } => FileType::File,
            Entry::Root | Entry::Directory { .. } | Entry::VirtualDirectory { .. } => {
                FileType::Directory
            }
        }
    }

    pub fn is_directory(&self) -> bool {
        self.file_type().is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(Entry::Root.is_directory());
        assert!(Entry::VirtualDirectory { path: "x".into() }.is_directory());
        let file = Entry::File {
            path: "a/b.txt".into(),
            size: Some(3),
            content_type: None,
        };
        assert!(file.file_type().is_file());
        assert_eq!(file.path(), "a/b.txt");
        assert_eq!(Entry::Root.path(), "");
    }
}
