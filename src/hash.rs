//! BLAKE3 digests of bundle trees
//!
//! Used to confirm that a deployed tree carries exactly the content that was
//! staged. Only relative paths and file contents feed the digest; permission
//! bits and timestamps do not.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use blake3::Hasher;
use walkdir::WalkDir;

use crate::copier::CopyOptions;
use crate::error::{self, Result};

/// Hash prefix for BLAKE3 digests
pub const HASH_PREFIX: &str = "blake3:";

fn hash_file_into(hasher: &mut Hasher, path: &Path) -> Result<()> {
    let file = File::open(path).map_err(|e| error::fs::read_failed(path, &e))?;
    let mut reader = BufReader::new(file);
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| error::fs::read_failed(path, &e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(())
}

/// Digest of every directory and file under `root`, honouring exclusions
///
/// Entries are sorted by relative path so the result is deterministic.
pub fn hash_tree(root: &Path, options: &CopyOptions) -> Result<String> {
    if !root.is_dir() {
        return Err(error::fs::read_failed(
            root,
            &std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !options.is_excluded_under(root, e.path()));
    for entry in walker {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        entries.push((relative, entry));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Hasher::new();
    for (relative, entry) in &entries {
        if entry.file_type().is_dir() {
            hasher.update(b"d\0");
            hasher.update(relative.as_bytes());
            hasher.update(b"\0");
        } else {
            hasher.update(b"f\0");
            hasher.update(relative.as_bytes());
            hasher.update(b"\0");
            hash_file_into(&mut hasher, entry.path())?;
            hasher.update(b"\0");
        }
    }

    Ok(format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{create_temp_dir, write_file};

    #[test]
    fn test_identical_trees_have_identical_digests() {
        let a = create_temp_dir();
        let b = create_temp_dir();
        for root in [a.path(), b.path()] {
            write_file(&root.join("default/app.conf"), "[launcher]\nversion = 1\n");
            write_file(&root.join("bin/x.sh"), "echo\n");
        }
        let options = CopyOptions::default();
        let da = hash_tree(a.path(), &options).unwrap();
        assert!(da.starts_with(HASH_PREFIX));
        assert_eq!(da, hash_tree(b.path(), &options).unwrap());
    }

    #[test]
    fn test_content_and_layout_change_digest() {
        let temp = create_temp_dir();
        write_file(&temp.path().join("a.txt"), "one");
        let options = CopyOptions::default();
        let before = hash_tree(temp.path(), &options).unwrap();

        write_file(&temp.path().join("a.txt"), "two");
        let after_edit = hash_tree(temp.path(), &options).unwrap();
        assert_ne!(before, after_edit);

        std::fs::create_dir_all(temp.path().join("empty")).unwrap();
        assert_ne!(after_edit, hash_tree(temp.path(), &options).unwrap());
    }

    #[test]
    fn test_excluded_entries_do_not_count() {
        let temp = create_temp_dir();
        write_file(&temp.path().join("a.txt"), "one");
        let options = CopyOptions::new(vec![".git".to_string()]);
        let before = hash_tree(temp.path(), &options).unwrap();

        write_file(&temp.path().join(".git/HEAD"), "ref: main");
        assert_eq!(before, hash_tree(temp.path(), &options).unwrap());
    }

    #[test]
    fn test_missing_root_is_error() {
        let temp = create_temp_dir();
        assert!(hash_tree(&temp.path().join("nope"), &CopyOptions::default()).is_err());
    }
}
