//! Shared helpers for the integration suites

use driftsync::vfs::VirtualFilesystem;
use std::io::{Read, Write};

/// (name, is_dir, content) triples describing a tree
pub type TreeSpec<'a> = &'a [(&'a str, bool, &'a str)];

/// Populate a filesystem from a tree description
pub fn create_files<F: VirtualFilesystem>(fs: &F, files: TreeSpec<'_>) {
    for (name, is_dir, content) in files {
        if *is_dir {
            fs.mkdir(name).unwrap();
        } else {
            let mut w = fs.open_write(name).unwrap();
            w.write_all(content.as_bytes()).unwrap();
            w.flush().unwrap();
        }
    }
}

/// Assert two trees hold the same names, kinds, and file contents
pub fn assert_trees_equal<L: VirtualFilesystem, R: VirtualFilesystem>(left: &L, right: &R) {
    let left_names = left.list_all().unwrap();
    let right_names = right.list_all().unwrap();
    assert_eq!(left_names, right_names, "trees list different names");

    for name in &left_names {
        assert_eq!(
            left.is_dir(name),
            right.is_dir(name),
            "kind mismatch for {name}"
        );
        if !left.is_dir(name) {
            let mut left_content = Vec::new();
            left.open_read(name)
                .unwrap()
                .read_to_end(&mut left_content)
                .unwrap();
            let mut right_content = Vec::new();
            right
                .open_read(name)
                .unwrap()
                .read_to_end(&mut right_content)
                .unwrap();
            assert_eq!(left_content, right_content, "content mismatch for {name}");
        }
    }
}
