//! Archive builder (C6). See spec.md §4.6.
//!
//! Assembles a brotli-compressed tar of a set of project-relative files,
//! returning the content hash of the compressed output. Grounded in the
//! `tar::Builder` usage pattern seen across the retrieval pack and the
//! `brotli` crate dependency used for the same purpose elsewhere in it.

use crate::fsops::hash_file;
use std::io::{self, Write};
use std::path::Path;

/// Normalised per spec.md §4.6 "archive metadata... normalised to constants".
const NORMALISED_MTIME: u64 = 0;
const NORMALISED_UID: u64 = 0;
const NORMALISED_GID: u64 = 0;

/// Writes a brotli-compressed tar containing exactly `rel_paths`, rooted at
/// `root_dir`, to `out_path`. Entries are added in the given order with
/// their relative path as the tar entry name. Returns the content hash of
/// the compressed archive bytes.
pub fn build_tar(out_path: &Path, root_dir: &Path, rel_paths: &[String]) -> io::Result<String> {
    let out_file = std::fs::File::create(out_path)?;
    let compressor = brotli::CompressorWriter::new(out_file, 4096, 9, 22);
    let mut builder = tar::Builder::new(compressor);

    for rel in rel_paths {
        let abs = root_dir.join(rel);
        let mut header = tar::Header::new_gnu();
        let meta = std::fs::metadata(&abs)?;
        header.set_size(meta.len());
        header.set_mtime(NORMALISED_MTIME);
        header.set_uid(NORMALISED_UID);
        header.set_gid(NORMALISED_GID);
        header.set_mode(0o644);
        header.set_cksum();
        let mut file = std::fs::File::open(&abs)?;
        builder.append_data(&mut header, rel, &mut file)?;
    }
    let mut compressor = builder.into_inner()?;
    compressor.flush()?;
    compressor.into_inner().sync_all()?;

    hash_file(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsops::{temp_dir, write_file};

    #[test]
    fn build_tar_is_deterministic_for_fixed_input() {
        let root = temp_dir().unwrap();
        write_file(&root.join("a.txt"), b"hello", false).unwrap();
        write_file(&root.join("b.txt"), b"world", false).unwrap();
        let rel_paths = vec!["a.txt".to_string(), "b.txt".to_string()];

        let out1 = root.join("archive1.tar.br");
        let out2 = root.join("archive2.tar.br");
        let hash1 = build_tar(&out1, &root, &rel_paths).unwrap();
        let hash2 = build_tar(&out2, &root, &rel_paths).unwrap();
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn build_tar_hash_changes_with_content() {
        let root = temp_dir().unwrap();
        write_file(&root.join("a.txt"), b"hello", false).unwrap();
        let rel_paths = vec!["a.txt".to_string()];
        let out1 = root.join("archive1.tar.br");
        let hash1 = build_tar(&out1, &root, &rel_paths).unwrap();

        write_file(&root.join("a.txt"), b"goodbye", false).unwrap();
        let out2 = root.join("archive2.tar.br");
        let hash2 = build_tar(&out2, &root, &rel_paths).unwrap();
        assert_ne!(hash1, hash2);
    }
}
