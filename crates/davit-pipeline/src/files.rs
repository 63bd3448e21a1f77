//! Download-directory enumeration.

use std::path::Path;

use davit_torrent_core::TorrentFileInfo;
use walkdir::WalkDir;

/// Recursively list the files under a job's download directory, with paths
/// relative to it. Sorted by path so callback payloads are stable.
#[must_use]
pub fn collect_files(root: &Path) -> Vec<TorrentFileInfo> {
    let mut files: Vec<TorrentFileInfo> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let size_bytes = entry.metadata().ok()?.len();
            let path = entry
                .path()
                .strip_prefix(root)
                .ok()?
                .to_string_lossy()
                .replace('\\', "/");
            Some(TorrentFileInfo { path, size_bytes })
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn walks_nested_directories_with_relative_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("season-1")).expect("mkdir");
        fs::write(dir.path().join("readme.txt"), b"hi").expect("write");
        fs::write(dir.path().join("season-1/episode-1.mkv"), b"abcdef").expect("write");

        let files = collect_files(dir.path());
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "readme.txt");
        assert_eq!(files[0].size_bytes, 2);
        assert_eq!(files[1].path, "season-1/episode-1.mkv");
        assert_eq!(files[1].size_bytes, 6);
    }

    #[test]
    fn missing_directory_yields_an_empty_listing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let files = collect_files(&dir.path().join("nope"));
        assert!(files.is_empty());
    }
}
