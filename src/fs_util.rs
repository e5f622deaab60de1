use std::fs;
use std::io::{self, Write};

use camino::Utf8Path;

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// `mkdir -p`; an existing directory is not an error.
pub fn create_dirs(path: &Utf8Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(path.as_std_path())
}

/// Writes `content` next to `path` in a temp file, then renames it over `path`.
/// Readers see either the old file or the complete new one.
pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> io::Result<u64> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or(Utf8Path::new("."));
    create_dirs(parent)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".filestore-mirror")
        .tempfile_in(parent.as_std_path())?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(FILE_MODE))?;
    }
    temp.persist(path.as_std_path()).map_err(|err| err.error)?;
    Ok(content.len() as u64)
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn write_creates_parents_and_replaces() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = root.join("a").join("b").join("c.yaml");

        assert_eq!(write_bytes_atomic(&path, b"first version").unwrap(), 13);
        assert_eq!(write_bytes_atomic(&path, b"second").unwrap(), 6);
        assert_eq!(fs::read(path.as_std_path()).unwrap(), b"second");

        let leftovers = fs::read_dir(root.join("a").join("b").as_std_path())
            .unwrap()
            .count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn create_dirs_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("x/y")).unwrap();
        create_dirs(&root).unwrap();
        create_dirs(&root).unwrap();
        assert!(root.as_std_path().is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn written_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("f.txt")).unwrap();
        write_bytes_atomic(&path, b"x").unwrap();
        let mode = fs::metadata(path.as_std_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, FILE_MODE);
    }
}
