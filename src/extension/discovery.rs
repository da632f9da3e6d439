use super::ExtensionId;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Folder holding extension manifests, relative to the extension root
pub const DEFAULT_FOLDER: &str = "exts";
/// Stripped from the extension root if the folder name does not appear in it
const ENTRY_POINT: &str = "config.toml";
const SUFFIX: &str = ".toml";

/// Turn `<base>/exts/sub/name.toml` into `exts.sub.name`.
///
/// `path` must start with `base`; anything else gives a meaningless identifier.
pub fn extension_id(path: &str, base: &str) -> ExtensionId {
    let relative = path.strip_prefix(base).unwrap_or(path);
    let relative = relative.strip_suffix(SUFFIX).unwrap_or(relative);
    ExtensionId::new(relative.replace(['/', '\\'], "."))
}

/// Where extension manifests live on disk
#[derive(Clone, Debug)]
pub struct ExtensionDir {
    /// Always ends in `/`
    base: String,
    folder: String,
}

impl ExtensionDir {
    /// Derive the base directory from `root`.
    ///
    /// `root` may be the base itself, a path inside `folder`, or the entry point file next to
    /// `folder`.
    pub fn locate(root: &Path, folder: &str) -> Self {
        let components: Vec<Component> = root.components().collect();

        let base: PathBuf = if root.join(folder).is_dir() {
            root.to_path_buf()
        } else if let Some(idx) = components.iter().rposition(|c| c.as_os_str() == folder) {
            components[..idx].iter().collect()
        } else if root.file_name().is_some_and(|name| name == ENTRY_POINT) {
            root.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            root.to_path_buf()
        };

        let mut base = base.to_string_lossy().replace('\\', "/");
        if base.is_empty() {
            base.push('.');
        }
        if !base.ends_with('/') {
            base.push('/');
        }

        Self {
            base,
            folder: folder.to_owned(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Identifiers of every manifest under the folder, depth first with siblings sorted by name.
    ///
    /// A missing folder yields nothing.
    pub fn discover(&self) -> Vec<ExtensionId> {
        WalkDir::new(format!("{}{}", self.base, self.folder))
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let path = e.path().to_string_lossy().replace('\\', "/");
                path.ends_with(SUFFIX)
                    .then(|| extension_id(&path, &self.base))
            })
            .collect()
    }

    /// Inverse of [`extension_id`]
    pub fn manifest_path(&self, id: &ExtensionId) -> PathBuf {
        PathBuf::from(format!(
            "{}{}{}",
            self.base,
            id.as_str().replace('.', "/"),
            SUFFIX
        ))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::BTreeSet, fs};
    use tempfile::tempdir;

    fn discover(root: &Path, folder: &str) -> Vec<ExtensionId> {
        ExtensionDir::locate(root, folder).discover()
    }

    fn ids(list: Vec<ExtensionId>) -> BTreeSet<String> {
        list.into_iter().map(|id| id.as_str().to_owned()).collect()
    }

    fn create_tree(root: &Path) {
        fs::create_dir_all(root.join("exts/sub")).unwrap();
        fs::write(root.join("exts/a.toml"), "").unwrap();
        fs::write(root.join("exts/sub/b.toml"), "").unwrap();
        // Not manifests
        fs::write(root.join("exts/notes.md"), "").unwrap();
        fs::write(root.join("top.toml"), "").unwrap();
    }

    #[test]
    fn identifier_from_path() {
        let id = extension_id("/srv/bot/exts/sub/b.toml", "/srv/bot/");
        assert_eq!(id.as_str(), "exts.sub.b");
    }

    #[test]
    fn identifier_from_windows_path() {
        let id = extension_id("C:\\bot\\exts\\a.toml", "C:\\bot\\");
        assert_eq!(id.as_str(), "exts.a");
    }

    #[test]
    fn identifiers_have_no_separators_or_suffix() {
        let base = "/home/user/oscbot/";
        for rel in ["exts/a.toml", "exts/x/y/z.toml", "exts/with-dash.toml", "exts/sub/"] {
            let id = extension_id(&format!("{}{}", base, rel), base);
            assert!(!id.as_str().contains('/'), "{}", id);
            assert!(!id.as_str().contains('\\'), "{}", id);
            assert!(!id.as_str().ends_with(".toml"), "{}", id);
        }
    }

    #[test]
    fn discovers_nested_manifests() {
        let temp = tempdir().unwrap();
        create_tree(temp.path());

        let found = discover(temp.path(), DEFAULT_FOLDER);
        assert_eq!(
            ids(found),
            BTreeSet::from(["exts.a".to_owned(), "exts.sub.b".to_owned()])
        );
    }

    #[test]
    fn discovery_is_stable() {
        let temp = tempdir().unwrap();
        create_tree(temp.path());

        let first = discover(temp.path(), DEFAULT_FOLDER);
        let second = discover(temp.path(), DEFAULT_FOLDER);
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![ExtensionId::new("exts.a"), ExtensionId::new("exts.sub.b")]
        );
    }

    #[test]
    fn root_inside_folder() {
        let temp = tempdir().unwrap();
        create_tree(temp.path());

        let found = discover(&temp.path().join("exts/sub"), DEFAULT_FOLDER);
        assert_eq!(ids(found).len(), 2);
    }

    #[test]
    fn root_is_entry_point_file() {
        let temp = tempdir().unwrap();
        create_tree(temp.path());

        let found = discover(&temp.path().join(ENTRY_POINT), DEFAULT_FOLDER);
        assert_eq!(ids(found).len(), 2);
    }

    #[test]
    fn parent_sharing_folder_name() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("exts/bot");
        create_tree(&root);

        let found = discover(&root, DEFAULT_FOLDER);
        assert_eq!(
            ids(found),
            BTreeSet::from(["exts.a".to_owned(), "exts.sub.b".to_owned()])
        );
    }

    #[test]
    fn missing_folder_is_empty() {
        let temp = tempdir().unwrap();
        assert!(discover(temp.path(), DEFAULT_FOLDER).is_empty());
    }

    #[test]
    fn manifest_path_round_trip() {
        let dir = ExtensionDir::locate(Path::new("/srv/bot"), DEFAULT_FOLDER);
        assert_eq!(dir.base(), "/srv/bot/");
        let id = extension_id("/srv/bot/exts/sub/b.toml", dir.base());
        assert_eq!(
            dir.manifest_path(&id),
            PathBuf::from("/srv/bot/exts/sub/b.toml")
        );
    }
}
