//! Fixtures for search results and on-disk module indexes.

use std::path::{Path, PathBuf};

use semver::Version;

use crate::core::{DependencyGroup, ModuleIdentity, ModuleSearchMetadata};
use crate::sources::index::manifest_path;

/// Search metadata with just a name and version.
pub fn meta(name: &str, version: &str) -> ModuleSearchMetadata {
    ModuleSearchMetadata::new(ModuleIdentity::parse(name, version).unwrap())
}

/// Write one release manifest into the index at `root`.
pub fn write_index_manifest(
    root: &Path,
    name: &str,
    version: &str,
    description: &str,
    tags: &[&str],
) -> PathBuf {
    write_index_manifest_with_groups(root, name, version, description, tags, &[])
}

/// Write one release manifest, dependency groups included.
pub fn write_index_manifest_with_groups(
    root: &Path,
    name: &str,
    version: &str,
    description: &str,
    tags: &[&str],
    groups: &[DependencyGroup],
) -> PathBuf {
    let parsed = Version::parse(version).unwrap();
    let path = manifest_path(root, name, &parsed);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();

    let tags = tags
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let mut content = format!(
        "[module]\nname = \"{name}\"\nversion = \"{version}\"\ndescription = \"{description}\"\ntags = [{tags}]\n"
    );

    for group in groups {
        let deps = group
            .dependencies
            .iter()
            .map(|d| format!("{{ name = \"{}\", version = \"{}\" }}", d.name, d.version_req))
            .collect::<Vec<_>>()
            .join(", ");
        content.push_str(&format!(
            "\n[[groups]]\nframework = \"{}\"\ndependencies = [{}]\n",
            group.framework, deps
        ));
    }

    std::fs::write(&path, content).unwrap();
    path
}
