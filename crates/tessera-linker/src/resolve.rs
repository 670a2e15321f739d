//! Import specifier resolution
//!
//! Specifiers are joined against the importing module's directory with plain
//! relative-path semantics. No filesystem access happens here: `..` and `.`
//! are folded lexically so two spellings of the same file share one key.

use std::path::{Component, Path, PathBuf};

use crate::error::{LinkError, ResolutionFailure};

/// Identifier given to code supplied directly as a string.
pub const RAW_STRING_IDENTIFIER: &str = "<script>";

/// Resolve `specifier` relative to the module identified by `referrer`.
pub fn resolve(specifier: &str, referrer: &str) -> Result<PathBuf, LinkError> {
    if referrer == RAW_STRING_IDENTIFIER {
        return Err(LinkError::resolution(
            referrer,
            specifier,
            ResolutionFailure::RawStringReferrer,
        ));
    }

    let referrer_path = absolutize(Path::new(referrer));
    let base = referrer_path.parent().unwrap_or(Path::new("/"));
    Ok(normalize(&base.join(specifier)))
}

/// Make `path` absolute against the working directory, without touching the
/// filesystem beyond that.
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize(path);
    }
    match std::path::absolute(path) {
        Ok(abs) => normalize(&abs),
        Err(_) => normalize(&Path::new("/").join(path)),
    }
}

/// Fold `.` and `..` components. `..` at the root stays at the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}
