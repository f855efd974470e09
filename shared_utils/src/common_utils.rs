//! Common Utilities Module
//!
//! Extension and name helpers shared by the path-based collectors and the
//! in-memory batch code, which only knows file names.

use std::path::Path;

/// Lowercased extension of a path, or an empty string.
///
/// # Examples
/// ```
/// use std::path::Path;
/// use shared_utils::common_utils::get_extension_lowercase;
///
/// assert_eq!(get_extension_lowercase(Path::new("IMG_0001.HEIC")), "heic");
/// assert_eq!(get_extension_lowercase(Path::new("noext")), "");
/// ```
pub fn get_extension_lowercase(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Case-insensitive extension check (extensions given without the dot).
///
/// # Examples
/// ```
/// use std::path::Path;
/// use shared_utils::common_utils::has_extension;
///
/// let extensions = &["heic", "heif"];
/// assert!(has_extension(Path::new("photo.HEIC"), extensions));
/// assert!(!has_extension(Path::new("photo.jpg"), extensions));
/// ```
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let ext = get_extension_lowercase(path);
    extensions.contains(&ext.as_str())
}

/// Last component of a name that may carry `/` or `\` separators.
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Lowercased extension of a bare file name.
///
/// A leading dot does not start an extension (`.heic` has none).
pub fn name_extension_lowercase(name: &str) -> String {
    let base = base_name(name);
    match base.rfind('.') {
        Some(idx) if idx > 0 => base[idx + 1..].to_lowercase(),
        _ => String::new(),
    }
}

/// Case-insensitive extension check on a bare file name.
///
/// # Examples
/// ```
/// use shared_utils::common_utils::name_has_extension;
///
/// assert!(name_has_extension("IMG_0001.HeIc", &["heic"]));
/// assert!(!name_has_extension("heic", &["heic"]));
/// ```
pub fn name_has_extension(name: &str, extensions: &[&str]) -> bool {
    let ext = name_extension_lowercase(name);
    !ext.is_empty() && extensions.contains(&ext.as_str())
}

/// File name without its final extension.
pub fn name_stem(name: &str) -> &str {
    let base = base_name(name);
    match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    }
}
