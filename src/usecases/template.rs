use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub const TEMPLATE_DIR: &str = "Asset";
pub const TEMPLATE_FILE: &str = "ArmTemplate.json";

pub fn template_path(project_root: &Path) -> PathBuf {
    project_root.join(TEMPLATE_DIR).join(TEMPLATE_FILE)
}

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Reads the template as UTF-8, dropping a leading byte order mark and
/// trailing whitespace. Nothing else is touched.
pub fn load_template(path: &Path) -> io::Result<String> {
    let raw = fs::read_to_string(path)?;
    let text = raw.strip_prefix(BYTE_ORDER_MARK).unwrap_or(&raw);
    Ok(text.trim_end().to_owned())
}
