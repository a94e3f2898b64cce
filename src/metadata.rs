use anyhow::{Context, Error as AnyError};
use log::{debug, warn};
use serde::Deserialize;
use std::{collections::BTreeMap, path::Path};

/// Sidecar `<vertex file>.meta` next to the vertex shader.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProgramMetadata {
    /// Attribute name to pinned location.
    pub attrib_locations: BTreeMap<String, u32>,
    pub emit_wgsl: bool,
}

pub fn load_metadata<T>(file_path: &Path) -> Result<Option<T>, AnyError>
where
    T: for<'de> Deserialize<'de>,
{
    let metadata_extension = match file_path.extension() {
        Some(extension) => format!("{}.meta", extension.to_string_lossy()),
        None => "meta".to_owned(),
    };
    let metadata_path = file_path.with_extension(metadata_extension);

    let content = match std::fs::read_to_string(&metadata_path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(
                "the metadata `{}` does not exist. skipping.",
                metadata_path.display()
            );
            return Ok(None);
        }
        Err(err) => {
            warn!(
                "failed to read the metadata `{}`: {}",
                metadata_path.display(),
                err
            );
            return Ok(None);
        }
    };

    let metadata = serde_json::from_str(&content)
        .with_context(|| format!("parsing the metadata `{}`", metadata_path.display()))?;

    Ok(Some(metadata))
}
