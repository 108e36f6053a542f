//! Sample image listing for the `res/` directory.

use crate::utils::error::GatewayError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// URL prefix under which the sample directory is served.
pub const RES_ROUTE: &str = "/res";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub url: String,
    pub name: String,
}

/// List png/jpg/jpeg files in `dir`, sorted by name.
///
/// A missing directory is reported as [`GatewayError::ResourceNotFound`].
pub fn list_sample_images(dir: &Path) -> Result<Vec<ImageInfo>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(GatewayError::ResourceNotFound(format!(
                "sample directory {}",
                dir.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let mut images = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            tracing::debug!("Skipping non UTF-8 file name: {:?}", entry.file_name());
            continue;
        };

        if is_image_name(&name) {
            images.push(ImageInfo {
                url: format!("{}/{}", RES_ROUTE, name),
                name,
            });
        }
    }

    images.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::debug!("Listed {} sample images in {}", images.len(), dir.display());
    Ok(images)
}

/// Suffix match, so dotfiles such as `.png` count as images.
fn is_image_name(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| name.ends_with(&format!(".{}", ext)))
}
