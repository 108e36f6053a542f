pub mod cascade;
pub mod mesh;
pub mod manager;

pub use cascade::CascadeDetector;
pub use manager::{ModelManager, ModelStats};
pub use mesh::FaceMesh;

use crate::detection::{BoundingBox, NormalizedLandmark};
use crate::Result;
use image::{GrayImage, RgbImage};

/// Face region detector working on a luma image.
pub trait FaceDetector: Send + Sync {
    /// Face boxes in detector order, clipped to the image.
    fn detect(&self, gray: &GrayImage) -> Result<Vec<BoundingBox>>;
}

/// Dense landmark model working on an RGB image.
pub trait MeshModel: Send + Sync {
    /// Landmarks per face in normalized image coordinates.
    fn detect(&self, rgb: &RgbImage) -> Result<Vec<Vec<NormalizedLandmark>>>;
}
