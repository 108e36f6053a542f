use crate::utils::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Message reported when a backend finds no face.
pub const NO_FACE_DETECTED: &str = "No face detected";

/// Axis-aligned face region in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Build a box from raw detector output, clipped to a `img_w` x `img_h` image.
    ///
    /// Detectors may report regions hanging over the image edge; the clipped
    /// box always satisfies `x + width <= img_w` and `y + height <= img_h`.
    pub fn clamped(x: i64, y: i64, width: i64, height: i64, img_w: u32, img_h: u32) -> Self {
        let (img_w, img_h) = (img_w as i64, img_h as i64);
        let x0 = x.clamp(0, img_w);
        let y0 = y.clamp(0, img_h);
        let x1 = (x + width.max(0)).clamp(x0, img_w);
        let y1 = (y + height.max(0)).clamp(y0, img_h);

        Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Five synthetic keypoints at fixed fractions of the box:
    /// nose, left eye, right eye, left mouth corner, right mouth corner.
    pub fn synthetic_landmarks(&self) -> Vec<LandmarkPoint> {
        let (x, y, w, h) = (self.x as i32, self.y as i32, self.width as i32, self.height as i32);
        vec![
            LandmarkPoint { x: x + w / 2, y: y + h / 2 },
            LandmarkPoint { x: x + w / 4, y: y + h / 3 },
            LandmarkPoint { x: x + 3 * w / 4, y: y + h / 3 },
            LandmarkPoint { x: x + w / 4, y: y + 2 * h / 3 },
            LandmarkPoint { x: x + 3 * w / 4, y: y + 2 * h / 3 },
        ]
    }
}

/// Facial keypoint in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: i32,
    pub y: i32,
}

impl LandmarkPoint {
    /// Map a normalized coordinate pair onto a `width` x `height` pixel grid.
    ///
    /// Coordinates are truncated and kept inside `[0, width) x [0, height)`.
    pub fn from_normalized(point: NormalizedLandmark, width: u32, height: u32) -> Self {
        Self {
            x: to_pixel(point.x, width),
            y: to_pixel(point.y, height),
        }
    }
}

fn to_pixel(value: f32, extent: u32) -> i32 {
    if extent == 0 || !value.is_finite() {
        return 0;
    }
    let max = extent as i32 - 1;
    ((value * extent as f32) as i32).clamp(0, max)
}

/// Landmark in fractional image coordinates, nominally in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedLandmark {
    pub x: f32,
    pub y: f32,
}

/// Detected faces in one of the two response shapes.
///
/// An empty list always uses the `Landmarks` form so that `[]` decodes
/// back into the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Faces {
    Landmarks(Vec<Vec<LandmarkPoint>>),
    Boxes(Vec<BoundingBox>),
}

impl Faces {
    pub fn empty() -> Self {
        Faces::Landmarks(Vec::new())
    }

    pub fn len(&self) -> usize {
        match self {
            Faces::Landmarks(faces) => faces.len(),
            Faces::Boxes(boxes) => boxes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Faces {
    fn default() -> Self {
        Faces::empty()
    }
}

/// Response of every detection request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub face_count: usize,
    pub faces: Faces,
    pub error: Option<String>,
}

impl DetectionResult {
    /// Wrap backend output. Zero faces becomes the "no face" result.
    pub fn from_faces(faces: Faces) -> Self {
        if faces.is_empty() {
            return Self::failure(NO_FACE_DETECTED);
        }
        Self {
            face_count: faces.len(),
            faces,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            face_count: 0,
            faces: Faces::empty(),
            error: Some(message.into()),
        }
    }
}

impl From<GatewayError> for DetectionResult {
    fn from(err: GatewayError) -> Self {
        DetectionResult::failure(err.to_string())
    }
}

/// Detection backend selectable per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Classical cascade face detector
    Cascade,
    /// Pretrained face mesh model
    Mesh,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Cascade => "haar",
            Backend::Mesh => "mediapipe",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "haar" | "cascade" => Ok(Backend::Cascade),
            "mediapipe" | "mesh" => Ok(Backend::Mesh),
            other => Err(GatewayError::InvalidInput(format!(
                "Unknown model '{}'. Supported models: mediapipe, haar",
                other
            ))),
        }
    }
}

/// Shape of cascade detections in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeOutput {
    Boxes,
    Landmarks,
}

impl FromStr for CascadeOutput {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "boxes" | "bbox" => Ok(CascadeOutput::Boxes),
            "landmarks" => Ok(CascadeOutput::Landmarks),
            other => Err(GatewayError::InvalidInput(format!(
                "Unknown output '{}'. Supported outputs: boxes, landmarks",
                other
            ))),
        }
    }
}

/// Per-request detection options.
#[derive(Debug, Clone, Copy)]
pub struct DetectOptions {
    pub backend: Backend,
    pub cascade_output: CascadeOutput,
}
