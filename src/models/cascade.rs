use crate::config::CascadeConfig;
use crate::detection::BoundingBox;
use crate::models::FaceDetector;
use crate::utils::error::GatewayError;
use crate::{Config, Result};
use image::GrayImage;
use std::fs::File;
use std::io::BufReader;

/// SeetaFace funnel-structured cascade, via `rustface`.
///
/// The parsed model is immutable and shared; every call builds a fresh
/// detector from a clone because the detector keeps scratch state.
pub struct CascadeDetector {
    model: rustface::Model,
    params: CascadeConfig,
}

impl CascadeDetector {
    pub fn new(config: &Config) -> Result<Self> {
        let model_path = config.cascade_model_path();

        if !model_path.exists() {
            return Err(GatewayError::ModelLoad(format!(
                "Cascade model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading cascade model from: {}", model_path.display());

        let reader = BufReader::new(File::open(&model_path)?);
        let model = rustface::read_model(reader).map_err(|e| {
            GatewayError::ModelLoad(format!(
                "Failed to parse cascade model {}: {}",
                model_path.display(),
                e
            ))
        })?;

        Ok(Self {
            model,
            params: config.cascade_config.clone(),
        })
    }
}

impl FaceDetector for CascadeDetector {
    fn detect(&self, gray: &GrayImage) -> Result<Vec<BoundingBox>> {
        let (width, height) = gray.dimensions();

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.params.min_face_size);
        detector.set_score_thresh(self.params.score_thresh);
        // rustface shrinks the image by this factor per pyramid level
        detector.set_pyramid_scale_factor(1.0 / self.params.scale_factor);
        detector.set_slide_window_step(self.params.window_step, self.params.window_step);

        let faces = detector.detect(&rustface::ImageData::new(gray.as_raw(), width, height));

        let boxes: Vec<BoundingBox> = faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                BoundingBox::clamped(
                    bbox.x() as i64,
                    bbox.y() as i64,
                    bbox.width() as i64,
                    bbox.height() as i64,
                    width,
                    height,
                )
            })
            .filter(|bbox| !bbox.is_empty())
            .collect();

        tracing::debug!("Cascade found {} faces in {}x{} image", boxes.len(), width, height);
        Ok(boxes)
    }
}
