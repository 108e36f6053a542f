use crate::{
    detection::{CascadeOutput, DetectOptions, DetectionResult, Faces, LandmarkPoint, Backend},
    image::ImageLoader,
    models::ModelManager,
    Result,
};
use axum::body::Bytes;
use image::DynamicImage;
use std::time::Instant;

/// Turns an image into a [`DetectionResult`] with the selected backend.
///
/// Failures never escape: decode and model errors become an in-band
/// `error` with zero faces.
pub struct DetectionPipeline;

impl DetectionPipeline {
    /// Decode raw bytes and detect on the blocking pool.
    pub async fn process_bytes(
        models: ModelManager,
        bytes: Bytes,
        max_size: usize,
        options: DetectOptions,
    ) -> DetectionResult {
        Self::process_blocking(options, move || {
            let image = ImageLoader::from_bytes(&bytes, max_size)?;
            Self::run(&models, &image, options)
        })
        .await
    }

    /// Decode a base64 payload and detect on the blocking pool.
    pub async fn process_base64(
        models: ModelManager,
        data: String,
        max_size: usize,
        options: DetectOptions,
    ) -> DetectionResult {
        Self::process_blocking(options, move || {
            let image = ImageLoader::from_base64(&data, max_size)?;
            Self::run(&models, &image, options)
        })
        .await
    }

    /// Detect on an already decoded image, on the calling thread.
    pub fn detect(models: &ModelManager, image: &DynamicImage, options: DetectOptions) -> DetectionResult {
        match Self::run(models, image, options) {
            Ok(faces) => DetectionResult::from_faces(faces),
            Err(e) => {
                tracing::warn!("Detection failed with {}: {}", options.backend, e);
                e.into()
            }
        }
    }

    async fn process_blocking<F>(options: DetectOptions, task: F) -> DetectionResult
    where
        F: FnOnce() -> Result<Faces> + Send + 'static,
    {
        let start_time = Instant::now();

        let result = match tokio::task::spawn_blocking(task).await {
            Ok(Ok(faces)) => DetectionResult::from_faces(faces),
            Ok(Err(e)) => {
                tracing::warn!("Detection failed with {}: {}", options.backend, e);
                e.into()
            }
            Err(e) => {
                tracing::error!("Detection task aborted: {}", e);
                DetectionResult::failure(format!("Detection task failed: {}", e))
            }
        };

        tracing::info!(
            "Detection completed: backend={}, faces={}, error={:?}, time={:.3}s",
            options.backend,
            result.face_count,
            result.error,
            start_time.elapsed().as_secs_f32()
        );

        result
    }

    fn run(models: &ModelManager, image: &DynamicImage, options: DetectOptions) -> Result<Faces> {
        match options.backend {
            Backend::Cascade => {
                let gray = image.to_luma8();
                let boxes = models.cascade().detect(&gray)?;

                Ok(match options.cascade_output {
                    CascadeOutput::Boxes => Faces::Boxes(boxes),
                    CascadeOutput::Landmarks => Faces::Landmarks(
                        boxes.iter().map(|bbox| bbox.synthetic_landmarks()).collect(),
                    ),
                })
            }
            Backend::Mesh => {
                let mesh = models.mesh()?;
                let rgb = image.to_rgb8();
                let (width, height) = rgb.dimensions();

                let faces = mesh
                    .detect(&rgb)?
                    .into_iter()
                    .map(|face| {
                        face.into_iter()
                            .map(|point| LandmarkPoint::from_normalized(point, width, height))
                            .collect()
                    })
                    .collect();

                Ok(Faces::Landmarks(faces))
            }
        }
    }
}
