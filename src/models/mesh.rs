use crate::config::MeshConfig;
use crate::detection::NormalizedLandmark;
use crate::image::ImageTransforms;
use crate::models::{FaceDetector, MeshModel};
use crate::utils::error::GatewayError;
use crate::{Config, Result};
use image::{imageops, RgbImage};
use ndarray::Array4;
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Runs the landmark network on one input tensor.
///
/// Returns every model output flattened, in model output order.
pub(crate) trait MeshInference: Send + Sync {
    fn run(&self, input: Array4<f32>) -> Result<Vec<Vec<f32>>>;
}

/// ONNX Runtime session with its discovered input and outputs.
struct OrtInference {
    session: Mutex<Session>,
    input_name: String,
    output_names: Vec<String>,
}

impl OrtInference {
    fn load(config: &Config) -> Result<Self> {
        let model_path = config.mesh_model_path();

        if !model_path.exists() {
            return Err(GatewayError::ModelLoad(format!(
                "Mesh model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading mesh model from: {}", model_path.display());

        let session = Session::builder()?
            .with_optimization_level(optimization_level(config.onnx_config.optimization_level))?
            .with_intra_threads(config.onnx_config.intra_threads)?
            .commit_from_file(&model_path)?;

        let input_name = match session.inputs.first() {
            Some(input) => input.name.clone(),
            None => {
                return Err(GatewayError::ModelLoad(
                    "Mesh model has no inputs".to_string(),
                ))
            }
        };

        if session.outputs.is_empty() {
            return Err(GatewayError::ModelLoad(
                "Mesh model has no outputs".to_string(),
            ));
        }
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        tracing::info!("Mesh model input: '{}'", input_name);
        for (i, name) in output_names.iter().enumerate() {
            tracing::debug!("Mesh output[{}]: '{}'", i, name);
        }

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_names,
        })
    }
}

impl MeshInference for OrtInference {
    fn run(&self, input: Array4<f32>) -> Result<Vec<Vec<f32>>> {
        let input_tensor = Tensor::from_array(input)?;

        let mut session = self.session.lock();
        let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

        let mut raw = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            match outputs.get(name.as_str()) {
                Some(output) => {
                    let values = output.try_extract_array::<f32>()?;
                    raw.push(values.iter().copied().collect::<Vec<f32>>());
                }
                None => {
                    return Err(GatewayError::Inference(format!(
                        "Mesh output '{}' missing from results",
                        name
                    )))
                }
            }
        }
        Ok(raw)
    }
}

/// MediaPipe face mesh run through ONNX Runtime.
///
/// Face regions are proposed by a [`FaceDetector`]; each region is cropped,
/// resized to the model input and refined into a dense landmark set.
pub struct FaceMesh {
    inference: Box<dyn MeshInference>,
    proposals: Arc<dyn FaceDetector>,
    params: MeshConfig,
}

/// Raw model output for one crop.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MeshOutput {
    /// (x, y, z) in model input pixels
    pub points: Vec<[f32; 3]>,
    /// Face presence probability, when the model reports one
    pub presence: Option<f32>,
}

impl FaceMesh {
    pub fn new(config: &Config, proposals: Arc<dyn FaceDetector>) -> Result<Self> {
        let inference = OrtInference::load(config)?;
        Ok(Self::with_inference(
            Box::new(inference),
            proposals,
            config.mesh_config.clone(),
        ))
    }

    pub(crate) fn with_inference(
        inference: Box<dyn MeshInference>,
        proposals: Arc<dyn FaceDetector>,
        params: MeshConfig,
    ) -> Self {
        Self {
            inference,
            proposals,
            params,
        }
    }

    fn infer(&self, crop: &RgbImage) -> Result<MeshOutput> {
        let input = ImageTransforms::to_tensor(crop, self.params.layout, self.params.pixel_range);
        let raw = self.inference.run(input)?;
        decode_outputs(&raw)
    }
}

impl MeshModel for FaceMesh {
    fn detect(&self, rgb: &RgbImage) -> Result<Vec<Vec<NormalizedLandmark>>> {
        let (width, height) = rgb.dimensions();
        let gray = imageops::grayscale(rgb);

        let mut regions = self.proposals.detect(&gray)?;
        regions.truncate(self.params.max_faces);
        tracing::debug!("Mesh refining {} face proposals", regions.len());

        let mut faces = Vec::with_capacity(regions.len());
        for bbox in &regions {
            let roi = ImageTransforms::square_roi(bbox, self.params.roi_scale, width, height);
            let crop = ImageTransforms::crop_resize(rgb, &roi, self.params.input_size);
            let output = self.infer(&crop)?;

            if let Some(presence) = output.presence {
                if presence < self.params.min_confidence {
                    tracing::debug!("Dropping face at {:?}: presence {:.3}", bbox, presence);
                    continue;
                }
            }

            let landmarks = output
                .points
                .iter()
                .map(|p| roi.to_image_normalized(p[0], p[1], self.params.input_size, width, height))
                .collect();
            faces.push(landmarks);
        }

        Ok(faces)
    }
}

/// Pick the landmark and presence tensors out of the flattened model outputs.
pub(crate) fn decode_outputs(raw: &[Vec<f32>]) -> Result<MeshOutput> {
    let landmarks = raw
        .iter()
        .find(|values| values.len() >= 3 && values.len() % 3 == 0)
        .ok_or_else(|| {
            GatewayError::Inference(format!(
                "No landmark tensor among outputs with lengths {:?}",
                raw.iter().map(Vec::len).collect::<Vec<_>>()
            ))
        })?;

    let presence = raw
        .iter()
        .find(|values| values.len() == 1)
        .map(|values| sigmoid(values[0]));

    let points = landmarks
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();

    Ok(MeshOutput { points, presence })
}

fn sigmoid(logit: f32) -> f32 {
    1.0 / (1.0 + (-logit).exp())
}

fn optimization_level(level: i32) -> GraphOptimizationLevel {
    match level {
        i32::MIN..=0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}
