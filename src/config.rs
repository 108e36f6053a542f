use crate::detection::{Backend, CascadeOutput};
use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,

    /// Directory holding the cascade and mesh model files
    pub models_dir: PathBuf,

    /// Directory listed by `/list_images` and served under `/res`
    pub res_dir: PathBuf,

    /// Development mode
    pub dev_mode: bool,

    /// Backend used when a request does not name one
    pub default_backend: Backend,

    /// Shape of cascade results when a request does not choose one
    pub cascade_output: CascadeOutput,

    pub onnx_config: OnnxConfig,

    pub server_config: ServerConfig,

    pub cors_config: CorsConfig,

    pub cascade_config: CascadeConfig,

    pub mesh_config: MeshConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU threads per inference
    pub intra_threads: usize,

    /// Graph optimization level (0-3)
    pub optimization_level: i32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Request timeout in seconds
    pub request_timeout: u64,

    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any origin
    pub allowed_origins: Vec<String>,

    pub allow_credentials: bool,

    /// Preflight cache lifetime in seconds
    pub max_age: u64,
}

impl CorsConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }
}

/// rustface accepts pyramid factors in [0.01, 0.99], the inverse of these bounds.
const MIN_SCALE_FACTOR: f32 = 1.0 / 0.99;
const MAX_SCALE_FACTOR: f32 = 100.0;

#[derive(Debug, Clone)]
pub struct CascadeConfig {
    /// Ratio between consecutive pyramid levels (> 1.0)
    pub scale_factor: f32,

    /// Smallest face side in pixels; the detector needs at least 20
    pub min_face_size: u32,

    pub score_thresh: f64,

    pub window_step: u32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_face_size: 30,
            score_thresh: 2.0,
            window_step: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    Nhwc,
    Nchw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelRange {
    /// Pixels scaled to [0, 1]
    ZeroOne,
    /// Pixels scaled to [-1, 1]
    SignedUnit,
}

#[derive(Debug, Clone)]
pub struct MeshConfig {
    pub max_faces: usize,

    /// Minimum face presence probability for a mesh to be kept
    pub min_confidence: f32,

    /// Side of the square model input in pixels
    pub input_size: u32,

    /// Face box enlargement before cropping the model input
    pub roi_scale: f32,

    pub layout: TensorLayout,

    pub pixel_range: PixelRange,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            max_faces: 10,
            min_confidence: 0.5,
            input_size: 192,
            roi_scale: 1.5,
            layout: TensorLayout::Nhwc,
            pixel_range: PixelRange::ZeroOne,
        }
    }
}

impl Config {
    pub fn new(
        bind_addr: String,
        models_dir: String,
        res_dir: String,
        dev_mode: bool,
    ) -> Result<Self> {
        let cpu_cores = num_cpus::get();

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1),
            optimization_level: 3,
        };

        let server_config = ServerConfig {
            request_timeout: 300,
            max_request_size: 20 * 1024 * 1024,
        };

        let cors_config = CorsConfig {
            allowed_origins: if dev_mode {
                vec!["*".to_string()]
            } else {
                vec!["http://localhost:3001".to_string()]
            },
            allow_credentials: !dev_mode,
            max_age: 1200,
        };

        Ok(Self {
            bind_addr,
            models_dir: PathBuf::from(models_dir),
            res_dir: PathBuf::from(res_dir),
            dev_mode,
            default_backend: Backend::Mesh,
            cascade_output: CascadeOutput::Boxes,
            onnx_config,
            server_config,
            cors_config,
            cascade_config: CascadeConfig::default(),
            mesh_config: MeshConfig::default(),
        })
    }

    /// Validate knobs that the backends would otherwise reject at runtime
    pub fn validate(&self) -> Result<()> {
        let scale_factor = self.cascade_config.scale_factor;
        if !(MIN_SCALE_FACTOR..=MAX_SCALE_FACTOR).contains(&scale_factor) {
            anyhow::bail!(
                "cascade scale factor must be between {:.4} and {}, got {}",
                MIN_SCALE_FACTOR,
                MAX_SCALE_FACTOR,
                scale_factor
            );
        }
        if !(self.cascade_config.score_thresh > 0.0) {
            anyhow::bail!(
                "cascade score threshold must be positive, got {}",
                self.cascade_config.score_thresh
            );
        }
        if self.cascade_config.min_face_size < 20 {
            anyhow::bail!(
                "cascade minimum face size must be at least 20, got {}",
                self.cascade_config.min_face_size
            );
        }
        if self.cascade_config.window_step == 0 {
            anyhow::bail!("cascade window step must be positive");
        }
        if self.mesh_config.max_faces == 0 {
            anyhow::bail!("mesh max faces must be positive");
        }
        if !(0.0..=1.0).contains(&self.mesh_config.min_confidence) {
            anyhow::bail!(
                "mesh min confidence must be between 0.0 and 1.0, got {}",
                self.mesh_config.min_confidence
            );
        }
        if self.mesh_config.input_size == 0 || self.mesh_config.roi_scale <= 0.0 {
            anyhow::bail!("mesh input size and roi scale must be positive");
        }
        Ok(())
    }

    /// SeetaFace frontal cascade model
    pub fn cascade_model_path(&self) -> PathBuf {
        self.models_dir.join("seeta_fd_frontal_v1.0.bin")
    }

    /// MediaPipe face mesh exported to ONNX
    pub fn mesh_model_path(&self) -> PathBuf {
        self.models_dir.join("face_landmark.onnx")
    }
}
