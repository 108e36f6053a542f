use crate::detection::Backend;
use crate::models::{CascadeDetector, FaceDetector, FaceMesh, MeshModel};
use crate::utils::error::GatewayError;
use crate::{Config, Result};
use std::sync::Arc;

/// Detection backends loaded once at startup.
///
/// Built by [`crate::web::serve`] and shared with handlers through router
/// state. Every backend is immutable after construction.
#[derive(Clone)]
pub struct ModelManager {
    cascade: Arc<dyn FaceDetector>,
    mesh: Option<Arc<dyn MeshModel>>,
}

impl ModelManager {
    /// Load the cascade model (required) and the mesh model (optional).
    pub fn load(config: &Config) -> Result<Self> {
        tracing::info!("Initializing model manager...");

        let cascade: Arc<dyn FaceDetector> = Arc::new(CascadeDetector::new(config)?);
        tracing::info!("Cascade model loaded successfully");

        let mesh = if config.mesh_model_path().exists() {
            match FaceMesh::new(config, Arc::clone(&cascade)) {
                Ok(mesh) => {
                    tracing::info!("Mesh model loaded successfully");
                    Some(Arc::new(mesh) as Arc<dyn MeshModel>)
                }
                Err(e) => {
                    tracing::warn!("Failed to load mesh model: {}", e);
                    None
                }
            }
        } else {
            tracing::warn!(
                "Mesh model not found at {}, serving cascade only",
                config.mesh_model_path().display()
            );
            None
        };

        tracing::info!("Model manager initialized successfully");
        Ok(Self { cascade, mesh })
    }

    /// Assemble a manager from already constructed backends.
    pub fn from_parts(cascade: Arc<dyn FaceDetector>, mesh: Option<Arc<dyn MeshModel>>) -> Self {
        Self { cascade, mesh }
    }

    pub fn cascade(&self) -> Arc<dyn FaceDetector> {
        Arc::clone(&self.cascade)
    }

    pub fn mesh(&self) -> Result<Arc<dyn MeshModel>> {
        self.mesh
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| GatewayError::ModelUnavailable("mesh".to_string()))
    }

    pub fn has_mesh(&self) -> bool {
        self.mesh.is_some()
    }

    pub fn is_loaded(&self, backend: Backend) -> bool {
        match backend {
            Backend::Cascade => true,
            Backend::Mesh => self.has_mesh(),
        }
    }

    pub fn get_stats(&self) -> ModelStats {
        ModelStats {
            has_cascade: true,
            has_mesh: self.has_mesh(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ModelStats {
    pub has_cascade: bool,
    pub has_mesh: bool,
}
