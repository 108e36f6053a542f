use anyhow::Result;
use clap::{Parser, ValueEnum};
use face_landmark_service::{
    config::{Config, PixelRange, TensorLayout},
    detection::{Backend, CascadeOutput},
    web::serve,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    Mediapipe,
    Haar,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputArg {
    Boxes,
    Landmarks,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutArg {
    Nhwc,
    Nchw,
}

#[derive(Parser)]
#[command(name = "face-landmark-service")]
#[command(about = "Face detection and landmark service")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:3000")]
    bind: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Model directory path
    #[arg(long, default_value = "models")]
    models_dir: String,

    /// Sample image directory served under /res
    #[arg(long, default_value = "res")]
    res_dir: String,

    /// Backend used when a request names none
    #[arg(long, value_enum, default_value = "mediapipe")]
    default_model: ModelArg,

    /// Shape of cascade results when a request names none
    #[arg(long, value_enum, default_value = "boxes")]
    cascade_output: OutputArg,

    /// Allowed CORS origins, comma separated; `*` allows any
    #[arg(long, value_delimiter = ',')]
    cors_origins: Option<Vec<String>>,

    /// Allow credentialed CORS requests
    #[arg(long)]
    cors_credentials: Option<bool>,

    /// CORS preflight max age in seconds
    #[arg(long)]
    cors_max_age: Option<u64>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Cascade pyramid scale factor
    #[arg(long)]
    scale_factor: Option<f32>,

    /// Cascade minimum face size in pixels
    #[arg(long)]
    min_face_size: Option<u32>,

    /// Maximum number of faces refined by the mesh model
    #[arg(long)]
    max_faces: Option<usize>,

    /// Mesh model input tensor layout
    #[arg(long, value_enum, default_value = "nhwc")]
    mesh_layout: LayoutArg,

    /// Feed the mesh model pixels in [-1, 1] instead of [0, 1]
    #[arg(long)]
    mesh_signed_input: bool,

    /// Number of ONNX intra-op threads
    #[arg(long)]
    threads: Option<usize>,

    /// Enable development mode
    #[arg(long)]
    dev: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting face landmark service...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Models directory: {}", args.models_dir);
    tracing::info!("Sample directory: {}", args.res_dir);

    let mut config = Config::new(
        args.bind.clone(),
        args.models_dir.clone(),
        args.res_dir.clone(),
        args.dev,
    )?;
    apply_overrides(&mut config, &args);

    serve(config).await?;

    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    config.default_backend = match args.default_model {
        ModelArg::Mediapipe => Backend::Mesh,
        ModelArg::Haar => Backend::Cascade,
    };
    config.cascade_output = match args.cascade_output {
        OutputArg::Boxes => CascadeOutput::Boxes,
        OutputArg::Landmarks => CascadeOutput::Landmarks,
    };

    if let Some(ref origins) = args.cors_origins {
        config.cors_config.allowed_origins = origins.clone();
    }
    if let Some(credentials) = args.cors_credentials {
        config.cors_config.allow_credentials = credentials;
    }
    if let Some(max_age) = args.cors_max_age {
        config.cors_config.max_age = max_age;
    }
    if let Some(timeout) = args.timeout {
        config.server_config.request_timeout = timeout;
    }
    if let Some(scale_factor) = args.scale_factor {
        config.cascade_config.scale_factor = scale_factor;
    }
    if let Some(min_face_size) = args.min_face_size {
        config.cascade_config.min_face_size = min_face_size;
    }
    if let Some(max_faces) = args.max_faces {
        config.mesh_config.max_faces = max_faces;
    }
    if let Some(threads) = args.threads {
        config.onnx_config.intra_threads = threads.max(1);
    }

    config.mesh_config.layout = match args.mesh_layout {
        LayoutArg::Nhwc => TensorLayout::Nhwc,
        LayoutArg::Nchw => TensorLayout::Nchw,
    };
    if args.mesh_signed_input {
        config.mesh_config.pixel_range = PixelRange::SignedUnit;
    }
}
