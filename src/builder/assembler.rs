//! In-process image assembly for the Spectrum strategy
//!
//! A dependency directory is layered under `/deployments` on top of a base
//! image and pushed to the target registry. [`DockerAssembler`] drives the
//! local Docker daemon through bollard.

use crate::builder::context::DEPLOYMENT_DIR;
use crate::error::BuildError;
use async_trait::async_trait;
use base64::Engine;
use bollard::auth::DockerCredentials;
use bollard::Docker;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures_util::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const ASSEMBLY_DOCKERFILE: &str = ".kitbuilder.Dockerfile";
const DOCKER_HUB: &str = "docker.io";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssembleRequest {
    /// Directory whose content ends up under `/deployments`
    pub context_dir: PathBuf,
    pub base_image: String,
    pub target_image: String,
    pub platforms: Vec<String>,
    /// Registry is reachable over plain HTTP or with an untrusted certificate
    pub insecure: bool,
    /// Directory holding a docker `config.json`
    pub config_dir: Option<PathBuf>,
}

#[async_trait]
pub trait ImageAssembler: Send + Sync {
    /// Builds and pushes the image, returning its digest
    async fn assemble(
        &self,
        request: &AssembleRequest,
        cancel: &CancellationToken,
    ) -> Result<String, BuildError>;
}

/// Assembles through the Docker daemon reachable with local defaults
#[derive(Debug, Default)]
pub struct DockerAssembler;

impl DockerAssembler {
    pub fn new() -> Self {
        Self
    }

    fn connect() -> Result<Docker, BuildError> {
        Docker::connect_with_local_defaults()
            .map_err(|e| BuildError::Assemble(format!("failed to connect to docker: {}", e)))
    }

    async fn build(
        docker: &Docker,
        request: &AssembleRequest,
        context: Vec<u8>,
        credentials: &HashMap<String, DockerCredentials>,
    ) -> Result<(), BuildError> {
        use bytes::Bytes;
        use http_body_util::{Either, Full};

        let platform = request.platforms.join(",");
        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions {
            dockerfile: ASSEMBLY_DOCKERFILE,
            t: request.target_image.as_str(),
            platform: platform.as_str(),
            rm: true,
            forcerm: true,
            pull: true,
            ..Default::default()
        };

        let registry_config = (!credentials.is_empty()).then(|| credentials.clone());
        let mut stream = docker.build_image(
            options,
            registry_config,
            Some(Either::Left(Full::new(Bytes::from(context)))),
        );

        while let Some(msg) = stream.next().await {
            let output =
                msg.map_err(|e| BuildError::Assemble(format!("image build failed: {}", e)))?;
            if let Some(line) = output.stream {
                let line = line.trim_end();
                if !line.is_empty() {
                    debug!(image = %request.target_image, "{}", line);
                }
            }
            if let Some(error) = output.error {
                return Err(BuildError::Assemble(error));
            }
            if let Some(detail) = output.error_detail {
                return Err(BuildError::Assemble(
                    detail
                        .message
                        .unwrap_or_else(|| "unknown build error".to_string()),
                ));
            }
        }
        Ok(())
    }

    async fn push(
        docker: &Docker,
        image: &str,
        credentials: Option<DockerCredentials>,
    ) -> Result<(), BuildError> {
        let (repository, tag) = split_tag(image);

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> {
            tag: tag.to_string(),
        };

        #[allow(deprecated)]
        let mut stream = docker.push_image(repository, Some(options), credentials);

        while let Some(result) = stream.next().await {
            let info =
                result.map_err(|e| BuildError::Assemble(format!("image push failed: {}", e)))?;
            if let Some(error) = info.error {
                return Err(BuildError::Assemble(error));
            }
            if let Some(status) = info.status {
                debug!(image, status = %status, "Push progress");
            }
        }
        Ok(())
    }

    async fn digest(docker: &Docker, image: &str) -> Result<String, BuildError> {
        let inspect = docker
            .inspect_image(image)
            .await
            .map_err(|e| BuildError::Assemble(format!("failed to inspect {}: {}", image, e)))?;

        let (repository, _) = split_tag(image);
        inspect
            .repo_digests
            .unwrap_or_default()
            .iter()
            .find_map(|d| digest_for(repository, d))
            .ok_or_else(|| BuildError::Assemble(format!("no digest recorded for {}", image)))
    }

    async fn run(docker: &Docker, request: &AssembleRequest) -> Result<String, BuildError> {
        let credentials = match &request.config_dir {
            Some(dir) => load_credentials(dir)?,
            None => HashMap::new(),
        };
        if request.insecure {
            warn!(
                image = %request.target_image,
                "Insecure registry requested, the docker daemon must list it in insecure-registries"
            );
        }

        let context = assembly_context(&request.context_dir, &request.base_image)
            .map_err(|e| BuildError::io(&request.context_dir, e))?;
        debug!(bytes = context.len(), "Created assembly context");

        Self::build(docker, request, context, &credentials).await?;

        let push_credentials = credentials
            .get(registry_of(&request.target_image))
            .cloned();
        Self::push(docker, &request.target_image, push_credentials).await?;

        Self::digest(docker, &request.target_image).await
    }
}

#[async_trait]
impl ImageAssembler for DockerAssembler {
    async fn assemble(
        &self,
        request: &AssembleRequest,
        cancel: &CancellationToken,
    ) -> Result<String, BuildError> {
        info!(
            base = %request.base_image,
            target = %request.target_image,
            "Assembling image"
        );
        let docker = Self::connect()?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(BuildError::Interrupted),
            result = Self::run(&docker, request) => result,
        }
    }
}

pub fn assembly_dockerfile(base_image: &str) -> String {
    format!("FROM {}\nADD . {}\n", base_image, DEPLOYMENT_DIR)
}

/// Gzipped tar of `dir` plus the assembly Dockerfile. A `.dockerignore`
/// keeps both generated files out of the image.
pub fn assembly_context(dir: &Path, base_image: &str) -> std::io::Result<Vec<u8>> {
    let mut data = Vec::new();
    {
        let encoder = GzEncoder::new(&mut data, Compression::default());
        let mut tar = tar::Builder::new(encoder);
        tar.append_dir_all(".", dir)?;

        let ignore = format!("{}\n.dockerignore\n", ASSEMBLY_DOCKERFILE);
        append_file(&mut tar, ".dockerignore", ignore.as_bytes())?;
        append_file(
            &mut tar,
            ASSEMBLY_DOCKERFILE,
            assembly_dockerfile(base_image).as_bytes(),
        )?;

        tar.into_inner()?.finish()?;
    }
    Ok(data)
}

fn append_file<W: std::io::Write>(
    tar: &mut tar::Builder<W>,
    path: &str,
    content: &[u8],
) -> std::io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_path(path)?;
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    tar.append(&header, content)
}

/// `repo[:tag]`, the tag defaulting to `latest`. A colon inside the
/// registry host is not a tag separator. For `repo@digest` the digest is
/// returned in place of the tag.
pub fn split_tag(image: &str) -> (&str, &str) {
    if let Some((name, digest)) = image.split_once('@') {
        return (split_tag(name).0, digest);
    }
    let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[name_start..].rfind(':') {
        Some(i) => (&image[..name_start + i], &image[name_start + i + 1..]),
        None => (image, "latest"),
    }
}

/// Registry host of an image reference, `docker.io` when it has none
pub fn registry_of(image: &str) -> &str {
    match image.split_once('/') {
        Some((first, _)) if first.contains('.') || first.contains(':') || first == "localhost" => {
            first
        }
        _ => DOCKER_HUB,
    }
}

fn digest_for(repository: &str, repo_digest: &str) -> Option<String> {
    let (repo, digest) = repo_digest.split_once('@')?;
    (repo == repository).then(|| digest.to_string())
}

#[derive(Debug, Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, DockerAuth>,
}

#[derive(Debug, Deserialize)]
struct DockerAuth {
    #[serde(default)]
    auth: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Credentials per registry from `<dir>/config.json`. A missing file means
/// anonymous access.
pub fn load_credentials(dir: &Path) -> Result<HashMap<String, DockerCredentials>, BuildError> {
    let path = dir.join("config.json");
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
    parse_credentials(&content)
}

pub fn parse_credentials(content: &str) -> Result<HashMap<String, DockerCredentials>, BuildError> {
    let config: DockerConfig = serde_json::from_str(content)
        .map_err(|e| BuildError::Assemble(format!("invalid docker config: {}", e)))?;

    let mut credentials = HashMap::new();
    for (server, entry) in config.auths {
        let (username, password) = match entry.auth.as_deref() {
            Some(encoded) if !encoded.is_empty() => decode_auth(&server, encoded)?,
            _ => (
                entry.username.unwrap_or_default(),
                entry.password.unwrap_or_default(),
            ),
        };
        let registry = normalize_server(&server).to_string();
        credentials.insert(
            registry,
            DockerCredentials {
                username: Some(username),
                password: Some(password),
                serveraddress: Some(server),
                ..Default::default()
            },
        );
    }
    Ok(credentials)
}

fn decode_auth(server: &str, encoded: &str) -> Result<(String, String), BuildError> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| BuildError::Assemble(format!("invalid auth for {}: {}", server, e)))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| BuildError::Assemble(format!("invalid auth for {}: {}", server, e)))?;
    decoded
        .split_once(':')
        .map(|(u, p)| (u.to_string(), p.to_string()))
        .ok_or_else(|| BuildError::Assemble(format!("invalid auth format for {}", server)))
}

/// `https://index.docker.io/v1/` and friends map to the bare host
fn normalize_server(server: &str) -> &str {
    let host = server
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = host.split('/').next().unwrap_or(host);
    if host == "index.docker.io" || host == "registry-1.docker.io" {
        DOCKER_HUB
    } else {
        host
    }
}
