use super::{ClusterClient, ClusterError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tracing::debug;

/// Key of a docker registry secret and the file name tools expect for it
const DOCKER_CONFIG_KEY: &str = ".dockerconfigjson";
const DOCKER_CONFIG_FILE: &str = "config.json";

pub fn remap_secret_key(key: &str) -> &str {
    if key == DOCKER_CONFIG_KEY {
        DOCKER_CONFIG_FILE
    } else {
        key
    }
}

/// Writes every entry of the registry secret into a fresh temporary
/// directory. The directory is removed when the returned handle drops.
pub async fn mount_registry_config(
    cluster: &dyn ClusterClient,
    namespace: &str,
    prefix: &str,
    secret: &str,
) -> Result<TempDir, ClusterError> {
    let data = cluster.secret_data(namespace, secret).await?;

    let dir = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(|source| ClusterError::Io {
            path: std::env::temp_dir(),
            source,
        })?;

    for (key, value) in &data {
        let path = dir.path().join(remap_secret_key(key));
        write_secret_file(&path, value)?;
    }

    debug!(
        secret,
        entries = data.len(),
        dir = %dir.path().display(),
        "Mounted registry secret"
    );
    Ok(dir)
}

fn write_secret_file(path: &Path, content: &[u8]) -> Result<(), ClusterError> {
    fs::write(path, content).map_err(|source| ClusterError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|source| {
            ClusterError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;
    }

    Ok(())
}
