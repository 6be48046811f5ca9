use super::TaskEnv;
use crate::cluster::{wait_for, PodPhase, PodRequest, Probe};
use crate::error::BuildError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Creates the pod, waits for it to terminate and deletes it on every exit
/// path. Returns the termination message of a succeeded pod.
pub(super) async fn run_pod(
    env: &TaskEnv,
    tool: &'static str,
    pod: &PodRequest,
    cancel: &CancellationToken,
) -> Result<Option<String>, BuildError> {
    env.cluster.create_pod(pod).await?;
    info!(pod = %pod.name, image = %pod.image, "Started build pod");

    let result = wait_pod(env, tool, pod, cancel).await;

    if let Err(e) = env.cluster.delete_pod(&pod.namespace, &pod.name).await {
        warn!(pod = %pod.name, error = %e, "Failed to delete build pod");
    }
    result
}

async fn wait_pod(
    env: &TaskEnv,
    tool: &'static str,
    pod: &PodRequest,
    cancel: &CancellationToken,
) -> Result<Option<String>, BuildError> {
    let cluster = env.cluster.clone();
    let what = format!("pod {}", pod.name);
    let phase = wait_for(
        &what,
        cancel,
        env.wait_timeout(),
        env.config.poll_interval,
        || {
            let cluster = cluster.clone();
            let namespace = pod.namespace.clone();
            let name = pod.name.clone();
            async move {
                let phase = cluster.pod_phase(&namespace, &name).await?;
                Ok(match phase {
                    PodPhase::Succeeded | PodPhase::Failed => Probe::Done(phase),
                    _ => Probe::Continue,
                })
            }
        },
    )
    .await?;

    let message = env
        .cluster
        .pod_termination_message(&pod.namespace, &pod.name)
        .await?
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    match phase {
        PodPhase::Succeeded => Ok(message),
        _ => {
            let mut error = format!("pod {} failed", pod.name);
            if let Some(message) = message {
                error.push_str(": ");
                error.push_str(&message);
            }
            Err(BuildError::external(tool, error))
        }
    }
}
