//! Bounded single-worker request queues
//!
//! Each [`BuildQueue`] owns one worker task that services requests in
//! arrival order, one at a time. Once the queue's token is cancelled the
//! worker finishes its current request and exits; requests still queued are
//! never serviced and their futures resolve to [`QueueError::NotServiced`].

use super::registry::StepRegistry;
use super::tasks::{run_task, TaskEnv};
use crate::api::{Build, BuildStatus, Task};
use crate::builder::assembler::ImageAssembler;
use crate::cluster::ClusterClient;
use crate::config::BuilderConfig;
use crate::progress::ProgressHandler;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue {0} is closed")]
    Closed(&'static str),

    #[error("queue {0} is full")]
    Full(&'static str),

    #[error("request was not serviced before the queue stopped")]
    NotServiced,
}

struct Envelope<Req, Res> {
    request: Req,
    reply: oneshot::Sender<Res>,
}

/// Result slot of one submitted request
pub struct ResultFuture<Res> {
    rx: oneshot::Receiver<Res>,
}

impl<Res> Future for ResultFuture<Res> {
    type Output = Result<Res, QueueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.map_err(|_| QueueError::NotServiced))
    }
}

pub struct BuildQueue<Req, Res> {
    name: &'static str,
    sender: mpsc::Sender<Envelope<Req, Res>>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl<Req, Res> BuildQueue<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    /// Spawns the worker. `capacity` bounds the number of pending requests.
    pub fn start<F, Fut>(
        name: &'static str,
        capacity: usize,
        cancel: CancellationToken,
        handler: F,
    ) -> Self
    where
        F: Fn(Req) -> Fut + Send + 'static,
        Fut: Future<Output = Res> + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::channel::<Envelope<Req, Res>>(capacity.max(1));
        let token = cancel.clone();

        let worker = tokio::spawn(async move {
            debug!(queue = name, capacity, "Queue worker started");
            let mut served = 0usize;
            loop {
                let envelope = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    next = receiver.recv() => match next {
                        Some(envelope) => envelope,
                        None => break,
                    },
                };

                let result = handler(envelope.request).await;
                served += 1;
                if envelope.reply.send(result).is_err() {
                    debug!(queue = name, "Requester went away before the result");
                }
            }
            info!(queue = name, served, "Queue worker stopped");
        });

        Self {
            name,
            sender,
            cancel,
            worker,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueues the request, waiting for room when the queue is full
    pub async fn submit(&self, request: Req) -> Result<ResultFuture<Res>, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Envelope { request, reply })
            .await
            .map_err(|_| QueueError::Closed(self.name))?;
        Ok(ResultFuture { rx })
    }

    /// Enqueues the request or fails right away when the queue is full
    pub fn try_submit(&self, request: Req) -> Result<ResultFuture<Res>, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .try_send(Envelope { request, reply })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => QueueError::Full(self.name),
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed(self.name),
            })?;
        Ok(ResultFuture { rx })
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stops the worker and waits for its current request to finish
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.worker.await;
    }
}

/// One task of a build to run
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub build: Build,
    pub task: String,
}

impl TaskRequest {
    pub fn new(build: Build, task: impl Into<String>) -> Self {
        Self {
            build,
            task: task.into(),
        }
    }
}

type TaskQueue = BuildQueue<TaskRequest, BuildStatus>;

/// Four queues, one per kind of work: builder tasks, in-process assembly
/// (Spectrum, Jib), packaging, and cluster-side publishing (S2I, Kaniko,
/// custom pods)
pub struct LocalBuilder {
    build: TaskQueue,
    assemble: TaskQueue,
    package: TaskQueue,
    publish: TaskQueue,
    interrupt: CancellationToken,
}

pub struct LocalBuilderDeps {
    pub cluster: Arc<dyn ClusterClient>,
    pub config: Arc<BuilderConfig>,
    pub registry: Arc<StepRegistry>,
    pub assembler: Arc<dyn ImageAssembler>,
    pub progress: Option<Arc<dyn ProgressHandler>>,
}

impl LocalBuilder {
    /// `cancel` governs the workers; running tasks are only interrupted
    /// through [`LocalBuilder::interrupt`]
    pub fn start(deps: LocalBuilderDeps, cancel: CancellationToken) -> Self {
        let deps = Arc::new(deps);
        let interrupt = CancellationToken::new();
        let capacity = deps.config.queue_capacity;

        let queue = |name: &'static str| {
            let deps = deps.clone();
            let interrupt = interrupt.clone();
            BuildQueue::start(name, capacity, cancel.clone(), move |req: TaskRequest| {
                let deps = deps.clone();
                let interrupt = interrupt.clone();
                async move {
                    let work_dir = deps.config.build_dir.join(&req.build.name);
                    let mut env = TaskEnv::new(
                        req.build,
                        deps.cluster.clone(),
                        deps.config.clone(),
                        deps.registry.clone(),
                    )
                    .with_assembler(deps.assembler.clone())
                    .with_work_dir(work_dir);
                    if let Some(progress) = &deps.progress {
                        env = env.with_progress(progress.clone());
                    }
                    run_task(&env, &req.task, &interrupt).await
                }
            })
        };

        Self {
            build: queue("build"),
            assemble: queue("assemble"),
            package: queue("package"),
            publish: queue("publish"),
            interrupt,
        }
    }

    pub async fn build(&self, req: TaskRequest) -> Result<ResultFuture<BuildStatus>, QueueError> {
        self.build.submit(req).await
    }

    pub async fn assemble(&self, req: TaskRequest) -> Result<ResultFuture<BuildStatus>, QueueError> {
        self.assemble.submit(req).await
    }

    pub async fn package(&self, req: TaskRequest) -> Result<ResultFuture<BuildStatus>, QueueError> {
        self.package.submit(req).await
    }

    pub async fn publish(&self, req: TaskRequest) -> Result<ResultFuture<BuildStatus>, QueueError> {
        self.publish.submit(req).await
    }

    /// Routes the request to the queue serving its task kind. Unknown task
    /// names go to the build queue, which reports them as errors.
    pub async fn submit(&self, req: TaskRequest) -> Result<ResultFuture<BuildStatus>, QueueError> {
        match req.build.task_by_name(&req.task) {
            Some(Task::Package(_)) => self.package(req).await,
            Some(Task::Spectrum(_) | Task::Jib(_)) => self.assemble(req).await,
            Some(Task::S2i(_) | Task::Kaniko(_) | Task::Custom(_)) => self.publish(req).await,
            Some(Task::Builder(_)) | None => self.build(req).await,
        }
    }

    /// Cancels running tasks, which end up `Interrupted`
    pub fn interrupt(&self) {
        self.interrupt.cancel();
    }

    pub async fn shutdown(self) {
        self.build.shutdown().await;
        self.assemble.shutdown().await;
        self.package.shutdown().await;
        self.publish.shutdown().await;
    }
}
