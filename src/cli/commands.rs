use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Image build engine for integration kits
#[derive(Parser, Debug)]
#[command(
    name = "kitbuilder",
    about = "Image build engine for integration kits",
    version,
    author,
    long_about = "kitbuilder runs the build pipeline of an integration kit: it generates and \
                  packages the maven project, picks an incremental base image among the \
                  images already published, and publishes the result through S2I, Kaniko, \
                  Jib or an in-process assembler."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        help = "Verbose output (debug level logging)"
    )]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run a build, or a single task of it",
        long_about = "Loads a build definition (YAML) and runs its tasks in order, or only \
                      the task named by --task. The final status is printed as JSON.\n\n\
                      Examples:\n  \
                      kitbuilder run build.yaml\n  \
                      kitbuilder run build.yaml --task builder\n  \
                      kitbuilder run build.yaml --catalog catalog.yaml --wait-timeout 10m"
    )]
    Run(RunArgs),

    #[command(
        about = "List registered build steps",
        long_about = "Prints every registered step with its phase, in registration order.\n\n\
                      Examples:\n  \
                      kitbuilder steps\n  \
                      kitbuilder steps --json"
    )]
    Steps(StepsArgs),

    #[command(
        about = "Pick the base image for a set of artifacts",
        long_about = "Runs incremental base image selection against the published images \
                      of a catalog file and prints the chosen base and the artifacts still \
                      to be layered on top of it.\n\n\
                      Examples:\n  \
                      kitbuilder select --catalog catalog.yaml --artifacts artifacts.yaml"
    )]
    Select(SelectArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    #[arg(value_name = "BUILD", help = "Build definition file (YAML)")]
    pub build: PathBuf,

    #[arg(long, value_name = "NAME", help = "Run only this task")]
    pub task: Option<String>,

    #[arg(
        long,
        value_name = "DURATION",
        help = "Maximum time to wait for cluster-side builds (e.g. 90s, 5m)"
    )]
    pub wait_timeout: Option<String>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Catalog file with published images and runtime catalogs"
    )]
    pub catalog: Option<PathBuf>,

    #[arg(
        long,
        value_name = "DIR",
        help = "Directory holding secrets as <secret>/<key> files"
    )]
    pub secrets_dir: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Root directory for build working dirs")]
    pub build_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct StepsArgs {
    #[arg(long, help = "Print as JSON")]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct SelectArgs {
    #[arg(long, value_name = "FILE", help = "Catalog file with published images")]
    pub catalog: PathBuf,

    #[arg(
        long,
        value_name = "FILE",
        help = "Required artifacts (YAML list of id/location/target/checksum)"
    )]
    pub artifacts: PathBuf,

    #[arg(long, value_name = "IMAGE", help = "Fallback base image")]
    pub base_image: Option<String>,
}
