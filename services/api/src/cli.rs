use crate::demo::{run_demo, run_queue_report, DemoArgs, QueueReportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use review_queue::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Verification Review Queue",
    about = "Run and inspect the marketplace verification review queue",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Offline queue tooling
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },
    /// Run a seeded end-to-end walkthrough of SLA tracking and resolution
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum QueueCommand {
    /// Load pending submissions from CSV and print the ranked queue with SLA statistics
    Report(QueueReportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Disable the periodic SLA sweep
    #[arg(long)]
    pub(crate) no_sweep: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Queue {
            command: QueueCommand::Report(args),
        } => run_queue_report(args),
        Command::Demo(args) => run_demo(args),
    }
}
