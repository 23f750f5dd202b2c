use crate::demo::{run_demo, run_recommend, DemoArgs, RecommendArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use ticket_reflect::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "ticket-reflect",
    about = "Serve or try out the reflective ticket recommendation engine",
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
    /// Produce a recommendation for a single travel request
    Recommend(RecommendArgs),
    /// Run the sample conversations through the refinement loop
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Recommend(args) => run_recommend(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
