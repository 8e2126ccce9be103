use crate::commands::{
    run_assess, run_batch, run_codes, run_interpret, run_pack, run_quality, run_refresh,
    AssessArgs, BatchArgs, InterpretArgs, PackArgs, QualityArgs, RefreshArgs,
};
use clap::{Parser, Subcommand};
use orbit_assess::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "orbit-assess",
    about = "Assess and reconcile catalog orbits against the external fitters",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full assessment for one or more designations
    Assess(AssessArgs),
    /// Assess a list of designations with bounded concurrency and report by band
    Batch(BatchArgs),
    /// Re-classify stored orbits without running any fitter
    Refresh(RefreshArgs),
    /// Interpret a saved fitter payload and print the canonical outcome
    Interpret(InterpretArgs),
    /// Summarize and classify element sets from a JSON file
    Quality(QualityArgs),
    /// Print the status code table
    Codes,
    /// Print packed form, fitter name and class for designations
    Pack(PackArgs),
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Assess(args) => run_assess(args),
        Command::Batch(args) => run_batch(args).await,
        Command::Refresh(args) => run_refresh(args),
        Command::Interpret(args) => run_interpret(args),
        Command::Quality(args) => run_quality(args),
        Command::Codes => {
            run_codes();
            Ok(())
        }
        Command::Pack(args) => run_pack(args),
    }
}
