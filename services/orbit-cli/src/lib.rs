mod cli;
mod commands;
mod infra;

use orbit_assess::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
