mod cli;
mod infra;
mod routes;
mod server;
mod summary;

use quality_narrative::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
