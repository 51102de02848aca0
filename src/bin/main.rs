//! Binary entrypoint for the taskwise tool

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    taskwise::cli::run().await
}
