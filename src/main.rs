use clap::Parser;
use dev_stats::api::Error;
use dev_stats_app::Args;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let stats = dev_stats_app::fetch_stats(args).await?;
    println!("{}", stats);

    Ok(())
}
