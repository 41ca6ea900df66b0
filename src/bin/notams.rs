use paa_scraper::config::Config;
use paa_scraper::runner;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load();
    let code = runner::run_notams(config).await;
    std::process::exit(code);
}
