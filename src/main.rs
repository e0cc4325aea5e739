use feed_harvester::config::Config;
use feed_harvester::error::ScrapeError;
use feed_harvester::export;
use feed_harvester::login::TerminalConfirm;
use feed_harvester::provider::FeedProvider;
use feed_harvester::session::SessionStore;

#[tokio::main]
async fn main() -> feed_harvester::error::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::load("config.toml")?;
    tracing::info!(
        "starting feed harvester: {} posts from {}@{}",
        config.limit,
        config.user,
        config.provider
    );

    let sessions = SessionStore::new(&config.storage_dir);
    let provider = FeedProvider::by_name(&config.provider, sessions)
        .ok_or_else(|| ScrapeError::ConfigError(format!("Unknown provider '{}'", config.provider)))?;

    if config.login && provider.requires_login() {
        let confirmed = provider.login(&TerminalConfirm).await?;
        if !confirmed {
            tracing::error!("login was not confirmed, aborting the run");
            return Err(ScrapeError::LoginDenied.into());
        }
    }

    let result = provider
        .scrape(config.limit, &config.user, config.headless)
        .await?;
    tracing::info!("collected {} posts", result.posts.len());

    let path = export::write_result(&result, &config.results_dir)?;
    tracing::info!("done, results at {}", path.display());
    Ok(())
}
