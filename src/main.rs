use jarvis::config::{self, AppConfig};

fn main() -> anyhow::Result<()> {
    let dotenv = config::load_dotenv();
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .init();
    dotenv.log();
    tracing::info!(api = %config.api_base_url, "starting jarvis");

    dioxus::LaunchBuilder::new()
        .with_context(config)
        .launch(jarvis::ui::App);
    Ok(())
}
