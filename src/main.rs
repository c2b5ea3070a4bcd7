#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = bankrisk_lib::run().await {
        log::error!("Fatal: {}", err.chain());
        std::process::exit(1);
    }
}
