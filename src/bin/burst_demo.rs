/// Fires a burst of concurrent requests through one gateway to observe that
/// an expired session is refreshed once and every request is replayed.
///
/// ⚠️ Requires an API server at `api.base_url` and a stored session:
///
/// ```text
/// cargo run -- login --access-token <expired> --refresh-token <valid>
/// cargo run --bin burst_demo -- /user/me 10
/// ```
///
/// With the `memory` backend the session does not survive between processes;
/// set `DEMO_ACCESS_TOKEN` and `DEMO_REFRESH_TOKEN` instead.

use futures_util::future::join_all;
use session_gateway::application_port::*;
use session_gateway::client::ApiClient;
use session_gateway::domain_model::*;
use session_gateway::logger::*;
use session_gateway::settings::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = Logger::new_bootstrap(LogFormat::Pretty);
    let project_settings = parse_settings(None)?;
    logger.reload_from_config(&LogConfig {
        filter: project_settings.log.filter.clone(),
    })?;

    let mut args = std::env::args().skip(1);
    let path = args.next().unwrap_or_else(|| "/user/me".to_string());
    let burst: usize = args.next().map(|n| n.parse::<usize>()).transpose()?.unwrap_or(10);

    let client = ApiClient::try_new(&project_settings).await?;
    if let (Ok(access), Ok(refresh)) = (
        std::env::var("DEMO_ACCESS_TOKEN"),
        std::env::var("DEMO_REFRESH_TOKEN"),
    ) {
        client
            .gateway
            .establish_session(TokenPair::new(access, refresh))
            .await?;
    }

    let mut logout_events = client.logout_events();
    let requests = (0..burst).map(|_| client.gateway.send(ApiRequest::get(path.clone())));
    let results = join_all(requests).await;

    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(response) => println!("#{:02} -> {}", i, response.status),
            Err(e) => println!("#{:02} -> error: {}", i, e),
        }
    }
    while let Ok(event) = logout_events.try_recv() {
        println!("logout: {} (redirect to {})", event.reason, event.redirect_to);
    }

    Ok(())
}
