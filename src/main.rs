use anyhow::anyhow;
use session_gateway::application_port::*;
use session_gateway::client::ApiClient;
use session_gateway::domain_model::*;
use session_gateway::logger::*;
use session_gateway::settings::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap(cli.log_format);

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let client = ApiClient::try_new(&project_settings).await?;

    match cli.command {
        Command::Login {
            access_token,
            refresh_token,
        } => {
            client
                .gateway
                .establish_session(TokenPair::new(access_token, refresh_token))
                .await?;
            println!("session stored");
        }
        Command::Logout => {
            client.gateway.logout().await?;
            println!("session cleared");
        }
        Command::Status => match client.session_store.access_token().await? {
            Some(token) => println!("signed in (access token {})", token.fingerprint()),
            None => println!("signed out"),
        },
        Command::Request { method, path, data } => {
            let mut logout_events = client.logout_events();
            let method = method
                .to_uppercase()
                .parse::<reqwest::Method>()
                .map_err(|e| anyhow!("invalid method {:?}: {}", method, e))?;
            let mut request = ApiRequest::new(method, path);
            if let Some(data) = data {
                let body: serde_json::Value = serde_json::from_str(&data)?;
                request = request.json(&body)?;
            }

            match client.gateway.send(request).await {
                Ok(response) => {
                    println!("{}", response.status);
                    println!("{}", response.text());
                }
                Err(e) => {
                    if let Ok(event) = logout_events.try_recv() {
                        warn!(reason = %event.reason, "signed out, sign in again at {}", event.redirect_to);
                    }
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
