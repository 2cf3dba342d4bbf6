use turnstile::logger::*;
use turnstile::server::*;
use turnstile::settings::*;

// Walks one session through login, rotation and a replayed refresh token
// against the in-memory stores.
// $ cargo run --bin rotation_demo -- --settings=settings/dev.toml
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let logger = Logger::new_bootstrap();
    let project_settings = parse_settings(cli.settings.as_deref())?;
    logger.reload_from_config(&LogConfig {
        filter: project_settings.log.filter.clone(),
    })?;

    let server = Server::in_memory(&project_settings.auth);
    let auth = server.auth_service.clone();

    let account = auth.register("demo@example.com", "hunter2").await?;
    info!(account = %account.id, "registered");

    let first = auth.login("demo@example.com", "hunter2").await?;
    info!(expires_at = %first.refresh_token_expires_at, "logged in");

    let second = auth.rotate(&first.refresh_token.0).await?;
    let identity = auth.verify_access_token(&second.access_token.0).await?;
    info!(subject = %identity.subject, role = %identity.role, "rotated");

    match auth.rotate(&first.refresh_token.0).await {
        Ok(_) => error!("replayed refresh token was accepted"),
        Err(e) => info!(error = %e, "replay rejected"),
    }

    match auth.rotate(&second.refresh_token.0).await {
        Ok(_) => info!("successor still valid"),
        Err(e) => info!(error = %e, "successor revoked by reuse sweep"),
    }

    auth.logout(&second.refresh_token.0).await?;
    server.shutdown().await;
    Ok(())
}
