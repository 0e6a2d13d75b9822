use super::wiring::{build_autorenew_service, load_settings};
use clap::Args;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Args)]
pub struct RenewCommand {
    /// Database connection URL
    #[arg(long, env = "CDN_DATABASE_URL")]
    pub database_url: String,

    /// YAML settings file
    #[arg(long, env = "CDN_CONFIG")]
    pub config: Option<PathBuf>,

    /// User recorded as the requester of the batch
    #[arg(long, default_value = "cli")]
    pub user: String,
}

impl RenewCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let settings = load_settings(self.config.as_deref())?;

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async move {
            debug!("Initializing database connection...");
            let db = cdn_database::establish_connection(&self.database_url).await?;
            let service = build_autorenew_service(settings, db)?;

            let summary = service.run_once(&self.user).await?;
            info!(
                "Renewal batch {} finished with {} failure(s)",
                summary.batch_id,
                summary.failures()
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        })
    }
}
