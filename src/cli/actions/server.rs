use crate::api;
use crate::api::state::SiteConfig;
use crate::cli::actions::Action;
use anyhow::Result;
use std::path::PathBuf;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            base_url,
            data_dir,
            site_root,
            public_dir,
        } => {
            let config = SiteConfig::new(base_url)
                .with_data_dir(PathBuf::from(data_dir))
                .with_site_root(PathBuf::from(site_root))
                .with_public_root(PathBuf::from(public_dir));

            api::new(port, dsn, config).await?;
        }
    }

    Ok(())
}
