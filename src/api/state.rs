//! Site configuration and shared per-process state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::email::Mailer;
use super::handlers::auth::identity::IdentityProvider;
use super::handlers::auth::session::SessionStore;
use super::handlers::content::images::ImageResolver;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 4 * 60 * 60;

#[derive(Clone, Debug)]
pub struct SiteConfig {
    base_url: String,
    data_dir: PathBuf,
    site_root: PathBuf,
    public_root: PathBuf,
    session_ttl_seconds: i64,
}

impl SiteConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            data_dir: PathBuf::from("data"),
            site_root: PathBuf::from("."),
            public_root: PathBuf::from("public"),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = data_dir;
        self
    }

    #[must_use]
    pub fn with_site_root(mut self, site_root: PathBuf) -> Self {
        self.site_root = site_root;
        self
    }

    #[must_use]
    pub fn with_public_root(mut self, public_root: PathBuf) -> Self {
        self.public_root = public_root;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn site_root(&self) -> &Path {
        &self.site_root
    }

    #[must_use]
    pub fn public_root(&self) -> &Path {
        &self.public_root
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    /// Only mark cookies secure when the site is served over HTTPS.
    #[must_use]
    pub fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

pub struct AppState {
    config: SiteConfig,
    sessions: Arc<dyn SessionStore>,
    identity: Arc<dyn IdentityProvider>,
    mailer: Mailer,
    images: ImageResolver,
}

impl AppState {
    pub fn new(
        config: SiteConfig,
        sessions: Arc<dyn SessionStore>,
        identity: Arc<dyn IdentityProvider>,
        mailer: Mailer,
        images: ImageResolver,
    ) -> Self {
        Self {
            config,
            sessions,
            identity,
            mailer,
            images,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub(crate) fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    pub(crate) fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn mailer(&self) -> &Mailer {
        &self.mailer
    }

    #[must_use]
    pub fn images(&self) -> &ImageResolver {
        &self.images
    }
}

#[cfg(test)]
mod tests {
    use super::SiteConfig;
    use std::path::PathBuf;

    #[test]
    fn site_config_defaults_and_overrides() {
        let config = SiteConfig::new("https://jollychildren.edu/".to_string());

        assert_eq!(config.base_url(), "https://jollychildren.edu");
        assert_eq!(config.data_dir(), PathBuf::from("data").as_path());
        assert_eq!(
            config.session_ttl_seconds(),
            super::DEFAULT_SESSION_TTL_SECONDS
        );
        assert!(config.session_cookie_secure());

        let config = config
            .with_data_dir(PathBuf::from("/srv/data"))
            .with_site_root(PathBuf::from("/srv/site"))
            .with_public_root(PathBuf::from("/srv/public"))
            .with_session_ttl_seconds(60);

        assert_eq!(config.data_dir(), PathBuf::from("/srv/data").as_path());
        assert_eq!(config.site_root(), PathBuf::from("/srv/site").as_path());
        assert_eq!(config.public_root(), PathBuf::from("/srv/public").as_path());
        assert_eq!(config.session_ttl_seconds(), 60);
    }

    #[test]
    fn plain_http_base_url_keeps_cookies_insecure() {
        let config = SiteConfig::new("http://localhost:8080".to_string());
        assert!(!config.session_cookie_secure());
    }
}
