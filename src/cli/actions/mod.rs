pub mod server;

/// Actions the CLI can dispatch.
#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        base_url: String,
        data_dir: String,
        site_root: String,
        public_dir: String,
    },
}
