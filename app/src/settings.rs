//! Compile-time defaults loaded via `toml-cfg` from `cfg.toml`.
//!
//! Values are kept as strings so the run-time overrides in `lib.rs` can
//! share one parsing path.

#[toml_cfg::toml_config]
pub struct Settings {
    #[default("127.0.0.1")]
    pub server: &'static str,
    #[default("5160")]
    pub port: &'static str,
    #[default("100")]
    pub username: &'static str,
    #[default("")]
    pub password: &'static str,
    #[default("Test Client")]
    pub display_name: &'static str,
    #[default("127.0.0.1:5160")]
    pub local_addr: &'static str,
    #[default("sip-register")]
    pub user_agent: &'static str,
    #[default("3600")]
    pub expires: &'static str,
    #[default("5")]
    pub timeout_secs: &'static str,
}
