use radio_playlist_updater::config::Config;

/// Config pointing every endpoint at a mock server. `extra` is appended
/// as raw TOML.
pub fn config_for(base: &str, extra: &str) -> Config {
    let s = format!(
        r#"
auth_url = "{base}/api/token"
api_base = "{base}"
refresh_token = "refresh-value"
client_id = "cid"
client_secret = "csecret"
user_id = "u"
playlist_id = "p"
market = "CA"
broadcast_history_url = "{base}/history"
{extra}
"#,
        base = base,
        extra = extra
    );
    toml::from_str(&s).expect("test config")
}
