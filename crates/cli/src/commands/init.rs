use std::path::Path;

use overtone_core::config::{
    DatabaseConfig, OvertoneConfig, OvertoneSection, SessionConfig, SpotifyConfig,
};
use overtone_core::crypto;
use tracing::info;

/// Run the `init` command: create the data directory, write a starter
/// config, and generate the token encryption key.
pub fn run(config_path: &str, data_dir: &str) -> anyhow::Result<()> {
    let data_path = Path::new(data_dir);

    if !data_path.exists() {
        std::fs::create_dir_all(data_path)?;
        info!("Created data directory: {}", data_dir);
    }

    let key_path = data_path.join("token.key");
    if !key_path.exists() {
        let key = crypto::generate_key();
        std::fs::write(&key_path, key)?;
        info!("Generated token encryption key: {}", key_path.display());
    }

    let config_file = Path::new(config_path);
    if config_file.exists() {
        println!("Config {config_path} already exists, leaving it in place");
        return Ok(());
    }

    let db_path = data_path.join("overtone.db");
    let config = OvertoneConfig {
        overtone: OvertoneSection {
            data_dir: data_dir.to_string(),
            frontend_url: "http://localhost:4200".into(),
            database: DatabaseConfig {
                path: Some(db_path.to_string_lossy().to_string()),
            },
        },
        spotify: SpotifyConfig {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:8080/api/auth/callback".into(),
            authorize_url: "https://accounts.spotify.com/authorize".into(),
            token_url: "https://accounts.spotify.com/api/token".into(),
            api_base_url: "https://api.spotify.com/v1".into(),
            access_token_skew_seconds: 60,
            refresh_retry_attempts: 2,
        },
        session: SessionConfig {
            secret: hex_encode(&crypto::generate_key()),
            issuer: "overtone".into(),
            audience: "overtone-client".into(),
            access_ttl_minutes: 60,
            refresh_ttl_days: 30,
        },
    };

    std::fs::write(config_file, toml::to_string_pretty(&config)?)?;
    println!("Wrote {config_path}");
    println!("Fill in spotify.client_id and spotify.client_secret, then run `overtone serve`.");

    Ok(())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_config_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let config_path = dir.path().join("overtone.toml");

        run(
            config_path.to_str().unwrap(),
            data_dir.to_str().unwrap(),
        )
        .unwrap();

        let key = std::fs::read(data_dir.join("token.key")).unwrap();
        assert_eq!(key.len(), 32);

        let config = OvertoneConfig::load(&config_path).unwrap();
        assert_eq!(config.session.secret.len(), 64);
        assert!(config.spotify.client_id.is_empty());
    }

    #[test]
    fn init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let config_path = dir.path().join("overtone.toml");

        run(config_path.to_str().unwrap(), data_dir.to_str().unwrap()).unwrap();
        let key_before = std::fs::read(data_dir.join("token.key")).unwrap();
        let config_before = std::fs::read_to_string(&config_path).unwrap();

        run(config_path.to_str().unwrap(), data_dir.to_str().unwrap()).unwrap();
        assert_eq!(
            std::fs::read(data_dir.join("token.key")).unwrap(),
            key_before
        );
        assert_eq!(
            std::fs::read_to_string(&config_path).unwrap(),
            config_before
        );
    }
}
