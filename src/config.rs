use std::net::SocketAddr;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub bind: SocketAddr,
    pub session_minutes: i64,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let backend_url = lookup("SCHOOLHOUSE_BACKEND_URL")
            .unwrap_or_else(|| "http://localhost:8050".to_owned())
            .trim_end_matches('/')
            .to_owned();

        let bind = lookup("SCHOOLHOUSE_BIND")
            .unwrap_or_else(|| "0.0.0.0:8080".to_owned())
            .parse::<SocketAddr>()
            .context("SCHOOLHOUSE_BIND")?;

        let session_minutes = match lookup("SCHOOLHOUSE_SESSION_MINUTES") {
            Some(raw) => raw.parse::<i64>().context("SCHOOLHOUSE_SESSION_MINUTES")?,
            None => 30,
        };

        let secure_cookies = match lookup("SCHOOLHOUSE_SECURE_COOKIES") {
            Some(raw) => raw.parse::<bool>().context("SCHOOLHOUSE_SECURE_COOKIES")?,
            None => false,
        };

        Ok(Self { backend_url, bind, session_minutes, secure_cookies })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backend_url, "http://localhost:8050");
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.session_minutes, 30);
        assert!(!config.secure_cookies);
    }

    #[test]
    fn overrides_and_trailing_slash() {
        let config = Config::from_lookup(lookup(&[
            ("SCHOOLHOUSE_BACKEND_URL", "http://api.school.test:8050/"),
            ("SCHOOLHOUSE_BIND", "127.0.0.1:3000"),
            ("SCHOOLHOUSE_SESSION_MINUTES", "5"),
            ("SCHOOLHOUSE_SECURE_COOKIES", "true"),
        ]))
        .unwrap();
        assert_eq!(config.backend_url, "http://api.school.test:8050");
        assert_eq!(config.bind.port(), 3000);
        assert_eq!(config.session_minutes, 5);
        assert!(config.secure_cookies);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_lookup(lookup(&[("SCHOOLHOUSE_BIND", "nowhere")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SCHOOLHOUSE_SESSION_MINUTES", "soon")])).is_err());
    }
}
