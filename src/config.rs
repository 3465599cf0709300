use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub page_size: i64,
    pub jwt: JwtConfig,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            access_ttl_minutes: env_or("ACCESS_TOKEN_TTL_MINUTES", 5),
            refresh_ttl_minutes: env_or("REFRESH_TOKEN_TTL_MINUTES", 60 * 24),
        };
        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: env_or("APP_PORT", 3001),
            page_size: env_or("PAGE_SIZE", 5).max(1),
            jwt,
        })
    }

    /// Config for a given database with stock defaults, used by tooling and tests.
    pub fn with_database(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".into(),
            port: 3001,
            page_size: 5,
            jwt: JwtConfig {
                secret: jwt_secret.into(),
                access_ttl_minutes: 5,
                refresh_ttl_minutes: 60 * 24,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_database_uses_defaults() {
        let config = AppConfig::with_database("sqlite::memory:", "secret");
        assert_eq!(config.page_size, 5);
        assert_eq!(config.jwt.access_ttl_minutes, 5);
        assert_eq!(config.jwt.refresh_ttl_minutes, 1440);
        assert_eq!(config.jwt.secret, "secret");
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        std::env::set_var("BLOG_TEST_GARBAGE_PORT", "not-a-port");
        assert_eq!(env_or::<u16>("BLOG_TEST_GARBAGE_PORT", 8080), 8080);
        std::env::set_var("BLOG_TEST_GOOD_PORT", "9000");
        assert_eq!(env_or::<u16>("BLOG_TEST_GOOD_PORT", 8080), 9000);
    }
}
