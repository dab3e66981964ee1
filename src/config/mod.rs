//! Configuration module for the classroom hub.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::role::DEFAULT_MODERATOR_EMAIL;

pub const DEFAULT_NOTICE_LIMIT: usize = 3;
pub const DEFAULT_CHAT_LIMIT: usize = 50;
pub const DEFAULT_IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com";
pub const DEFAULT_MEAL_URL: &str = "https://open.neis.go.kr/hub/mealServiceDietInfo";

/// NEIS lookup settings. Office and school codes are required for a lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MealSettings {
    /// Education office code (ATPT_OFCDC_SC_CODE)
    pub office_code: Option<String>,
    /// School code (SD_SCHUL_CODE)
    pub school_code: Option<String>,
    pub api_key: Option<String>,
}

/// Window sizes for the bounded feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedLimits {
    pub notices: usize,
    pub chats: usize,
}

impl Default for FeedLimits {
    fn default() -> Self {
        Self {
            notices: DEFAULT_NOTICE_LIMIT,
            chats: DEFAULT_CHAT_LIMIT,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// The single identity allowed to post notices and lesson entries
    pub moderator_email: String,
    pub feed_limits: FeedLimits,
    /// Where students hand in assignments
    pub assignment_url: Option<String>,
    /// Identity Toolkit API key; sign-in fails with a provider error without it
    pub firebase_api_key: Option<String>,
    pub identity_url: String,
    pub meal: MealSettings,
    pub meal_url: String,
}

pub type ConfigError = Box<dyn std::error::Error + Send + Sync>;

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("CLASSROOM_DB_PATH")
            .unwrap_or_else(|_| "./data/classroom.sqlite".to_string())
            .into();

        let bind_addr = env::var("CLASSROOM_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| format!("Invalid CLASSROOM_BIND_ADDR format: {}", e))?;

        let log_level = env::var("CLASSROOM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let moderator_email = env::var("CLASSROOM_MODERATOR_EMAIL")
            .unwrap_or_else(|_| DEFAULT_MODERATOR_EMAIL.to_string());

        let feed_limits = FeedLimits {
            notices: parse_limit("CLASSROOM_NOTICE_LIMIT", DEFAULT_NOTICE_LIMIT)?,
            chats: parse_limit("CLASSROOM_CHAT_LIMIT", DEFAULT_CHAT_LIMIT)?,
        };

        let meal = MealSettings {
            office_code: non_empty_var("NEIS_OFFICE_CODE"),
            school_code: non_empty_var("NEIS_SCHOOL_CODE"),
            api_key: non_empty_var("NEIS_API_KEY"),
        };

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            moderator_email,
            feed_limits,
            assignment_url: non_empty_var("CLASSROOM_ASSIGNMENT_URL"),
            firebase_api_key: non_empty_var("FIREBASE_API_KEY"),
            identity_url: env::var("FIREBASE_AUTH_URL")
                .unwrap_or_else(|_| DEFAULT_IDENTITY_URL.to_string()),
            meal,
            meal_url: env::var("NEIS_MEAL_URL").unwrap_or_else(|_| DEFAULT_MEAL_URL.to_string()),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_limit(key: &str, default: usize) -> Result<usize, ConfigError> {
    let Some(raw) = non_empty_var(key) else {
        return Ok(default);
    };
    match raw.parse::<usize>() {
        Ok(0) => Err(format!("{} must be positive", key).into()),
        Ok(limit) if i64::try_from(limit).is_err() => {
            Err(format!("{} must be at most {}", key, i64::MAX).into())
        }
        Ok(limit) => Ok(limit),
        Err(e) => Err(format!("Invalid {}: {}", key, e).into()),
    }
}
