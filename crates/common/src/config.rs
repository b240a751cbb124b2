/// Process configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Ranking parameters file (TOML)
    pub ranker_config_path: String,

    // Concurrency
    pub workers: usize,

    // Master seed for the robustness Monte Carlo. `None` draws a fresh seed.
    pub seed: Option<u64>,

    // Rank without writing the daily pick.
    pub dry_run: bool,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let workers = optional_env("RANKER_WORKERS")
            .map(|v| {
                v.parse::<usize>().unwrap_or_else(|_| {
                    panic!("RANKER_WORKERS must be a positive integer, got: '{v}'")
                })
            })
            .unwrap_or(8)
            .max(1);

        let seed = optional_env("RANKER_SEED").map(|v| {
            v.parse::<u64>()
                .unwrap_or_else(|_| panic!("RANKER_SEED must be an unsigned integer, got: '{v}'"))
        });

        let dry_run = match optional_env("RANKER_DRY_RUN")
            .map(|v| v.to_lowercase())
            .as_deref()
        {
            None | Some("") | Some("0") | Some("false") | Some("no") => false,
            Some("1") | Some("true") | Some("yes") => true,
            Some(other) => panic!("RANKER_DRY_RUN must be 'true' or 'false', got: '{other}'"),
        };

        Config {
            database_url: required_env("DATABASE_URL"),
            ranker_config_path: optional_env("RANKER_CONFIG_PATH")
                .unwrap_or_else(|| "config/ranker.toml".to_string()),
            workers,
            seed,
            dry_run,
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
