use super::server::ServerConfig;
use std::time::Duration;
use anyhow::bail;
use clap::Parser;

/// Настройки демо-бинарника: аргументы командной строки или переменные окружения.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "conveyor",
    version,
    about = "Concurrency demos: channels, worker pools, fan-in and an HTTP server"
)]
pub struct CliArgs {
    /// Адрес HTTP сервера.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Сколько секунд сервер работает без сигнала завершения.
    ///
    /// Environment variable: `DEMO_RUN_SECS`
    #[arg(long, env = "DEMO_RUN_SECS", default_value_t = 120)]
    pub run_secs: u64,

    /// Environment variable: `SLOW_DELAY_MS`
    #[arg(long, env = "SLOW_DELAY_MS", default_value_t = 2000)]
    pub slow_delay_ms: u64,

    /// Environment variable: `ROOT_DELAY_MS`
    #[arg(long, env = "ROOT_DELAY_MS", default_value_t = 50)]
    pub root_delay_ms: u64,

    /// Сколько ждать текущие запросы при остановке сервера.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 10)]
    pub shutdown_timeout_secs: u64,

    /// Сразу запустить сервер, без консольных демо.
    ///
    /// Environment variable: `SKIP_DEMOS`
    #[arg(long, env = "SKIP_DEMOS", default_value_t = false)]
    pub skip_demos: bool,

    /// Фильтр логов в синтаксисе `EnvFilter`; по умолчанию берется `RUST_LOG`.
    ///
    /// Environment variable: `LOG_FILTER`
    #[arg(long, env = "LOG_FILTER")]
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_addr: String,
    pub run_for: Duration,
    pub shutdown_timeout: Duration,
    pub skip_demos: bool,
    pub log_filter: Option<String>,
    pub server: ServerConfig,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.shutdown_timeout_secs == 0 {
            bail!("shutdown_timeout_secs must be greater than zero");
        }
        if args.server_addr.trim().is_empty() {
            bail!("server_addr must not be empty");
        }

        Ok(Self {
            server_addr: args.server_addr,
            run_for: Duration::from_secs(args.run_secs),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
            skip_demos: args.skip_demos,
            log_filter: args.log_filter,
            server: ServerConfig {
                root_delay: Duration::from_millis(args.root_delay_ms),
                slow_delay: Duration::from_millis(args.slow_delay_ms),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let args = CliArgs::try_parse_from(["conveyor"]).unwrap();
        let config = AppConfig::try_from(args).unwrap();

        assert_eq!(config.run_for, Duration::from_secs(120));
        assert_eq!(config.server.slow_delay, Duration::from_secs(2));
        assert_eq!(config.server.root_delay, Duration::from_millis(50));
        assert!(!config.skip_demos);
    }

    #[test]
    fn zero_shutdown_timeout_is_rejected() {
        let args =
            CliArgs::try_parse_from(["conveyor", "--shutdown-timeout-secs", "0"]).unwrap();
        assert!(AppConfig::try_from(args).is_err());
    }
}
