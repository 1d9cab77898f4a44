//! tracing 기반 로깅 초기화.
//!
//! 평문 비밀번호와 원본 토큰은 어떤 레벨에서도 기록하지 않습니다.
//! 필드 이름은 `username`, `user_id`, `path`, `reason`을 공통으로 사용합니다.

use std::path::PathBuf;
use std::str::FromStr;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;
use crate::error::{WardenError, WardenResult};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 개발용
    #[default]
    Pretty,
    /// 로그 수집기용
    Json,
    Compact,
}

impl FromStr for LogFormat {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(WardenError::Config(format!("알 수 없는 로그 형식: {}", other))),
        }
    }
}

/// 구독자 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `EnvFilter` 지시문 (예: "info,warden_api=debug")
    pub filter: String,
    pub format: LogFormat,
    /// 파일명/줄 번호 출력
    pub with_file: bool,
    /// 설정되면 stdout과 함께 `<dir>/app.log.<날짜>`에도 기록 (일 단위 회전)
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::default(),
            with_file: false,
            dir: None,
        }
    }
}

impl LogConfig {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    /// `RUST_LOG`, `LOG_FORMAT` 환경 변수가 있으면 우선합니다.
    pub fn overridden_by_env(self) -> Self {
        self.overridden_by(|name| std::env::var(name).ok())
    }

    fn overridden_by(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(filter) = lookup("RUST_LOG").filter(|f| !f.is_empty()) {
            self.filter = filter;
        }
        if let Some(format) = lookup("LOG_FORMAT").and_then(|f| f.parse().ok()) {
            self.format = format;
        }
        self
    }
}

impl From<&LoggingConfig> for LogConfig {
    /// 형식 이름이 잘못되었으면 기본 형식을 사용합니다.
    fn from(config: &LoggingConfig) -> Self {
        let log = Self::new(config.level.clone())
            .with_format(config.format.parse().unwrap_or_default());
        match config.dir.as_deref().filter(|dir| !dir.is_empty()) {
            Some(dir) => log.with_dir(dir),
            None => log,
        }
    }
}

fn output_layer(config: &LogConfig) -> Box<dyn Layer<Registry> + Send + Sync + 'static> {
    let base = fmt::layer()
        .with_file(config.with_file)
        .with_line_number(config.with_file);

    match config.format {
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Json => base.json().boxed(),
        LogFormat::Compact => base.compact().boxed(),
    }
}

/// 로그 디렉터리가 설정된 경우의 파일 레이어. ANSI 색상 없이 기록합니다.
fn file_layer(
    config: &LogConfig,
) -> WardenResult<Option<Box<dyn Layer<Registry> + Send + Sync + 'static>>> {
    let Some(dir) = config.dir.as_ref() else {
        return Ok(None);
    };

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("app.log")
        .build(dir)
        .map_err(|e| {
            WardenError::Config(format!("로그 파일을 열 수 없음 {}: {}", dir.display(), e))
        })?;

    let base = fmt::layer()
        .with_writer(appender)
        .with_ansi(false)
        .with_target(true);

    Ok(Some(match config.format {
        LogFormat::Json => base.json().boxed(),
        _ => base.boxed(),
    }))
}

/// 전역 구독자를 설치합니다. 프로세스당 한 번만 성공합니다.
///
/// ```no_run
/// use warden_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("debug").with_format(LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> WardenResult<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| WardenError::Config(format!("잘못된 로그 필터 {:?}: {}", config.filter, e)))?;

    let mut layers = vec![output_layer(&config)];
    if let Some(file) = file_layer(&config)? {
        layers.push(file);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| WardenError::Internal(format!("로깅 초기화 실패: {}", e)))?;

    tracing::info!(
        format = ?config.format,
        filter = %config.filter,
        dir = ?config.dir,
        "Logging initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().unwrap_err().is_config());
    }

    #[test]
    fn test_from_logging_config() {
        let config = LoggingConfig {
            level: "warden_api=debug".to_string(),
            format: "json".to_string(),
            dir: Some("/var/log/warden".to_string()),
        };
        let log = LogConfig::from(&config);
        assert_eq!(log.filter, "warden_api=debug");
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.dir, Some(PathBuf::from("/var/log/warden")));

        let unknown = LoggingConfig {
            level: "info".to_string(),
            format: "fancy".to_string(),
            dir: Some(String::new()),
        };
        let log = LogConfig::from(&unknown);
        assert_eq!(log.format, LogFormat::Pretty);
        assert_eq!(log.dir, None);
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("RUST_LOG", "trace".to_string()),
            ("LOG_FORMAT", "compact".to_string()),
        ]);
        let log = LogConfig::new("info").overridden_by(|name| env.get(name).cloned());
        assert_eq!(log.filter, "trace");
        assert_eq!(log.format, LogFormat::Compact);

        let untouched = LogConfig::new("info")
            .with_format(LogFormat::Json)
            .overridden_by(|_| None);
        assert_eq!(untouched.filter, "info");
        assert_eq!(untouched.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let result = init_logging(LogConfig::new("warden_api=notalevel"));
        assert!(result.unwrap_err().is_config());
    }

    #[test]
    fn test_file_layer_only_with_dir() {
        assert!(file_layer(&LogConfig::new("info")).unwrap().is_none());

        let dir = std::env::temp_dir().join(format!("warden-logs-{}", std::process::id()));
        let log = LogConfig::new("info").with_dir(&dir);
        assert!(file_layer(&log).unwrap().is_some());
        assert!(dir.is_dir());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unwritable_log_dir_is_config_error() {
        let file = std::env::temp_dir().join(format!("warden-log-file-{}", std::process::id()));
        std::fs::write(&file, b"not a directory").unwrap();

        let result = file_layer(&LogConfig::new("info").with_dir(file.join("nested")));
        assert!(result.err().unwrap().is_config());

        let _ = std::fs::remove_file(&file);
    }
}
