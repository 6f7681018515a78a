//! Application-level configuration loading: session timings and the seed question bank.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

use crate::dao::models::QuestionEntity;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_MASTER_CONFIG_PATH";

/// Timing and sizing rules applied to every session.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QuizSettings {
    /// Seconds on the clock when a question starts.
    pub time_limit_secs: u32,
    /// Period of one countdown tick.
    #[serde(rename = "tick_interval_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub tick_interval: Duration,
    /// Pause between locking an answer and scoring it.
    #[serde(rename = "reveal_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub reveal_delay: Duration,
    /// Pause between scoring a question and moving on.
    #[serde(rename = "display_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub display_delay: Duration,
    /// Entries shown on the leaderboard by default.
    pub leaderboard_limit: usize,
    /// Cap on questions per session; the whole pool when unset.
    pub questions_per_session: Option<usize>,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            time_limit_secs: 10,
            tick_interval: Duration::from_secs(1),
            reveal_delay: Duration::from_millis(500),
            display_delay: Duration::from_millis(1500),
            leaderboard_limit: 20,
            questions_per_session: None,
        }
    }
}

impl QuizSettings {
    /// Replace values that would stall or empty a session with their defaults.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let mut settings = self;

        if settings.time_limit_secs == 0 {
            warn!("time_limit_secs must be positive; using default");
            settings.time_limit_secs = defaults.time_limit_secs;
        }
        if settings.tick_interval.is_zero() {
            warn!("tick_interval_ms must be positive; using default");
            settings.tick_interval = defaults.tick_interval;
        }
        if settings.leaderboard_limit == 0 {
            warn!("leaderboard_limit must be positive; using default");
            settings.leaderboard_limit = defaults.leaderboard_limit;
        }
        if settings.questions_per_session == Some(0) {
            warn!("questions_per_session must be positive; using the whole pool");
            settings.questions_per_session = None;
        }

        settings
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    settings: QuizSettings,
    questions: Vec<QuestionEntity>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        questions = app_config.questions.len(),
                        time_limit_secs = app_config.settings.time_limit_secs,
                        "loaded quiz configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Session timing rules.
    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    /// Questions used to seed an empty backend.
    pub fn seed_questions(&self) -> &[QuestionEntity] {
        &self.questions
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings: QuizSettings::default(),
            questions: default_questions(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    quiz: QuizSettings,
    questions: Option<Vec<QuestionEntity>>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let questions = match value.questions {
            Some(questions) if !questions.is_empty() => questions,
            _ => default_questions(),
        };
        Self {
            settings: value.quiz.sanitized(),
            questions,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn question(id: &str, text: &str, options: [&str; 4], correct_option_index: usize) -> QuestionEntity {
    QuestionEntity {
        id: id.into(),
        text: text.into(),
        options: options.into_iter().map(String::from).collect(),
        correct_option_index,
    }
}

/// Built-in question bank shipped with the binary.
fn default_questions() -> Vec<QuestionEntity> {
    vec![
        question(
            "q1",
            "What is the official language for Android development?",
            ["Java", "Kotlin", "Dart", "Swift"],
            1,
        ),
        question(
            "q2",
            "Which architectural component survives configuration changes?",
            ["Activity", "Fragment", "ViewModel", "Intent"],
            2,
        ),
        question(
            "q3",
            "What is a 'coroutine'?",
            ["A thread", "A light-weight thread", "A function", "An Activity"],
            1,
        ),
        question(
            "q4",
            "What does 'MVVM' stand for?",
            [
                "Model-View-View-Model",
                "Model-View-ViewModel",
                "Main-View-ViewModel",
                "Model-Value-View-Model",
            ],
            1,
        ),
        question(
            "q5",
            "Which file defines app permissions?",
            [
                "build.gradle",
                "MainActivity.kt",
                "styles.xml",
                "AndroidManifest.xml",
            ],
            3,
        ),
    ]
}
