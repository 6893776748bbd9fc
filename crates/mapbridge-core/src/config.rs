//! Configuration management for the mapbridge browser-map core.
//!
//! Every tunable threshold of the reducer, the update scheduler and the
//! callback channel lives here as a named field with a documented default.
//! Configuration can be loaded from YAML files, layered with environment
//! variable overrides, and validated before use.

use crate::error::{ConfigError, Result};
use crate::types::RouteCharacteristics;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Main application configuration.
///
/// # Examples
///
/// ```
/// use mapbridge_core::config::AppConfig;
///
/// let config = AppConfig::from_yaml("scheduler:\n  route_update_interval_ms: 2000\n").unwrap();
/// assert_eq!(config.scheduler.route_update_interval_ms, 2000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Position reduction thresholds
    #[serde(default)]
    pub reducer: ReducerConfig,

    /// Route and selection update loops
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Browser callback listener
    #[serde(default)]
    pub callback: CallbackConfig,

    /// Map view rendering and coordinate correction
    #[serde(default)]
    pub view: ViewConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML cannot be parsed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration using the `config` crate, layering an optional
    /// file with `MAPBRIDGE__SECTION__FIELD` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or merged.
    pub fn from_config_builder<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = config::Config::builder();
        let source_name = match path {
            Some(ref path) => {
                let path = path.as_ref();
                builder = builder.add_source(config::File::from(path).required(true));
                path.display().to_string()
            }
            None => "<environment>".to_string(),
        };

        let config = builder
            .add_source(
                config::Environment::with_prefix("MAPBRIDGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: source_name,
                reason: e.to_string(),
            })?;

        config.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<()> {
        self.reducer.validate()?;
        self.scheduler.validate()?;
        self.callback.validate()?;
        self.view.validate()?;
        self.logging.parse_level()?;
        Ok(())
    }
}

/// Inflation factor applied to the viewport from a given zoom level upwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomFactor {
    pub min_zoom: u32,
    pub factor: f64,
}

/// Thresholds for the position reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducerConfig {
    /// Positions per directions request for routes
    #[serde(default = "default_route_segment_length")]
    pub route_segment_length: usize,

    /// Positions per polyline chunk for tracks
    #[serde(default = "default_track_segment_length")]
    pub track_segment_length: usize,

    /// Markers per chunk for waypoint lists
    #[serde(default = "default_waypoint_segment_length")]
    pub waypoint_segment_length: usize,

    /// Render budget for routes
    #[serde(default = "default_maximum_route_position_count")]
    pub maximum_route_position_count: usize,

    /// Render budget for tracks
    #[serde(default = "default_maximum_track_position_count")]
    pub maximum_track_position_count: usize,

    /// Render budget for waypoint lists
    #[serde(default = "default_maximum_waypoint_position_count")]
    pub maximum_waypoint_position_count: usize,

    /// Render budget for waypoint lists drawn with description labels
    #[serde(default = "default_maximum_waypoint_description_count")]
    pub maximum_waypoint_description_count: usize,

    /// Render budget for selection markers
    #[serde(default = "default_maximum_selection_count")]
    pub maximum_selection_count: usize,

    /// Largest input the significance computation is run on
    #[serde(default = "default_maximum_significance_position_count")]
    pub maximum_significance_position_count: usize,

    /// Douglas-Peucker threshold in meters, indexed by zoom level.
    /// Zoom levels at or beyond the table length skip significance filtering.
    #[serde(default = "default_significance_thresholds")]
    pub significance_thresholds: Vec<f64>,

    /// Viewport inflation used when filtering rendered positions
    #[serde(default = "default_visible_area_factors")]
    pub visible_area_factors: Vec<ZoomFactor>,

    /// Viewport inflation used when filtering selected positions
    #[serde(default = "default_selection_visible_area_factor")]
    pub selection_visible_area_factor: f64,
}

fn default_route_segment_length() -> usize {
    8
}

fn default_track_segment_length() -> usize {
    35
}

fn default_waypoint_segment_length() -> usize {
    10
}

fn default_maximum_route_position_count() -> usize {
    30 * default_route_segment_length()
}

fn default_maximum_track_position_count() -> usize {
    50 * default_track_segment_length()
}

fn default_maximum_waypoint_position_count() -> usize {
    50 * default_waypoint_segment_length()
}

fn default_maximum_waypoint_description_count() -> usize {
    25 * default_waypoint_segment_length()
}

fn default_maximum_selection_count() -> usize {
    50
}

fn default_maximum_significance_position_count() -> usize {
    50_000
}

fn default_significance_thresholds() -> Vec<f64> {
    vec![
        120_000.0, 70_000.0, 40_000.0, 20_000.0, 10_000.0, // zoom 0-4
        2_700.0, 2_100.0, 1_500.0, 950.0, 400.0, // zoom 5-9
        200.0, 80.0, 40.0, 25.0, // zoom 10-13
        14.0, 10.0, 3.0, 1.0, // zoom 14-17
    ]
}

fn default_visible_area_factors() -> Vec<ZoomFactor> {
    vec![
        ZoomFactor {
            min_zoom: 0,
            factor: 0.5,
        },
        ZoomFactor {
            min_zoom: 7,
            factor: 1.25,
        },
        ZoomFactor {
            min_zoom: 13,
            factor: 2.5,
        },
    ]
}

fn default_selection_visible_area_factor() -> f64 {
    1.25
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            route_segment_length: default_route_segment_length(),
            track_segment_length: default_track_segment_length(),
            waypoint_segment_length: default_waypoint_segment_length(),
            maximum_route_position_count: default_maximum_route_position_count(),
            maximum_track_position_count: default_maximum_track_position_count(),
            maximum_waypoint_position_count: default_maximum_waypoint_position_count(),
            maximum_waypoint_description_count: default_maximum_waypoint_description_count(),
            maximum_selection_count: default_maximum_selection_count(),
            maximum_significance_position_count: default_maximum_significance_position_count(),
            significance_thresholds: default_significance_thresholds(),
            visible_area_factors: default_visible_area_factors(),
            selection_visible_area_factor: default_selection_visible_area_factor(),
        }
    }
}

impl ReducerConfig {
    /// Chunk size used when rendering the given characteristics.
    pub fn segment_length(&self, characteristics: RouteCharacteristics) -> usize {
        match characteristics {
            RouteCharacteristics::Route => self.route_segment_length,
            RouteCharacteristics::Track => self.track_segment_length,
            RouteCharacteristics::Waypoints => self.waypoint_segment_length,
        }
    }

    /// Render budget for the given characteristics.
    pub fn maximum_position_count(
        &self,
        characteristics: RouteCharacteristics,
        show_descriptions: bool,
    ) -> usize {
        match characteristics {
            RouteCharacteristics::Route => self.maximum_route_position_count,
            RouteCharacteristics::Track => self.maximum_track_position_count,
            RouteCharacteristics::Waypoints if show_descriptions => {
                self.maximum_waypoint_description_count
            }
            RouteCharacteristics::Waypoints => self.maximum_waypoint_position_count,
        }
    }

    /// First zoom level that skips significance filtering.
    pub fn significance_cutoff_zoom(&self) -> u32 {
        self.significance_thresholds.len() as u32
    }

    /// Significance threshold in meters, `None` at or above the cutoff.
    pub fn significance_threshold(&self, zoom: u32) -> Option<f64> {
        self.significance_thresholds.get(zoom as usize).copied()
    }

    /// Viewport inflation factor for the given zoom level.
    pub fn visible_area_factor(&self, zoom: u32) -> f64 {
        self.visible_area_factors
            .iter()
            .filter(|entry| entry.min_zoom <= zoom)
            .max_by_key(|entry| entry.min_zoom)
            .map(|entry| entry.factor)
            .unwrap_or(1.0)
    }

    /// Validates the reducer configuration.
    pub fn validate(&self) -> Result<()> {
        let segment_lengths = [
            ("reducer.route_segment_length", self.route_segment_length),
            ("reducer.track_segment_length", self.track_segment_length),
            ("reducer.waypoint_segment_length", self.waypoint_segment_length),
        ];
        for (field, value) in segment_lengths {
            if value < 2 {
                return Err(ConfigError::invalid_value(field, "must be at least 2").into());
            }
        }

        let budgets = [
            ("reducer.maximum_route_position_count", self.maximum_route_position_count),
            ("reducer.maximum_track_position_count", self.maximum_track_position_count),
            (
                "reducer.maximum_waypoint_position_count",
                self.maximum_waypoint_position_count,
            ),
            (
                "reducer.maximum_waypoint_description_count",
                self.maximum_waypoint_description_count,
            ),
            ("reducer.maximum_selection_count", self.maximum_selection_count),
            (
                "reducer.maximum_significance_position_count",
                self.maximum_significance_position_count,
            ),
        ];
        for (field, value) in budgets {
            if value < 2 {
                return Err(ConfigError::invalid_value(field, "must be at least 2").into());
            }
        }

        if self.significance_thresholds.is_empty() {
            return Err(ConfigError::invalid_value(
                "reducer.significance_thresholds",
                "must contain at least one zoom level",
            )
            .into());
        }
        if self
            .significance_thresholds
            .iter()
            .any(|t| !t.is_finite() || *t < 0.0)
        {
            return Err(ConfigError::invalid_value(
                "reducer.significance_thresholds",
                "thresholds must be non-negative meters",
            )
            .into());
        }

        let factors = self
            .visible_area_factors
            .iter()
            .map(|entry| entry.factor)
            .chain(std::iter::once(self.selection_visible_area_factor));
        for factor in factors {
            if !factor.is_finite() || factor < 0.0 {
                return Err(ConfigError::invalid_value(
                    "reducer.visible_area_factors",
                    format!("invalid inflation factor {}", factor),
                )
                .into());
            }
        }

        Ok(())
    }
}

/// Timing of the route and selection update loops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Route loop wake-up interval
    #[serde(default = "default_route_poll_interval")]
    pub route_poll_interval_ms: u64,

    /// Minimum time between rate-limited route pushes
    #[serde(default = "default_route_update_interval")]
    pub route_update_interval_ms: u64,

    /// Selection loop wake-up interval
    #[serde(default = "default_selection_poll_interval")]
    pub selection_poll_interval_ms: u64,

    /// Minimum time between rate-limited selection pushes
    #[serde(default = "default_selection_update_interval")]
    pub selection_update_interval_ms: u64,

    /// Bounded wait when joining the loops on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

fn default_route_poll_interval() -> u64 {
    1000
}

fn default_route_update_interval() -> u64 {
    5000
}

fn default_selection_poll_interval() -> u64 {
    250
}

fn default_selection_update_interval() -> u64 {
    500
}

fn default_shutdown_timeout() -> u64 {
    2000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            route_poll_interval_ms: default_route_poll_interval(),
            route_update_interval_ms: default_route_update_interval(),
            selection_poll_interval_ms: default_selection_poll_interval(),
            selection_update_interval_ms: default_selection_update_interval(),
            shutdown_timeout_ms: default_shutdown_timeout(),
        }
    }
}

impl SchedulerConfig {
    pub fn route_poll_interval(&self) -> Duration {
        Duration::from_millis(self.route_poll_interval_ms)
    }

    pub fn route_update_interval(&self) -> Duration {
        Duration::from_millis(self.route_update_interval_ms)
    }

    pub fn selection_poll_interval(&self) -> Duration {
        Duration::from_millis(self.selection_poll_interval_ms)
    }

    pub fn selection_update_interval(&self) -> Duration {
        Duration::from_millis(self.selection_update_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validates the scheduler configuration.
    pub fn validate(&self) -> Result<()> {
        if self.route_poll_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "scheduler.route_poll_interval_ms",
                "must be positive",
            )
            .into());
        }
        if self.selection_poll_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "scheduler.selection_poll_interval_ms",
                "must be positive",
            )
            .into());
        }
        Ok(())
    }
}

/// Browser callback listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Loopback address to bind
    #[serde(default = "default_callback_host")]
    pub host: String,

    /// Port to bind (0 picks an ephemeral port)
    #[serde(default)]
    pub port: u16,

    /// Timed accept; the loop re-checks its running flag after each timeout
    #[serde(default = "default_accept_timeout")]
    pub accept_timeout_ms: u64,

    /// Per-connection read timeout
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,

    /// Maximum concurrently processed connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Maximum size of a single request
    #[serde(default = "default_max_request_bytes")]
    pub max_request_bytes: usize,

    /// Time to wait for the first callback before falling back to polling
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Whether the polling fallback may be entered at all
    #[serde(default = "default_true")]
    pub polling_fallback: bool,

    /// Interval between polls in polling mode
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Script returning the browser's buffered callbacks
    #[serde(default = "default_poll_script")]
    pub poll_script: String,
}

fn default_true() -> bool {
    true
}

fn default_callback_host() -> String {
    "127.0.0.1".to_string()
}

fn default_accept_timeout() -> u64 {
    1000
}

fn default_read_timeout() -> u64 {
    2000
}

fn default_max_connections() -> usize {
    16
}

fn default_max_request_bytes() -> usize {
    64 * 1024
}

fn default_probe_timeout() -> u64 {
    5000
}

fn default_poll_interval() -> u64 {
    250
}

fn default_poll_script() -> String {
    "getCallbacks();".to_string()
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            host: default_callback_host(),
            port: 0,
            accept_timeout_ms: default_accept_timeout(),
            read_timeout_ms: default_read_timeout(),
            max_connections: default_max_connections(),
            max_request_bytes: default_max_request_bytes(),
            probe_timeout_ms: default_probe_timeout(),
            polling_fallback: true,
            poll_interval_ms: default_poll_interval(),
            poll_script: default_poll_script(),
        }
    }
}

impl CallbackConfig {
    /// Returns the listener bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validates the callback configuration.
    pub fn validate(&self) -> Result<()> {
        if self.host.parse::<std::net::IpAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "callback.host",
                format!("not an IP address: {}", self.host),
            )
            .into());
        }
        if self.max_connections == 0 {
            return Err(
                ConfigError::invalid_value("callback.max_connections", "must be positive").into(),
            );
        }
        if self.accept_timeout_ms == 0 || self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid_value(
                "callback.accept_timeout_ms",
                "timeouts and intervals must be positive",
            )
            .into());
        }
        Ok(())
    }
}

/// When to apply the datum-offset coordinate correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixMapMode {
    /// Correct inside the region only for map types with offset tiles
    #[default]
    Automatic,
    /// Always correct inside the region
    Always,
    /// Never correct
    Never,
}

/// Map view rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Coordinate correction policy
    #[serde(default)]
    pub fix_map_mode: FixMapMode,

    /// Map types whose tiles are offset inside the correction region
    #[serde(default = "default_offset_map_types")]
    pub offset_map_types: Vec<String>,

    /// Map type assumed until the browser reports one
    #[serde(default = "default_map_type")]
    pub initial_map_type: String,

    /// Attempts made while waiting for the map to initialize
    #[serde(default = "default_init_attempts")]
    pub init_attempts: u32,

    /// Delay before the second attempt, doubled after each failure
    #[serde(default = "default_init_backoff")]
    pub init_backoff_ms: u64,

    /// Polyline color for routes and tracks
    #[serde(default = "default_route_color")]
    pub route_color: String,

    /// Polyline width in pixels for tracks
    #[serde(default = "default_track_width")]
    pub track_width: u32,

    /// Whether waypoint markers carry description labels
    #[serde(default)]
    pub show_waypoint_descriptions: bool,
}

fn default_offset_map_types() -> Vec<String> {
    vec!["roadmap".to_string(), "terrain".to_string()]
}

fn default_map_type() -> String {
    "roadmap".to_string()
}

fn default_init_attempts() -> u32 {
    5
}

fn default_init_backoff() -> u64 {
    100
}

fn default_route_color() -> String {
    "#C86DE1".to_string()
}

fn default_track_width() -> u32 {
    2
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            fix_map_mode: FixMapMode::Automatic,
            offset_map_types: default_offset_map_types(),
            initial_map_type: default_map_type(),
            init_attempts: default_init_attempts(),
            init_backoff_ms: default_init_backoff(),
            route_color: default_route_color(),
            track_width: default_track_width(),
            show_waypoint_descriptions: false,
        }
    }
}

impl ViewConfig {
    pub fn init_backoff(&self) -> Duration {
        Duration::from_millis(self.init_backoff_ms)
    }

    /// Validates the view configuration.
    pub fn validate(&self) -> Result<()> {
        if self.init_attempts == 0 {
            return Err(
                ConfigError::invalid_value("view.init_attempts", "must be positive").into(),
            );
        }
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "text" or "json"
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| {
            ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("Invalid log level: {}", self.level),
            }
            .into()
        })
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.reducer.track_segment_length, 35);
        assert_eq!(config.reducer.maximum_track_position_count, 1750);
        assert_eq!(config.reducer.significance_cutoff_zoom(), 18);
        assert_eq!(config.scheduler.route_update_interval(), Duration::from_secs(5));
        assert_eq!(
            config.scheduler.selection_update_interval(),
            Duration::from_millis(500)
        );
        assert_eq!(config.callback.bind_address(), "127.0.0.1:0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_thresholds_decrease_with_zoom() {
        let config = ReducerConfig::default();
        let thresholds = &config.significance_thresholds;
        assert!(thresholds.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(config.significance_threshold(0), Some(120_000.0));
        assert_eq!(config.significance_threshold(17), Some(1.0));
        assert_eq!(config.significance_threshold(18), None);
    }

    #[test]
    fn test_visible_area_factor_bands() {
        let config = ReducerConfig::default();
        assert_eq!(config.visible_area_factor(0), 0.5);
        assert_eq!(config.visible_area_factor(6), 0.5);
        assert_eq!(config.visible_area_factor(7), 1.25);
        assert_eq!(config.visible_area_factor(21), 2.5);
    }

    #[test]
    fn test_maximum_position_count() {
        let config = ReducerConfig::default();
        assert_eq!(
            config.maximum_position_count(RouteCharacteristics::Waypoints, false),
            500
        );
        assert_eq!(
            config.maximum_position_count(RouteCharacteristics::Waypoints, true),
            250
        );
        assert_eq!(
            config.maximum_position_count(RouteCharacteristics::Route, true),
            240
        );
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
reducer:
  track_segment_length: 40
  maximum_track_position_count: 50
scheduler:
  route_update_interval_ms: 2500
callback:
  port: 8765
  polling_fallback: false
view:
  fix_map_mode: always
logging:
  level: debug
  format: json
"#;

        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.reducer.track_segment_length, 40);
        assert_eq!(config.reducer.route_segment_length, 8);
        assert_eq!(config.scheduler.route_update_interval_ms, 2500);
        assert_eq!(config.callback.port, 8765);
        assert!(!config.callback.polling_fallback);
        assert_eq!(config.view.fix_map_mode, FixMapMode::Always);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "scheduler:\n  selection_update_interval_ms: 750").unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.scheduler.selection_update_interval_ms, 750);

        let missing = AppConfig::from_file("/nonexistent/mapbridge.yaml");
        assert!(missing.is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.reducer.track_segment_length = 1;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.reducer.significance_thresholds.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scheduler.route_poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.callback.host = "localhost".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }
}
