use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use crate::animation::AnimationTiming;
use crate::planner::LayoutConfig;
use crate::report::ReportOptions;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub calculation: CalculationConfig,
    pub layout: LayoutSettings,
    pub animation: AnimationSettings,
    pub report: ReportSettings,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            calculation: CalculationConfig::from_env(),
            layout: LayoutSettings::from_env(),
            animation: AnimationSettings::from_env(),
            report: ReportSettings::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "SEA_FREIGHT_API_HOST";
    const PORT_VAR: &'static str = "SEA_FREIGHT_API_PORT";

    fn from_env() -> Self {
        let (bind_ip, display_host) = parse_host(env_string(Self::HOST_VAR));
        let port = parse_port(env_string(Self::PORT_VAR));
        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    /// Checks whether the hostname matches the default value.
    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_ip: Self::DEFAULT_BIND_IP,
            display_host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
        }
    }
}

fn parse_host(raw: Option<String>) -> (IpAddr, String) {
    let Some(host) = raw else {
        return (ApiConfig::DEFAULT_BIND_IP, ApiConfig::DEFAULT_HOST.to_string());
    };
    match host.parse::<IpAddr>() {
        Ok(ip) => (ip, host),
        Err(err) => {
            tracing::warn!(
                "Could not parse {} ('{}'): {}. Using {}.",
                ApiConfig::HOST_VAR,
                host,
                err,
                ApiConfig::DEFAULT_HOST
            );
            (ApiConfig::DEFAULT_BIND_IP, ApiConfig::DEFAULT_HOST.to_string())
        }
    }
}

fn parse_port(raw: Option<String>) -> u16 {
    match raw {
        Some(raw) => match raw.parse::<u16>() {
            Ok(value) if value != 0 => value,
            Ok(_) => {
                tracing::warn!(
                    "{} must not be 0. Using {}.",
                    ApiConfig::PORT_VAR,
                    ApiConfig::DEFAULT_PORT
                );
                ApiConfig::DEFAULT_PORT
            }
            Err(err) => {
                tracing::warn!(
                    "Could not parse {} ('{}'): {}. Using {}.",
                    ApiConfig::PORT_VAR,
                    raw,
                    err,
                    ApiConfig::DEFAULT_PORT
                );
                ApiConfig::DEFAULT_PORT
            }
        },
        None => ApiConfig::DEFAULT_PORT,
    }
}

/// Which calculation backend to use and how to reach the remote one.
#[derive(Clone, Debug, PartialEq)]
pub struct CalculationConfig {
    endpoint: Option<String>,
    use_remote: bool,
    timeout: Duration,
}

impl CalculationConfig {
    pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;
    const ENDPOINT_VAR: &'static str = "SEA_FREIGHT_REMOTE_ENDPOINT";
    const USE_REMOTE_VAR: &'static str = "SEA_FREIGHT_USE_REMOTE";
    const TIMEOUT_VAR: &'static str = "SEA_FREIGHT_REMOTE_TIMEOUT_SECS";

    fn from_env() -> Self {
        let endpoint = env_string(Self::ENDPOINT_VAR);
        let use_remote = env_string(Self::USE_REMOTE_VAR)
            .and_then(|raw| parse_bool(&raw, Self::USE_REMOTE_VAR))
            .unwrap_or(endpoint.is_some());
        let timeout = load_f64_with_warning(
            Self::TIMEOUT_VAR,
            Self::DEFAULT_TIMEOUT_SECS,
            |value| value > 0.0 && value <= 300.0,
            "must be between 0 and 300 seconds",
            "Remote calculation timeout adjusted",
        );
        if use_remote && endpoint.is_none() {
            tracing::warn!(
                "{} is enabled but {} is not set. Using the local calculator.",
                Self::USE_REMOTE_VAR,
                Self::ENDPOINT_VAR
            );
        }
        Self {
            endpoint,
            use_remote,
            timeout: Duration::from_secs_f64(timeout),
        }
    }

    /// Configuration for a remote backend at `endpoint`.
    pub fn remote(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            use_remote: true,
            timeout,
        }
    }

    /// Endpoint to call, or `None` when the local calculator is used.
    pub fn remote_endpoint(&self) -> Option<&str> {
        if self.use_remote {
            self.endpoint.as_deref()
        } else {
            None
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for CalculationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            use_remote: false,
            timeout: Duration::from_secs_f64(Self::DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Slot grid settings for the placement planner.
#[derive(Clone, Debug, Default)]
pub struct LayoutSettings {
    layout: LayoutConfig,
}

impl LayoutSettings {
    const MAX_SLOT_SIZE_VAR: &'static str = "SEA_FREIGHT_LAYOUT_MAX_SLOT_SIZE";
    const SPACING_VAR: &'static str = "SEA_FREIGHT_LAYOUT_SPACING";
    const MAX_SLOTS_VAR: &'static str = "SEA_FREIGHT_LAYOUT_MAX_SLOTS";
    const MAX_SLOTS_CEILING: f64 = 100_000.0;

    fn from_env() -> Self {
        let max_slot_size = load_f64_with_warning(
            Self::MAX_SLOT_SIZE_VAR,
            LayoutConfig::DEFAULT_MAX_SLOT_SIZE,
            |value| value >= LayoutConfig::MIN_SLOT_SIZE,
            "must be at least 10 mm",
            "Adjusted slot size changes how many units fit the grid",
        );
        let spacing = load_f64_with_warning(
            Self::SPACING_VAR,
            LayoutConfig::DEFAULT_SPACING,
            |value| value >= 0.0,
            "must not be negative",
            "Adjusted slot spacing changes how many units fit the grid",
        );
        let max_slots = load_f64_with_warning(
            Self::MAX_SLOTS_VAR,
            LayoutConfig::DEFAULT_MAX_SLOTS as f64,
            |value| value >= 1.0 && value <= Self::MAX_SLOTS_CEILING && value.fract() == 0.0,
            "must be a whole number between 1 and 100000",
            "Adjusted slot limit changes how many units a visualization shows",
        );

        Self {
            layout: LayoutConfig::builder()
                .max_slot_size(max_slot_size)
                .spacing(spacing)
                .max_slots(max_slots as usize)
                .build(),
        }
    }

    /// Returns the configured LayoutConfig.
    pub fn layout_config(&self) -> LayoutConfig {
        self.layout
    }
}

/// Pacing of the loading animation.
#[derive(Clone, Debug, Default)]
pub struct AnimationSettings {
    timing: AnimationTiming,
}

impl AnimationSettings {
    const LERP_FRACTION_VAR: &'static str = "SEA_FREIGHT_ANIMATION_LERP_FRACTION";
    const ARRIVAL_THRESHOLD_VAR: &'static str = "SEA_FREIGHT_ANIMATION_ARRIVAL_THRESHOLD";
    const START_DELAY_VAR: &'static str = "SEA_FREIGHT_ANIMATION_START_DELAY_MS";
    const NEXT_ITEM_DELAY_VAR: &'static str = "SEA_FREIGHT_ANIMATION_NEXT_ITEM_DELAY_MS";
    const RESTART_DELAY_VAR: &'static str = "SEA_FREIGHT_ANIMATION_RESTART_DELAY_MS";
    const FRAME_INTERVAL_VAR: &'static str = "SEA_FREIGHT_ANIMATION_FRAME_INTERVAL_MS";

    fn from_env() -> Self {
        let lerp_fraction = load_f64_with_warning(
            Self::LERP_FRACTION_VAR,
            AnimationTiming::DEFAULT_LERP_FRACTION,
            |value| value > 0.0 && value <= 1.0,
            "must be in (0, 1]",
            "Adjusted interpolation fraction changes the animation speed",
        );
        let arrival_threshold = load_f64_with_warning(
            Self::ARRIVAL_THRESHOLD_VAR,
            AnimationTiming::DEFAULT_ARRIVAL_THRESHOLD,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted arrival threshold changes when units snap into place",
        );

        Self {
            timing: AnimationTiming {
                lerp_fraction,
                arrival_threshold,
                start_delay: load_millis(Self::START_DELAY_VAR, AnimationTiming::DEFAULT_START_DELAY),
                next_item_delay: load_millis(
                    Self::NEXT_ITEM_DELAY_VAR,
                    AnimationTiming::DEFAULT_NEXT_ITEM_DELAY,
                ),
                restart_delay: load_millis(
                    Self::RESTART_DELAY_VAR,
                    AnimationTiming::DEFAULT_RESTART_DELAY,
                ),
                frame_interval: load_frame_interval(),
            },
        }
    }

    /// Returns the configured AnimationTiming.
    pub fn timing(&self) -> AnimationTiming {
        self.timing
    }
}

fn load_millis(var_name: &str, default: Duration) -> Duration {
    let millis = load_f64_with_warning(
        var_name,
        default.as_millis() as f64,
        |value| (0.0..=60_000.0).contains(&value),
        "must be between 0 and 60000 ms",
        "Adjusted animation delay",
    );
    Duration::from_millis(millis.round() as u64)
}

fn load_frame_interval() -> Duration {
    let millis = load_f64_with_warning(
        AnimationSettings::FRAME_INTERVAL_VAR,
        AnimationTiming::DEFAULT_FRAME_INTERVAL.as_millis() as f64,
        |value| (1.0..=1000.0).contains(&value),
        "must be between 1 and 1000 ms",
        "Adjusted frame interval changes the stream rate",
    );
    Duration::from_millis(millis.round() as u64)
}

/// Page layout of the text report.
#[derive(Clone, Debug, Default)]
pub struct ReportSettings {
    options: ReportOptions,
}

impl ReportSettings {
    const LINES_PER_PAGE_VAR: &'static str = "SEA_FREIGHT_REPORT_LINES_PER_PAGE";

    fn from_env() -> Self {
        let lines = load_f64_with_warning(
            Self::LINES_PER_PAGE_VAR,
            ReportOptions::DEFAULT_LINES_PER_PAGE as f64,
            |value| (10.0..=1000.0).contains(&value) && value.fract() == 0.0,
            "must be a whole number between 10 and 1000",
            "Adjusted report page length",
        );
        Self {
            options: ReportOptions {
                lines_per_page: lines as usize,
            },
        }
    }

    pub fn report_options(&self) -> ReportOptions {
        self.options
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            tracing::warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            tracing::warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name,
                other
            );
            None
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    notice: &str,
) -> f64 {
    parse_f64_with_warning(
        env_string(var_name),
        var_name,
        default,
        validator,
        invalid_hint,
        notice,
    )
}

fn parse_f64_with_warning(
    raw: Option<String>,
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    notice: &str,
) -> f64 {
    match raw {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && validator(value) => {
                let tolerance = (default.abs().max(1.0)) * 1e-9;
                if (value - default).abs() > tolerance {
                    tracing::info!("{} ({} = {}).", notice, var_name, value);
                }
                value
            }
            Ok(_) => {
                tracing::warn!(
                    "{} contains invalid value '{}': {}. Using {}.",
                    var_name,
                    raw,
                    invalid_hint,
                    default
                );
                default
            }
            Err(err) => {
                tracing::warn!(
                    "Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name,
                    raw,
                    err,
                    default
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_values() {
        assert_eq!(parse_bool("1", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("true", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("yes", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("y", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("on", "TEST_VAR"), Some(true));

        // Test case insensitivity
        assert_eq!(parse_bool("TRUE", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("Yes", "TEST_VAR"), Some(true));

        // Test with whitespace
        assert_eq!(parse_bool(" true ", "TEST_VAR"), Some(true));
    }

    #[test]
    fn test_parse_bool_false_values() {
        assert_eq!(parse_bool("0", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("false", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("no", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("OFF", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("  0  ", "TEST_VAR"), Some(false));
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn test_parse_f64_falls_back_on_bad_input() {
        let positive = |value: f64| value > 0.0;
        let parse = |raw: Option<&str>| {
            parse_f64_with_warning(raw.map(str::to_string), "TEST_VAR", 50.0, positive, "", "")
        };
        assert_eq!(parse(None), 50.0);
        assert_eq!(parse(Some("75.5")), 75.5);
        assert_eq!(parse(Some("-3")), 50.0);
        assert_eq!(parse(Some("NaN")), 50.0);
        assert_eq!(parse(Some("inf")), 50.0);
        assert_eq!(parse(Some("fifty")), 50.0);
    }

    #[test]
    fn test_parse_host_and_port() {
        let (ip, host) = parse_host(Some("127.0.0.1".to_string()));
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(host, "127.0.0.1");

        let (ip, host) = parse_host(Some("not-an-ip".to_string()));
        assert_eq!(ip, ApiConfig::DEFAULT_BIND_IP);
        assert_eq!(host, ApiConfig::DEFAULT_HOST);

        assert_eq!(parse_port(Some("9000".to_string())), 9000);
        assert_eq!(parse_port(Some("0".to_string())), ApiConfig::DEFAULT_PORT);
        assert_eq!(parse_port(Some("70000".to_string())), ApiConfig::DEFAULT_PORT);
        assert_eq!(parse_port(None), ApiConfig::DEFAULT_PORT);
    }

    #[test]
    fn test_remote_endpoint_requires_opt_in() {
        assert_eq!(CalculationConfig::default().remote_endpoint(), None);
        let remote = CalculationConfig::remote("http://calc.local/api", Duration::from_secs(3));
        assert_eq!(remote.remote_endpoint(), Some("http://calc.local/api"));
        assert_eq!(remote.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_defaults_match_component_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.layout.layout_config(), LayoutConfig::default());
        assert_eq!(config.animation.timing(), AnimationTiming::default());
        assert_eq!(config.report.report_options(), ReportOptions::default());
        assert!(config.api.binds_to_all_interfaces());
        assert_eq!(config.api.port(), 8080);
    }
}
