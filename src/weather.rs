use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};

use crate::geometry::Point;
use crate::host::{IconStyle, SignalId};
use crate::settings::FeatureFlags;
use crate::theme::{Rgb, ThemeParameters};
use crate::LOGICAL_FULL;

/// A forecast sample older than this is treated as absent.
pub const FRESHNESS_WINDOW_SECS: i64 = 1800;

/// Background poll cadence for weather icons.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

pub const NO_DATA_ICON: &str = "weather-severe-alert";
pub const NO_DATA_ICON_SYMBOLIC: &str = "weather-severe-alert-symbolic";

/// One forecast entry as reported by the weather collaborator.
#[derive(Debug, Clone)]
pub struct ForecastEntry {
    pub updated: DateTime<Local>,
    pub temperature: f64,
    pub icon: String,
    pub symbolic_icon: String,
}

/// The weather-data client owned by the host. Read-only here; the
/// changed notification fires on the UI thread.
pub trait WeatherClient {
    fn available(&self) -> bool;

    fn has_location(&self) -> bool;

    fn info_valid(&self) -> bool;

    fn forecasts(&self) -> Vec<ForecastEntry>;

    fn connect_changed(&self, callback: Box<dyn Fn()>) -> SignalId;

    fn disconnect(&self, id: SignalId);
}

/// A point-in-time view of the forecast, or nothing worth showing.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSnapshot {
    pub temperature: f64,
    pub icon: String,
    pub symbolic_icon: String,
}

impl ForecastSnapshot {
    /// Absent when the client is unavailable, has no location, reports
    /// invalid info, or no entry has a fresh update timestamp.
    pub fn capture(client: &dyn WeatherClient, now: DateTime<Local>) -> Option<Self> {
        if !client.available() || !client.has_location() || !client.info_valid() {
            return None;
        }
        client
            .forecasts()
            .into_iter()
            .find(|entry| {
                now.signed_duration_since(entry.updated) <= TimeDelta::seconds(FRESHNESS_WINDOW_SECS)
            })
            .map(|entry| Self {
                temperature: entry.temperature,
                icon: entry.icon,
                symbolic_icon: entry.symbolic_icon,
            })
    }
}

/// Rounded to the nearest integer, right-aligned in a two-character
/// field, degree suffix. `"--°"` without data.
pub fn format_temperature(celsius: Option<f64>) -> String {
    match celsius {
        Some(t) => format!("{:>2}°", t.round() as i64),
        None => "--°".into(),
    }
}

/// The temperature text with its resolved typography, in target pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureLabel {
    pub text: String,
    pub family: String,
    pub px: f32,
    pub bold: bool,
    pub color: Rgb,
}

/// What the host should display for one weather icon occurrence.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherIcon {
    /// Styled background panel with the glyph at a theme-relative spot
    /// and the temperature label under it (when shown).
    Composite {
        glyph: String,
        glyph_center: Point,
        glyph_size: f32,
        label: Option<TemperatureLabel>,
    },
    /// Bare named glyph, no panel, no label.
    Glyph(String),
}

pub fn render(
    snapshot: Option<&ForecastSnapshot>,
    size: f32,
    style: IconStyle,
    flags: &FeatureFlags,
    theme: &ThemeParameters,
) -> WeatherIcon {
    let glyph = match (snapshot, style) {
        (Some(s), IconStyle::FullColor) => s.icon.clone(),
        (Some(s), IconStyle::Symbolic) => s.symbolic_icon.clone(),
        (None, IconStyle::FullColor) => NO_DATA_ICON.into(),
        (None, IconStyle::Symbolic) => NO_DATA_ICON_SYMBOLIC.into(),
    };
    if !flags.show_background {
        return WeatherIcon::Glyph(glyph);
    }

    let scale = size / LOGICAL_FULL;
    let label = flags.show_temperature.then(|| TemperatureLabel {
        text: format_temperature(snapshot.map(|s| s.temperature)),
        family: theme.temperature.family.clone(),
        px: theme.temperature.size * scale,
        bold: theme.temperature.bold,
        color: theme.temperature.color,
    });
    // The glyph sits higher when the label takes the lower half
    let anchor = if label.is_some() {
        theme.weather_pos
    } else {
        theme.weather_only_pos
    };
    WeatherIcon::Composite {
        glyph,
        glyph_center: anchor.scaled(scale),
        glyph_size: theme.weather_size * scale,
        label,
    }
}
