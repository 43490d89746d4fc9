pub mod calendar;
pub mod canvas;
pub mod clock;
pub mod geometry;
pub mod host;
pub mod runtime;
pub mod session;
pub mod settings;
pub mod theme;
pub mod weather;

pub use canvas::{Canvas, Compose, RasterImage, TextRun};
pub use host::{
    AppId, CALENDAR_APP, CLOCKS_APP, IconContent, IconSize, IconStyle, IconWidget, ShellHooks,
    SignalId, WEATHER_APP,
};
pub use runtime::{Event, Runtime};
pub use session::{IconSession, SessionId, SessionState, Sessions};
pub use settings::{FeatureFlags, SettingsBackend};
pub use theme::{LabelStyle, Rgb, ThemeError, ThemeParameters, ThemeStore};
pub use weather::{ForecastEntry, ForecastSnapshot, WeatherClient, WeatherIcon};

/// Reference canvas full-color theme measurements are authored against.
pub const LOGICAL_FULL: f32 = 512.0;

/// Reference canvas for the symbolic variants.
pub const LOGICAL_SYMBOLIC: f32 = 128.0;
