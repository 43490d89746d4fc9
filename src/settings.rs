use crate::host::{AppId, SignalId};

/// Keys of the externally persisted settings schema.
pub mod keys {
    pub const CALENDAR: &str = "calendar";
    pub const CLOCKS: &str = "clocks";
    pub const WEATHER: &str = "weather";
    pub const SHOW_WEEKDAY: &str = "show-weekday";
    pub const SHOW_MONTH: &str = "show-month";
    pub const SHOW_SECONDS: &str = "show-seconds";
    pub const SHOW_BACKGROUND: &str = "show-background";
    pub const SHOW_TEMPERATURE: &str = "show-temperature";
    pub const THEME: &str = "theme";
}

/// The persisted settings store. Change notifications carry the key
/// name; callbacks run on the UI thread.
pub trait SettingsBackend {
    fn boolean(&self, key: &str) -> bool;

    fn string(&self, key: &str) -> String;

    fn connect_changed(&self, callback: Box<dyn Fn(&str)>) -> SignalId;

    fn disconnect(&self, id: SignalId);
}

/// What a key change requires beyond storing the new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEffect {
    /// Picked up on the next repaint tick.
    None,
    /// A family was switched on or off: displayed icons must be rebuilt.
    Redisplay,
    /// The active theme changed.
    ReloadTheme,
}

/// Process-wide display configuration. Written only by the
/// settings-change handler, read by every renderer invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFlags {
    pub calendar: bool,
    pub clocks: bool,
    pub weather: bool,
    pub show_weekday: bool,
    pub show_month: bool,
    pub show_seconds: bool,
    pub show_background: bool,
    pub show_temperature: bool,
    pub theme: String,
}

impl FeatureFlags {
    pub fn load(settings: &dyn SettingsBackend) -> Self {
        Self {
            calendar: settings.boolean(keys::CALENDAR),
            clocks: settings.boolean(keys::CLOCKS),
            weather: settings.boolean(keys::WEATHER),
            show_weekday: settings.boolean(keys::SHOW_WEEKDAY),
            show_month: settings.boolean(keys::SHOW_MONTH),
            show_seconds: settings.boolean(keys::SHOW_SECONDS),
            show_background: settings.boolean(keys::SHOW_BACKGROUND),
            show_temperature: settings.boolean(keys::SHOW_TEMPERATURE),
            theme: settings.string(keys::THEME),
        }
    }

    /// Re-read one key and report the follow-up work.
    pub fn apply(&mut self, settings: &dyn SettingsBackend, key: &str) -> KeyEffect {
        match key {
            keys::CALENDAR => {
                self.calendar = settings.boolean(key);
                KeyEffect::Redisplay
            }
            keys::CLOCKS => {
                self.clocks = settings.boolean(key);
                KeyEffect::Redisplay
            }
            keys::WEATHER => {
                self.weather = settings.boolean(key);
                KeyEffect::Redisplay
            }
            keys::SHOW_WEEKDAY => {
                self.show_weekday = settings.boolean(key);
                KeyEffect::None
            }
            keys::SHOW_MONTH => {
                self.show_month = settings.boolean(key);
                KeyEffect::None
            }
            keys::SHOW_SECONDS => {
                self.show_seconds = settings.boolean(key);
                KeyEffect::None
            }
            keys::SHOW_BACKGROUND => {
                self.show_background = settings.boolean(key);
                KeyEffect::None
            }
            keys::SHOW_TEMPERATURE => {
                self.show_temperature = settings.boolean(key);
                KeyEffect::None
            }
            keys::THEME => {
                self.theme = settings.string(key);
                KeyEffect::ReloadTheme
            }
            _ => KeyEffect::None,
        }
    }

    pub fn enabled_for(&self, app: AppId) -> bool {
        match app {
            AppId::Calendar => self.calendar,
            AppId::Clocks => self.clocks,
            AppId::Weather => self.weather,
        }
    }
}
