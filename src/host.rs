//! Contracts for the pieces the host shell owns: the icon widgets we
//! paint into, and the shell-level hooks (stylesheets, redisplay, the
//! system icon theme).

use std::path::Path;

use crate::canvas::RasterImage;
use crate::weather::WeatherIcon;

pub const CALENDAR_APP: &str = "org.gnome.Calendar.desktop";
pub const CLOCKS_APP: &str = "org.gnome.clocks.desktop";
pub const WEATHER_APP: &str = "org.gnome.Weather.desktop";

/// Dash keeps a 32px placeholder tile alive while the real icon is
/// off-screen; a session on such a widget must survive detachment.
pub const DASH_PLACEHOLDER_MARKER: &str = "dash-placeholder";
pub const DASH_PLACEHOLDER_SIZE: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppId {
    Calendar,
    Clocks,
    Weather,
}

impl AppId {
    pub const ALL: [AppId; 3] = [AppId::Calendar, AppId::Clocks, AppId::Weather];

    pub fn from_desktop_id(id: &str) -> Option<Self> {
        match id {
            CALENDAR_APP => Some(Self::Calendar),
            CLOCKS_APP => Some(Self::Clocks),
            WEATHER_APP => Some(Self::Weather),
            _ => None,
        }
    }

    pub fn desktop_id(self) -> &'static str {
        match self {
            Self::Calendar => CALENDAR_APP,
            Self::Clocks => CLOCKS_APP,
            Self::Weather => WEATHER_APP,
        }
    }
}

/// Icon rendering mode reported by the consuming surface. Re-read on
/// every paint; never cached in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconStyle {
    FullColor,
    Symbolic,
}

/// Requested icon size in logical pixels, before the backing scale
/// factor is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconSize {
    /// Let the widget's own allocation decide.
    Natural,
    Logical(u32),
}

/// Handle for a change-notification subscription on a host collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(pub u64);

/// What a repaint hands back to the widget.
pub enum IconContent<'a> {
    Raster(&'a RasterImage),
    Weather(&'a WeatherIcon),
}

/// One on-screen icon widget, owned by the host. The engine only ever
/// borrows it: it queries the style contract and pushes finished
/// content.
pub trait IconWidget {
    /// Current surface allocation in device pixels (width, height).
    fn surface_size(&self) -> (u32, u32);

    fn icon_style(&self) -> IconStyle;

    /// Backing scale factor of the display the widget sits on.
    fn scale_factor(&self) -> f32 {
        1.0
    }

    fn present(&self, content: IconContent<'_>);

    /// Style marker the host put on this widget, if any. Used to
    /// recognize the persistent dash placeholder.
    fn style_marker(&self) -> Option<&str> {
        None
    }

    /// The session ended: the host glue can drop its paint hookup for
    /// this widget. Called exactly once per session.
    fn release(&self) {}
}

/// Shell-level services the integration layer calls back into.
pub trait ShellHooks {
    fn system_icon_theme(&self) -> Option<String>;

    fn load_stylesheet(&self, path: &Path);

    fn unload_stylesheet(&self, path: &Path);

    /// Force every currently displayed icon of the given apps (grid,
    /// folders, dash, search results) to be recreated.
    fn redisplay(&self, apps: &[AppId]);

    /// Size the host uses for search-provider icons.
    fn provider_icon_size(&self) -> u32 {
        32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_ids_round_trip() {
        for app in AppId::ALL {
            assert_eq!(AppId::from_desktop_id(app.desktop_id()), Some(app));
        }
        assert_eq!(AppId::from_desktop_id("org.gnome.Maps.desktop"), None);
    }
}
