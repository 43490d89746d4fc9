use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::canvas::RasterImage;
use crate::geometry::Point;
use crate::host::ShellHooks;

/// Identifier of the bundled fallback theme.
pub const DEFAULT_THEME: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 {
            return None;
        }
        let v = u32::from_str_radix(hex, 16).ok()?;
        Some(Self {
            r: (v >> 16) as u8,
            g: (v >> 8) as u8,
            b: v as u8,
        })
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Rgb::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid color {s:?}")))
    }
}

/// Typography and anchoring for one themed label, in logical-canvas
/// units.
#[derive(Debug, Clone)]
pub struct LabelStyle {
    pub family: String,
    pub size: f32,
    pub bold: bool,
    pub color: Rgb,
    pub pos: Point,
    pub max_width: Option<f32>,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("theme directory {0:?} does not exist")]
    Missing(PathBuf),
    #[error("unreadable theme description: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed theme description: {0}")]
    Description(#[from] serde_json::Error),
    #[error("raster {name:?}: {source}")]
    Raster {
        name: &'static str,
        source: image::ImageError,
    },
}

/// On-disk theme description, `theme.json` in the theme directory.
/// Missing fields fall back to the built-in measurements.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ThemeSpec {
    day_month_font: String,
    day_month_size: f32,
    day_month_bold: bool,
    day_month_color: Rgb,
    day_month_pos: [f32; 2],
    day_month_max_width: f32,
    date_font: String,
    date_size: f32,
    date_bold: bool,
    date_color: Rgb,
    date_pos: [f32; 2],
    date_only_pos: [f32; 2],
    sym_date_font: String,
    sym_date_size: f32,
    sym_date_bold: bool,
    sym_date_color: Rgb,
    sym_date_pos: [f32; 2],
    clock_center: [f32; 2],
    sym_clock_center: [f32; 2],
    sym_clock_dest_out: bool,
    sym_date_dest_out: bool,
    weather_size: f32,
    weather_pos: [f32; 2],
    weather_only_pos: [f32; 2],
    temperature_font: String,
    temperature_size: f32,
    temperature_bold: bool,
    temperature_color: Rgb,
}

impl Default for ThemeSpec {
    fn default() -> Self {
        Self {
            day_month_font: "Sans".into(),
            day_month_size: 75.0,
            day_month_bold: true,
            day_month_color: Rgb { r: 0xF6, g: 0xF5, b: 0xF4 },
            day_month_pos: [256.0, 72.0],
            day_month_max_width: 448.0,
            date_font: "Cantarell".into(),
            date_size: 150.0,
            date_bold: true,
            date_color: Rgb { r: 0xED, g: 0x33, b: 0x3B },
            date_pos: [256.0, 240.0],
            date_only_pos: [256.0, 200.0],
            sym_date_font: "Cantarell".into(),
            sym_date_size: 64.0,
            sym_date_bold: true,
            sym_date_color: Rgb { r: 0xF2, g: 0xF2, b: 0xF2 },
            sym_date_pos: [64.0, 40.0],
            clock_center: [256.0, 252.0],
            sym_clock_center: [64.0, 64.0],
            sym_clock_dest_out: true,
            sym_date_dest_out: false,
            weather_size: 256.0,
            weather_pos: [256.0, 200.0],
            weather_only_pos: [256.0, 256.0],
            temperature_font: "Cantarell".into(),
            temperature_size: 120.0,
            temperature_bold: true,
            temperature_color: Rgb { r: 0xFF, g: 0xFF, b: 0xFF },
        }
    }
}

/// The nine background and hand rasters of one theme.
#[derive(Debug, Clone)]
pub struct Rasters {
    pub calendar: RasterImage,
    pub calendar_symbolic: RasterImage,
    pub clocks: RasterImage,
    pub clocks_symbolic: RasterImage,
    pub hour: RasterImage,
    pub hour_symbolic: RasterImage,
    pub minute: RasterImage,
    pub minute_symbolic: RasterImage,
    pub second: RasterImage,
}

/// Everything a renderer needs from the active theme. Immutable once
/// loaded; the store replaces the whole record on a theme switch.
#[derive(Debug, Clone)]
pub struct ThemeParameters {
    pub name: String,
    pub rasters: Rasters,
    pub day_month: LabelStyle,
    pub date: LabelStyle,
    pub sym_date: LabelStyle,
    pub temperature: LabelStyle,
    pub date_only_pos: Point,
    pub clock_center: Point,
    pub sym_clock_center: Point,
    pub sym_clock_dest_out: bool,
    pub sym_date_dest_out: bool,
    pub weather_size: f32,
    pub weather_pos: Point,
    pub weather_only_pos: Point,
    pub stylesheet: Option<PathBuf>,
}

pub struct ThemeStore {
    root: PathBuf,
    active: Option<Rc<ThemeParameters>>,
    stylesheet: Option<PathBuf>,
}

impl ThemeStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            active: None,
            stylesheet: None,
        }
    }

    pub fn active(&self) -> Option<&Rc<ThemeParameters>> {
        self.active.as_ref()
    }

    /// Pick the theme directory to load: the requested name if present,
    /// else the system icon theme, else the bundled default.
    pub fn resolve(&self, requested: &str, system: Option<&str>) -> String {
        if !requested.is_empty() && self.root.join(requested).is_dir() {
            return requested.into();
        }
        if let Some(system) = system
            && !system.is_empty()
            && self.root.join(system).is_dir()
        {
            return system.into();
        }
        DEFAULT_THEME.into()
    }

    /// Load and install the resolved theme. A failed load falls back to
    /// the default theme; if that fails too the previous theme stays
    /// active.
    pub fn reload(&mut self, requested: &str, system: Option<&str>, hooks: &dyn ShellHooks) {
        let id = self.resolve(requested, system);
        match self.load_dir(&id) {
            Ok(params) => self.install(params, hooks),
            Err(err) => {
                log::warn!("icon theme {id:?} failed to load: {err}");
                if id != DEFAULT_THEME {
                    match self.load_dir(DEFAULT_THEME) {
                        Ok(params) => self.install(params, hooks),
                        Err(err) => log::warn!("default icon theme failed to load: {err}"),
                    }
                }
            }
        }
    }

    /// Drop the active theme and its stylesheet.
    pub fn unload(&mut self, hooks: &dyn ShellHooks) {
        if let Some(old) = self.stylesheet.take() {
            hooks.unload_stylesheet(&old);
        }
        self.active = None;
    }

    fn install(&mut self, params: ThemeParameters, hooks: &dyn ShellHooks) {
        if self.stylesheet != params.stylesheet {
            if let Some(old) = self.stylesheet.take() {
                hooks.unload_stylesheet(&old);
            }
            if let Some(new) = &params.stylesheet {
                hooks.load_stylesheet(new);
            }
            self.stylesheet = params.stylesheet.clone();
        }
        self.active = Some(Rc::new(params));
    }

    fn load_dir(&self, id: &str) -> Result<ThemeParameters, ThemeError> {
        let dir = self.root.join(id);
        if !dir.is_dir() {
            return Err(ThemeError::Missing(dir));
        }
        let text = fs::read_to_string(dir.join("theme.json"))?;
        let spec: ThemeSpec = serde_json::from_str(&text)?;

        let rasters = Rasters {
            calendar: load_raster(&dir, "calendar")?,
            calendar_symbolic: load_raster(&dir, "calendar-symbolic")?,
            clocks: load_raster(&dir, "clocks")?,
            clocks_symbolic: load_raster(&dir, "clocks-symbolic")?,
            hour: load_raster(&dir, "hour")?,
            hour_symbolic: load_raster(&dir, "hour-symbolic")?,
            minute: load_raster(&dir, "minute")?,
            minute_symbolic: load_raster(&dir, "minute-symbolic")?,
            second: load_raster(&dir, "second")?,
        };
        let stylesheet = dir.join("stylesheet.css");
        let stylesheet = stylesheet.is_file().then_some(stylesheet);

        Ok(build_parameters(id, spec, rasters, stylesheet))
    }
}

fn build_parameters(
    id: &str,
    spec: ThemeSpec,
    rasters: Rasters,
    stylesheet: Option<PathBuf>,
) -> ThemeParameters {
    ThemeParameters {
        name: id.into(),
        rasters,
        day_month: LabelStyle {
            family: spec.day_month_font,
            size: spec.day_month_size,
            bold: spec.day_month_bold,
            color: spec.day_month_color,
            pos: spec.day_month_pos.into(),
            max_width: Some(spec.day_month_max_width),
        },
        date: LabelStyle {
            family: spec.date_font,
            size: spec.date_size,
            bold: spec.date_bold,
            color: spec.date_color,
            pos: spec.date_pos.into(),
            max_width: None,
        },
        sym_date: LabelStyle {
            family: spec.sym_date_font,
            size: spec.sym_date_size,
            bold: spec.sym_date_bold,
            color: spec.sym_date_color,
            pos: spec.sym_date_pos.into(),
            max_width: None,
        },
        temperature: LabelStyle {
            family: spec.temperature_font,
            size: spec.temperature_size,
            bold: spec.temperature_bold,
            color: spec.temperature_color,
            pos: Point::new(0.0, 0.0),
            max_width: None,
        },
        date_only_pos: spec.date_only_pos.into(),
        clock_center: spec.clock_center.into(),
        sym_clock_center: spec.sym_clock_center.into(),
        sym_clock_dest_out: spec.sym_clock_dest_out,
        sym_date_dest_out: spec.sym_date_dest_out,
        weather_size: spec.weather_size,
        weather_pos: spec.weather_pos.into(),
        weather_only_pos: spec.weather_only_pos.into(),
        stylesheet,
    }
}

#[cfg(test)]
pub(crate) fn test_parameters() -> ThemeParameters {
    let solid = |rgba| RasterImage::solid(16, 16, rgba);
    let rasters = Rasters {
        calendar: solid([10, 10, 80, 255]),
        calendar_symbolic: solid([200, 200, 200, 255]),
        clocks: solid([10, 80, 10, 255]),
        clocks_symbolic: solid([200, 200, 200, 255]),
        hour: solid([255, 255, 255, 255]),
        hour_symbolic: solid([0, 0, 0, 255]),
        minute: solid([255, 255, 255, 255]),
        minute_symbolic: solid([0, 0, 0, 255]),
        second: solid([255, 0, 0, 255]),
    };
    build_parameters("test", ThemeSpec::default(), rasters, None)
}

fn load_raster(dir: &Path, name: &'static str) -> Result<RasterImage, ThemeError> {
    RasterImage::open(&dir.join(format!("{name}.png")))
        .map_err(|source| ThemeError::Raster { name, source })
}
