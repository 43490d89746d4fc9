use chrono::{Datelike, Locale, NaiveDateTime};

use crate::canvas::{Canvas, Compose, RasterImage, TextRun};
use crate::geometry::{Point, center_offset};
use crate::host::IconStyle;
use crate::settings::FeatureFlags;
use crate::theme::{LabelStyle, ThemeParameters};
use crate::{LOGICAL_FULL, LOGICAL_SYMBOLIC};

/// Locale used for weekday/month abbreviations: the process's
/// time-formatting locale when one is set, a neutral default otherwise.
pub fn time_locale() -> Locale {
    sys_locale::get_locale()
        .map(|tag| tag.replace('-', "_"))
        .and_then(|tag| Locale::try_from(tag.as_str()).ok())
        .unwrap_or(Locale::POSIX)
}

pub fn render(
    canvas: &mut Canvas,
    now: NaiveDateTime,
    surface: (u32, u32),
    size: u32,
    style: IconStyle,
    flags: &FeatureFlags,
    theme: &ThemeParameters,
    locale: Locale,
) -> RasterImage {
    match style {
        IconStyle::FullColor => render_full(canvas, now, surface, size, flags, theme, locale),
        IconStyle::Symbolic => render_symbolic(canvas, now, surface, size, theme),
    }
}

fn render_full(
    canvas: &mut Canvas,
    now: NaiveDateTime,
    (width, height): (u32, u32),
    size: u32,
    flags: &FeatureFlags,
    theme: &ThemeParameters,
    locale: Locale,
) -> RasterImage {
    let mut img = RasterImage::new(width, height);
    let size = size as f32;
    let offset = center_offset(width as f32, height as f32, size);
    let scale = size / LOGICAL_FULL;

    img.blit(&theme.rasters.calendar, LOGICAL_FULL, scale, offset, Compose::Over);

    let label = label_text(now, flags, locale);
    if !label.is_empty() {
        let px = fitted_px(canvas, &label, &theme.day_month, scale);
        if px > 0.0 {
            let run = TextRun {
                text: &label,
                family: &theme.day_month.family,
                bold: theme.day_month.bold,
                color: theme.day_month.color,
                px,
            };
            let anchor = theme.day_month.pos.scaled(scale).offset(offset);
            canvas.draw_text(&mut img, &run, anchor.x, anchor.y, Compose::Over);
        }
    }

    let date = now.day().to_string();
    let run = TextRun {
        text: &date,
        family: &theme.date.family,
        bold: theme.date.bold,
        color: theme.date.color,
        px: theme.date.size * scale,
    };
    let anchor = date_anchor(theme, &label).scaled(scale).offset(offset);
    canvas.draw_text(&mut img, &run, anchor.x, anchor.y, Compose::Over);
    img
}

fn render_symbolic(
    canvas: &mut Canvas,
    now: NaiveDateTime,
    (width, height): (u32, u32),
    size: u32,
    theme: &ThemeParameters,
) -> RasterImage {
    let mut img = RasterImage::new(width, height);
    let size = size as f32;
    let offset = center_offset(width as f32, height as f32, size);
    let scale = size / LOGICAL_SYMBOLIC;

    img.blit(&theme.rasters.calendar_symbolic, LOGICAL_SYMBOLIC, scale, offset, Compose::Over);

    let compose = if theme.sym_date_dest_out {
        Compose::DestOut
    } else {
        Compose::Over
    };
    let date = now.day().to_string();
    let run = TextRun {
        text: &date,
        family: &theme.sym_date.family,
        bold: theme.sym_date.bold,
        color: theme.sym_date.color,
        px: theme.sym_date.size * scale,
    };
    let anchor = theme.sym_date.pos.scaled(scale).offset(offset);
    canvas.draw_text(&mut img, &run, anchor.x, anchor.y, compose);
    img
}

/// "Tue Mar", "Tue", "Mar" or nothing, per the display flags.
fn label_text(now: NaiveDateTime, flags: &FeatureFlags, locale: Locale) -> String {
    let weekday = || now.date().format_localized("%a", locale).to_string();
    let month = || now.date().format_localized("%b", locale).to_string();
    match (flags.show_weekday, flags.show_month) {
        (true, true) => format!("{} {}", weekday(), month()),
        (true, false) => weekday(),
        (false, true) => month(),
        (false, false) => String::new(),
    }
}

fn date_anchor(theme: &ThemeParameters, label: &str) -> Point {
    if label.is_empty() {
        theme.date_only_pos
    } else {
        theme.date.pos
    }
}

/// Shrink the label font in one-logical-unit steps until the measured
/// width fits the theme's limit. Returns the pixel size to draw at, or
/// zero if nothing fits.
fn fitted_px(canvas: &mut Canvas, text: &str, label: &LabelStyle, scale: f32) -> f32 {
    let limit = label.max_width.map(|w| w * scale);
    let mut size = label.size;
    while size > 0.0 {
        let px = size * scale;
        let run = TextRun {
            text,
            family: &label.family,
            bold: label.bold,
            color: label.color,
            px,
        };
        match limit {
            Some(limit) if canvas.measure(&run).0 > limit => size -= 1.0,
            _ => return px,
        }
    }
    0.0
}
