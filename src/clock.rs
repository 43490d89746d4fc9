use chrono::{NaiveDateTime, Timelike};

use crate::canvas::{Compose, RasterImage};
use crate::geometry::{Angle, center_offset};
use crate::host::IconStyle;
use crate::settings::FeatureFlags;
use crate::theme::ThemeParameters;
use crate::{LOGICAL_FULL, LOGICAL_SYMBOLIC};

pub fn render(
    now: NaiveDateTime,
    surface: (u32, u32),
    size: u32,
    style: IconStyle,
    flags: &FeatureFlags,
    theme: &ThemeParameters,
) -> RasterImage {
    match style {
        IconStyle::FullColor => render_full(now, surface, size, flags, theme),
        IconStyle::Symbolic => render_symbolic(now, surface, size, theme),
    }
}

fn render_full(
    now: NaiveDateTime,
    (width, height): (u32, u32),
    size: u32,
    flags: &FeatureFlags,
    theme: &ThemeParameters,
) -> RasterImage {
    let mut img = RasterImage::new(width, height);
    let size = size as f32;
    let offset = center_offset(width as f32, height as f32, size);
    let scale = size / LOGICAL_FULL;
    let pivot = theme.clock_center;

    img.blit(&theme.rasters.clocks, LOGICAL_FULL, scale, offset, Compose::Over);

    let (h, m, s) = (now.hour(), now.minute(), now.second());
    img.blit_rotated(
        &theme.rasters.hour,
        LOGICAL_FULL,
        scale,
        offset,
        pivot,
        Angle::hour(h, m),
        Compose::Over,
    );
    img.blit_rotated(
        &theme.rasters.minute,
        LOGICAL_FULL,
        scale,
        offset,
        pivot,
        Angle::minute(m, s),
        Compose::Over,
    );
    if flags.show_seconds {
        img.blit_rotated(
            &theme.rasters.second,
            LOGICAL_FULL,
            scale,
            offset,
            pivot,
            Angle::second(s),
            Compose::Over,
        );
    }
    img
}

// Two hands only, and the minute hand does not creep with the seconds.
fn render_symbolic(
    now: NaiveDateTime,
    (width, height): (u32, u32),
    size: u32,
    theme: &ThemeParameters,
) -> RasterImage {
    let mut img = RasterImage::new(width, height);
    let size = size as f32;
    let offset = center_offset(width as f32, height as f32, size);
    let scale = size / LOGICAL_SYMBOLIC;
    let pivot = theme.sym_clock_center;
    let compose = if theme.sym_clock_dest_out {
        Compose::DestOut
    } else {
        Compose::Over
    };

    img.blit(&theme.rasters.clocks_symbolic, LOGICAL_SYMBOLIC, scale, offset, Compose::Over);

    let (h, m) = (now.hour(), now.minute());
    img.blit_rotated(
        &theme.rasters.hour_symbolic,
        LOGICAL_SYMBOLIC,
        scale,
        offset,
        pivot,
        Angle::hour(h, m),
        compose,
    );
    img.blit_rotated(
        &theme.rasters.minute_symbolic,
        LOGICAL_SYMBOLIC,
        scale,
        offset,
        pivot,
        Angle::minute(m, 0),
        compose,
    );
    img
}
