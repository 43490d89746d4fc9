use std::path::Path;

use cosmic_text::{Attrs, Buffer, Color, Family, FontSystem, Metrics, Shaping, SwashCache, Weight};

use crate::geometry::Point;
use crate::theme::Rgb;

/// Compositing operator for blits and text.
///
/// `DestOut` is the "cut out of the background" mode used by symbolic
/// themes: the source's alpha is subtracted from the target instead of
/// painted over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compose {
    Over,
    DestOut,
}

/// Straight-alpha RGBA8 pixel buffer.
#[derive(Debug, Clone)]
pub struct RasterImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; (width * height * 4) as usize],
        }
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn open(path: &Path) -> Result<Self, image::ImageError> {
        let decoded = image::open(path)?.into_rgba8();
        Ok(Self {
            width: decoded.width(),
            height: decoded.height(),
            data: decoded.into_raw(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = Self::pixel_idx(self.width, x, y);
        self.data[idx..idx + 4].try_into().unwrap()
    }

    /// Scale `src` from its logical canvas onto this image. `offset` is
    /// the centering offset in target pixels, `scale` the logical→pixel
    /// factor.
    pub fn blit(&mut self, src: &RasterImage, logical: f32, scale: f32, offset: Point, compose: Compose) {
        self.blit_rotated(src, logical, scale, offset, Point::new(logical / 2.0, logical / 2.0), 0.0, compose);
    }

    /// Like [`blit`](Self::blit), with the source rotated `angle_deg`
    /// clockwise about `pivot` (in logical units — not the image
    /// center).
    pub fn blit_rotated(
        &mut self,
        src: &RasterImage,
        logical: f32,
        scale: f32,
        offset: Point,
        pivot: Point,
        angle_deg: f32,
        compose: Compose,
    ) {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        let src_scale = src.width as f32 / logical;

        // Only the scaled logical square can receive pixels
        let x0 = offset.x.floor().max(0.0) as u32;
        let y0 = offset.y.floor().max(0.0) as u32;
        let x1 = ((offset.x + logical * scale).ceil() as u32).min(self.width);
        let y1 = ((offset.y + logical * scale).ceil() as u32).min(self.height);

        for y in y0..y1 {
            for x in x0..x1 {
                let lx = (x as f32 + 0.5 - offset.x) / scale;
                let ly = (y as f32 + 0.5 - offset.y) / scale;
                if lx < 0.0 || ly < 0.0 || lx >= logical || ly >= logical {
                    continue;
                }
                // Inverse-rotate back into the source frame
                let dx = lx - pivot.x;
                let dy = ly - pivot.y;
                let sx = (pivot.x + dx * cos + dy * sin) * src_scale;
                let sy = (pivot.y - dx * sin + dy * cos) * src_scale;
                let px = sample(src, sx - 0.5, sy - 0.5);
                match compose {
                    Compose::Over => self.blend_over(x, y, px),
                    Compose::DestOut => self.knock_out(x, y, px[3]),
                }
            }
        }
    }

    fn blend_over(&mut self, x: u32, y: u32, src: [u8; 4]) {
        let sa = src[3] as u32;
        if sa == 0 {
            return;
        }
        let idx = Self::pixel_idx(self.width, x, y);
        let dst = &mut self.data[idx..idx + 4];
        let da = dst[3] as u32 * (255 - sa) / 255;
        let oa = sa + da;
        for c in 0..3 {
            dst[c] = ((src[c] as u32 * sa + dst[c] as u32 * da) / oa) as u8;
        }
        dst[3] = oa as u8;
    }

    fn knock_out(&mut self, x: u32, y: u32, coverage: u8) {
        let idx = Self::pixel_idx(self.width, x, y);
        let alpha = self.data[idx + 3] as u32;
        self.data[idx + 3] = (alpha * (255 - coverage as u32) / 255) as u8;
    }

    #[inline]
    fn pixel_idx(width: u32, x: u32, y: u32) -> usize {
        ((y * width + x) * 4) as usize
    }
}

// Bilinear tap in premultiplied space, transparent outside the image
fn sample(src: &RasterImage, x: f32, y: f32) -> [u8; 4] {
    if x <= -1.0 || y <= -1.0 || x >= src.width as f32 || y >= src.height as f32 {
        return [0; 4];
    }
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1.0, y0, fx * (1.0 - fy)),
        (x0, y0 + 1.0, (1.0 - fx) * fy),
        (x0 + 1.0, y0 + 1.0, fx * fy),
    ];
    let mut acc = [0f32; 4];
    for (tx, ty, weight) in taps {
        if tx < 0.0 || ty < 0.0 || tx >= src.width as f32 || ty >= src.height as f32 {
            continue;
        }
        let p = src.pixel(tx as u32, ty as u32);
        let a = p[3] as f32 / 255.0;
        acc[0] += p[0] as f32 * a * weight;
        acc[1] += p[1] as f32 * a * weight;
        acc[2] += p[2] as f32 * a * weight;
        acc[3] += a * weight;
    }
    if acc[3] <= f32::EPSILON {
        return [0; 4];
    }
    [
        (acc[0] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[1] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[2] / acc[3]).round().clamp(0.0, 255.0) as u8,
        (acc[3] * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}

/// A piece of text with resolved typography, in target pixels.
pub struct TextRun<'a> {
    pub text: &'a str,
    pub family: &'a str,
    pub bold: bool,
    pub color: Rgb,
    pub px: f32,
}

/// Shared text engine. One instance lives in the runtime; every repaint
/// borrows it, so font and glyph caches are warm across sessions.
pub struct Canvas {
    font_system: FontSystem,
    swash_cache: SwashCache,
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            font_system: FontSystem::new(),
            swash_cache: SwashCache::new(),
        }
    }

    pub fn measure(&mut self, run: &TextRun) -> (f32, f32) {
        let buffer = self.shape(run);
        let width = buffer.layout_runs().next().map_or(0.0, |r| r.line_w);
        (width, run.px * 1.2)
    }

    /// Draw `run` horizontally centered on `center_x`, top edge at
    /// `top_y`, both in target pixels.
    pub fn draw_text(
        &mut self,
        target: &mut RasterImage,
        run: &TextRun,
        center_x: f32,
        top_y: f32,
        compose: Compose,
    ) {
        let (width, _) = self.measure(run);
        let x = (center_x - width / 2.0).round() as i32;
        let y = top_y.round() as i32;

        let buffer = self.shape(run);
        let text_color = Color::rgba(run.color.r, run.color.g, run.color.b, 255);
        let (tw, th) = (target.width as i32, target.height as i32);
        let rgb = run.color;

        buffer.draw(
            &mut self.font_system,
            &mut self.swash_cache,
            text_color,
            |gx, gy, _w, _h, glyph_color| {
                let px = x + gx;
                let py = y + gy;
                if px >= 0 && px < tw && py >= 0 && py < th {
                    match compose {
                        Compose::Over => {
                            target.blend_over(px as u32, py as u32, [rgb.r, rgb.g, rgb.b, glyph_color.a()])
                        }
                        Compose::DestOut => target.knock_out(px as u32, py as u32, glyph_color.a()),
                    }
                }
            },
        );
    }

    fn shape(&mut self, run: &TextRun) -> Buffer {
        let metrics = Metrics::new(run.px, run.px * 1.2);
        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        let mut attrs = Attrs::new().family(Family::Name(run.family));
        if run.bold {
            attrs = attrs.weight(Weight::BOLD);
        }
        buffer.set_text(&mut self.font_system, run.text, &attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);
        buffer
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}
