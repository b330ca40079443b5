//! Word-cloud layout and SVG output.
//!
//! Layout follows the usual word-cloud recipe: most frequent terms first,
//! font size scaled relative to the previous term, each word placed at the
//! first free spot on a spiral out of the canvas centre. Free space is kept
//! in a coarse occupancy grid with a summed-area table so a candidate box is
//! checked in constant time.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::fmt::Write as _;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::CloudConfig;
use crate::frequency::{Category, CategoryCounters, FrequencyCounter};

/// Side of one occupancy cell in pixels
const CELL: u32 = 4;

/// Free pixels kept around every word
const MARGIN: f32 = 2.0;

/// Average advance of one grapheme relative to the font size
const GLYPH_WIDTH: f32 = 0.6;

const LINE_HEIGHT: f32 = 1.1;
const BASELINE: f32 = 0.85;

/// Height of the caption band above the cloud in `to_svg`
const TITLE_BAND: u32 = 36;

const PLACEHOLDER: &str = "Sin términos";

const VIRIDIS: [&str; 10] = [
    "#440154", "#482878", "#3e4989", "#31688e", "#26828e", "#1f9e89", "#35b779", "#6ece58",
    "#b5de2b", "#fde725",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedWord {
    pub text: String,
    pub count: usize,
    pub font_size: f32,
    /// Top-left corner of the word's box inside the cloud area.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Rotated 90° counter-clockwise.
    pub vertical: bool,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedPanel {
    /// Set for panels produced by `render_grid`.
    pub category: Option<Category>,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub background: String,
    pub words: Vec<PlacedWord>,
}

impl RenderedPanel {
    pub fn is_blank(&self) -> bool {
        self.words.is_empty()
    }

    /// Standalone SVG document: caption band on top, cloud below.
    pub fn to_svg(&self) -> String {
        let total_height = self.height + TITLE_BAND;
        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
            w = self.width,
            h = total_height
        );
        let _ = write!(
            svg,
            r#"<rect width="{}" height="{}" fill="{}"/>"#,
            self.width,
            total_height,
            escape_xml(&self.background)
        );
        let _ = write!(
            svg,
            r##"<text x="{}" y="{}" font-size="20" font-weight="bold" text-anchor="middle" fill="#222">{}</text>"##,
            self.width / 2,
            TITLE_BAND - 10,
            escape_xml(&self.title)
        );

        if self.is_blank() {
            let _ = write!(
                svg,
                r##"<text x="{}" y="{}" font-size="16" text-anchor="middle" fill="#888">{}</text>"##,
                self.width / 2,
                TITLE_BAND + self.height / 2,
                PLACEHOLDER
            );
        }

        let offset = TITLE_BAND as f32;
        for word in &self.words {
            let text = escape_xml(&word.text);
            if word.vertical {
                let _ = write!(
                    svg,
                    r#"<text transform="translate({:.1} {:.1}) rotate(-90)" font-size="{:.1}" fill="{}" textLength="{:.1}" lengthAdjust="spacingAndGlyphs">{}</text>"#,
                    word.x + word.font_size * BASELINE,
                    offset + word.y + word.height,
                    word.font_size,
                    word.color,
                    word.height,
                    text
                );
            } else {
                let _ = write!(
                    svg,
                    r#"<text x="{:.1}" y="{:.1}" font-size="{:.1}" fill="{}" textLength="{:.1}" lengthAdjust="spacingAndGlyphs">{}</text>"#,
                    word.x,
                    offset + word.y + word.font_size * BASELINE,
                    word.font_size,
                    word.color,
                    word.width,
                    text
                );
            }
        }

        svg.push_str("</svg>");
        svg
    }
}

/// Panels in display order; `columns` panels per row.
#[derive(Debug, Clone, Serialize)]
pub struct PanelGrid {
    pub columns: usize,
    pub panels: Vec<RenderedPanel>,
}

/// Noun, verb, adjective and proper-noun clouds in a 2×2 block followed by
/// the entity cloud.
pub fn render_grid(counters: &CategoryCounters, options: &CloudConfig) -> PanelGrid {
    let panels = Category::ALL
        .iter()
        .map(|category| {
            let mut panel = render(counters.get(*category), category.title(), options);
            panel.category = Some(*category);
            panel
        })
        .collect();
    PanelGrid { columns: 2, panels }
}

/// Lay out one cloud. An empty counter yields a blank panel.
pub fn render(counter: &FrequencyCounter, title: &str, options: &CloudConfig) -> RenderedPanel {
    let words = layout(counter, options);
    debug!(
        title,
        terms = counter.len(),
        placed = words.len(),
        "word cloud laid out"
    );
    RenderedPanel {
        category: None,
        title: title.to_string(),
        width: options.width,
        height: options.height,
        background: options.background.clone(),
        words,
    }
}

fn text_size(text: &str, font_size: f32) -> (f32, f32) {
    let graphemes = text.graphemes(true).count().max(1) as f32;
    (graphemes * GLYPH_WIDTH * font_size, font_size * LINE_HEIGHT)
}

fn layout(counter: &FrequencyCounter, options: &CloudConfig) -> Vec<PlacedWord> {
    let terms = counter.most_common(options.max_words);
    let Some(&(first, top_count)) = terms.first() else {
        return Vec::new();
    };

    let mut grid = Occupancy::new(options.width / CELL, options.height / CELL);
    if grid.cols == 0 || grid.rows == 0 {
        return Vec::new();
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let scaling = options.relative_scaling.clamp(0.0, 1.0) as f32;
    let min_size = options.min_font_size.max(1.0);

    let mut font_size = options.max_font_size.unwrap_or_else(|| {
        let by_height = options.height as f32 * 0.4;
        let (unit_width, _) = text_size(first, 1.0);
        by_height.min(options.width as f32 * 0.9 / unit_width)
    });
    let mut last_count = top_count as f32;
    let mut placed = Vec::with_capacity(terms.len());

    for (text, count) in terms {
        if scaling > 0.0 {
            let ratio = count as f32 / last_count;
            font_size = ((scaling * ratio + (1.0 - scaling)) * font_size).round();
        }

        let mut vertical = rng.gen::<f64>() >= options.prefer_horizontal;
        let mut flipped = false;
        let spot = loop {
            if font_size < min_size {
                break None;
            }
            let (text_width, text_height) = text_size(text, font_size);
            let (width, height) = if vertical {
                (text_height, text_width)
            } else {
                (text_width, text_height)
            };
            if let Some((cx, cy)) = grid.find_spot(cells(width), cells(height)) {
                break Some((cx, cy, width, height));
            }
            if !flipped && options.prefer_horizontal < 1.0 {
                vertical = !vertical;
                flipped = true;
                continue;
            }
            font_size = (font_size * 0.85).min(font_size - 1.0).floor();
            flipped = false;
        };

        // Nothing fits any more, smaller counts would not either
        let Some((cx, cy, width, height)) = spot else {
            break;
        };

        grid.fill(cx, cy, cells(width), cells(height));
        placed.push(PlacedWord {
            text: text.to_string(),
            count,
            font_size,
            x: (cx * CELL) as f32,
            y: (cy * CELL) as f32,
            width,
            height,
            vertical,
            color: VIRIDIS[rng.gen_range(0..VIRIDIS.len())].to_string(),
        });
        last_count = count as f32;
    }

    placed
}

fn cells(pixels: f32) -> u32 {
    ((pixels + MARGIN) / CELL as f32).ceil() as u32
}

/// Coarse canvas occupancy with a summed-area table over taken cells.
struct Occupancy {
    cols: u32,
    rows: u32,
    taken: Vec<bool>,
    sums: Vec<u32>,
}

impl Occupancy {
    fn new(cols: u32, rows: u32) -> Self {
        Self {
            cols,
            rows,
            taken: vec![false; (cols * rows) as usize],
            sums: vec![0; ((cols + 1) * (rows + 1)) as usize],
        }
    }

    fn sum_at(&self, col: u32, row: u32) -> u32 {
        self.sums[(row * (self.cols + 1) + col) as usize]
    }

    fn is_free(&self, cx: u32, cy: u32, w: u32, h: u32) -> bool {
        let (x1, y1) = (cx + w, cy + h);
        self.sum_at(x1, y1) + self.sum_at(cx, cy) == self.sum_at(cx, y1) + self.sum_at(x1, cy)
    }

    fn fill(&mut self, cx: u32, cy: u32, w: u32, h: u32) {
        for row in cy..cy + h {
            for col in cx..cx + w {
                self.taken[(row * self.cols + col) as usize] = true;
            }
        }
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let stride = (self.cols + 1) as usize;
        for row in 0..self.rows as usize {
            let mut line = 0;
            for col in 0..self.cols as usize {
                line += self.taken[row * self.cols as usize + col] as u32;
                self.sums[(row + 1) * stride + col + 1] = self.sums[row * stride + col + 1] + line;
            }
        }
    }

    /// First free top-left cell for a `w`×`h` box along an Archimedean
    /// spiral out of the centre, stretched to the canvas aspect ratio.
    fn find_spot(&self, w: u32, h: u32) -> Option<(u32, u32)> {
        if w > self.cols || h > self.rows {
            return None;
        }
        let max_x = (self.cols - w) as f64;
        let max_y = (self.rows - h) as f64;
        let (centre_x, centre_y) = (max_x / 2.0, max_y / 2.0);
        let aspect = self.cols as f64 / self.rows as f64;

        let mut t = 0.0f64;
        let mut last = None;
        loop {
            let radius = 0.5 * t;
            if radius > centre_y + 1.0 && radius * aspect > centre_x + 1.0 {
                return None;
            }
            let x = (centre_x + radius * aspect * t.cos()).round();
            let y = (centre_y + radius * t.sin()).round();
            t += 1.0 / (radius * aspect.max(1.0)).max(1.0);

            if x < 0.0 || y < 0.0 || x > max_x || y > max_y {
                continue;
            }
            let candidate = (x as u32, y as u32);
            if last == Some(candidate) {
                continue;
            }
            last = Some(candidate);
            if self.is_free(candidate.0, candidate.1, w, h) {
                return Some(candidate);
            }
        }
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
