//! PDF export of aggregated reports.
//!
//! A4 portrait pages built directly on the `lopdf` object model. Text uses the base-14
//! Helvetica fonts with WinAnsi encoding, so no font files are embedded. Photos are decoded
//! with `image`, downscaled to the gallery cell and embedded as RGB image XObjects.
//!
//! Layout, top to bottom: a branding header (once per document), then one block per report
//! separated by a horizontal rule. Each block lists the report fields followed by a
//! three-column photo gallery that wraps onto new pages as needed.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use image::RgbImage;
use lopdf::{
    Dictionary, Document, Object, Stream, StringFormat,
    content::{Content, Operation},
    dictionary,
};
use tracing::{debug, instrument, warn};

use super::aggregator::ReporteConFotos;
use crate::{config::DocumentsConfig, db::models::reportes::DEFAULT_OBSERVACIONES, errors::Error};

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 50.0;
const FOOTER_HEIGHT: f32 = 20.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

const GRID_COLUMNS: usize = 3;
const GRID_GAP: f32 = 10.0;
const CELL_SIZE: f32 = (CONTENT_WIDTH - GRID_GAP * (GRID_COLUMNS as f32 - 1.0)) / GRID_COLUMNS as f32;
/// Embedded photos are decoded at twice the cell size for print quality
const CELL_PIXELS: u32 = (CELL_SIZE * 2.0) as u32;

const LOGO_SIZE: f32 = 48.0;
const BODY_SIZE: f32 = 10.0;
const LINE_SPACING: f32 = 1.4;

/// Where photos and branding come from.
#[derive(Debug, Clone)]
pub struct PdfOptions {
    pub images_dir: PathBuf,
    pub logo_path: Option<PathBuf>,
    pub brand_name: String,
}

impl From<&DocumentsConfig> for PdfOptions {
    fn from(config: &DocumentsConfig) -> Self {
        Self {
            images_dir: config.images_dir.clone(),
            logo_path: config.logo_path.clone(),
            brand_name: config.brand_name.clone(),
        }
    }
}

/// Render on the blocking pool. Image decoding and stream compression are CPU bound.
pub async fn render_pdf(reports: Vec<ReporteConFotos>, options: PdfOptions) -> Result<Vec<u8>, Error> {
    tokio::task::spawn_blocking(move || render_pdf_blocking(&reports, &options, Utc::now()))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn PDF rendering task: {e}"),
        })?
}

#[instrument(skip_all, fields(reports = reports.len()))]
pub fn render_pdf_blocking(reports: &[ReporteConFotos], options: &PdfOptions, generated_at: DateTime<Utc>) -> Result<Vec<u8>, Error> {
    let mut writer = PdfWriter::new();

    writer.header(options, reports.len(), generated_at);
    for (i, entry) in reports.iter().enumerate() {
        if i > 0 {
            writer.divider();
        }
        writer.report(entry, &options.images_dir);
    }

    writer.finish().map_err(|e| Error::Internal {
        operation: format!("render PDF: {e}"),
    })
}

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// Accumulates page content streams and image XObjects, breaking pages as the cursor runs out
/// of room.
struct PdfWriter {
    doc: Document,
    xobjects: Dictionary,
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    /// Top of the free area on the current page, in PDF user space (origin bottom left)
    y: f32,
}

impl PdfWriter {
    fn new() -> Self {
        Self {
            doc: Document::with_version("1.5"),
            xobjects: Dictionary::new(),
            pages: Vec::new(),
            current: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn ensure_space(&mut self, height: f32) {
        if self.y - height < MARGIN + FOOTER_HEIGHT {
            self.break_page();
        }
    }

    fn break_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn draw_text(&mut self, font: Font, size: f32, x: f32, baseline: f32, text: &str) {
        self.current.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.resource_name().as_bytes().to_vec()), size.into()]),
            Operation::new("Td", vec![x.into(), baseline.into()]),
            Operation::new("Tj", vec![Object::String(encode_win_ansi(text), StringFormat::Literal)]),
            Operation::new("ET", vec![]),
        ]);
    }

    /// One line of text at the cursor, moving the cursor down.
    fn line(&mut self, font: Font, size: f32, text: &str) {
        let height = size * LINE_SPACING;
        self.ensure_space(height);
        self.draw_text(font, size, MARGIN, self.y - size, text);
        self.y -= height;
    }

    /// Word-wrapped paragraph at the cursor.
    fn paragraph(&mut self, font: Font, size: f32, text: &str) {
        for line in wrap(text, max_chars(size)) {
            self.line(font, size, &line);
        }
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn divider(&mut self) {
        self.ensure_space(GRID_GAP * 2.0);
        let y = self.y - GRID_GAP;
        self.current.extend([
            Operation::new("q", vec![]),
            Operation::new("w", vec![0.5f32.into()]),
            Operation::new("RG", vec![0.6f32.into(), 0.6f32.into(), 0.6f32.into()]),
            Operation::new("m", vec![MARGIN.into(), y.into()]),
            Operation::new("l", vec![(PAGE_WIDTH - MARGIN).into(), y.into()]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
        self.y -= GRID_GAP * 2.0;
    }

    /// Register an image XObject and return its resource name.
    fn embed(&mut self, image: RgbImage) -> String {
        let name = format!("Im{}", self.xobjects.len() + 1);
        let (width, height) = image.dimensions();
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            image.into_raw(),
        );
        let id = self.doc.add_object(stream);
        self.xobjects.set(name.clone(), id);
        name
    }

    fn draw_image(&mut self, name: &str, x: f32, bottom: f32, width: f32, height: f32) {
        self.current.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![width.into(), 0.into(), 0.into(), height.into(), x.into(), bottom.into()],
            ),
            Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
    }

    fn header(&mut self, options: &PdfOptions, report_count: usize, generated_at: DateTime<Utc>) {
        let logo = options
            .logo_path
            .as_deref()
            .and_then(|path| load_image(path, (LOGO_SIZE * 2.0) as u32));

        let top = self.y;
        let text_x = match logo {
            Some(image) => {
                let (width, height) = fit(image.dimensions(), LOGO_SIZE);
                let name = self.embed(image);
                self.draw_image(&name, MARGIN, top - height, width, height);
                MARGIN + LOGO_SIZE + GRID_GAP
            }
            None => MARGIN,
        };

        self.draw_text(Font::Bold, 18.0, text_x, top - 18.0, &options.brand_name);
        let subtitle = format!(
            "Reporte de servicios - {} - {} reporte(s)",
            generated_at.format("%Y-%m-%d %H:%M UTC"),
            report_count
        );
        self.draw_text(Font::Regular, BODY_SIZE, text_x, top - 36.0, &subtitle);

        self.y = top - LOGO_SIZE.max(36.0 + BODY_SIZE);
        self.divider();
    }

    fn report(&mut self, entry: &ReporteConFotos, images_dir: &Path) {
        let r = &entry.reporte;
        let observaciones = if r.observaciones.trim().is_empty() {
            DEFAULT_OBSERVACIONES
        } else {
            r.observaciones.as_str()
        };

        // Keep the block title with at least its first lines
        self.ensure_space(13.0 * LINE_SPACING + 3.0 * BODY_SIZE * LINE_SPACING);
        self.line(Font::Bold, 13.0, &format!("Reporte #{}", r.id));
        self.line(Font::Regular, BODY_SIZE, &format!("Cliente: {} <{}>", r.cliente_nombre, r.cliente_email));
        self.line(
            Font::Regular,
            BODY_SIZE,
            &format!("Fecha: {}    Hora: {}", r.fecha_servicio.format("%Y-%m-%d"), r.hora_servicio),
        );
        self.paragraph(
            Font::Regular,
            BODY_SIZE,
            &format!("Coloración: {} - {}", r.coloracion_nombre, r.coloracion_descripcion),
        );
        self.paragraph(Font::Regular, BODY_SIZE, &format!("Fórmula: {}", r.formula));
        self.line(Font::Bold, BODY_SIZE, &format!("Precio: ${}", r.precio));
        self.paragraph(Font::Regular, BODY_SIZE, &format!("Observaciones: {observaciones}"));

        let images: Vec<RgbImage> = entry
            .fotos
            .iter()
            .filter_map(|foto| resolve_photo(images_dir, &foto.filename))
            .filter_map(|path| load_image(&path, CELL_PIXELS))
            .collect();

        if images.is_empty() {
            return;
        }

        self.gap(BODY_SIZE * 0.5);
        self.line(Font::Bold, BODY_SIZE, &format!("Fotos ({})", images.len()));
        self.gallery(images);
    }

    fn gallery(&mut self, images: Vec<RgbImage>) {
        let mut images = images.into_iter().peekable();
        while images.peek().is_some() {
            let row: Vec<RgbImage> = images.by_ref().take(GRID_COLUMNS).collect();
            let sizes: Vec<(f32, f32)> = row.iter().map(|img| fit(img.dimensions(), CELL_SIZE)).collect();
            let row_height = sizes.iter().map(|(_, h)| *h).fold(0.0, f32::max);

            self.ensure_space(row_height + GRID_GAP);
            let top = self.y;
            for (column, (image, (width, height))) in row.into_iter().zip(sizes).enumerate() {
                let name = self.embed(image);
                let x = MARGIN + column as f32 * (CELL_SIZE + GRID_GAP);
                self.draw_image(&name, x, top - height, width, height);
            }
            self.y = top - row_height - GRID_GAP;
        }
    }

    fn finish(mut self) -> lopdf::Result<Vec<u8>> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(std::mem::take(&mut self.current));
        }

        let pages_id = self.doc.new_object_id();
        let regular = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let bold = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = self.doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular,
                "F2" => bold,
            },
            "XObject" => std::mem::take(&mut self.xobjects),
        });

        let total = self.pages.len();
        let mut kids = Vec::with_capacity(total);
        for (index, mut operations) in std::mem::take(&mut self.pages).into_iter().enumerate() {
            let footer = format!("Página {} de {}", index + 1, total);
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), 8.into()]),
                Operation::new("Td", vec![(PAGE_WIDTH / 2.0 - 25.0).into(), (MARGIN / 2.0).into()]),
                Operation::new("Tj", vec![Object::String(encode_win_ansi(&footer), StringFormat::Literal)]),
                Operation::new("ET", vec![]),
            ]);

            let content = Content { operations }.encode()?;
            let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = self.doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => total as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        };
        self.doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

/// Only bare filenames resolve inside the image directory.
fn resolve_photo(images_dir: &Path, filename: &str) -> Option<PathBuf> {
    if filename.is_empty() || Path::new(filename).file_name() != Some(OsStr::new(filename)) {
        warn!(filename, "Skipping photo with a non-plain filename");
        return None;
    }
    Some(images_dir.join(filename))
}

/// Decode and downscale an image. Missing or unreadable files yield `None`.
fn load_image(path: &Path, max_pixels: u32) -> Option<RgbImage> {
    if !path.is_file() {
        debug!(path = %path.display(), "Image file not found, skipping");
        return None;
    }
    match image::open(path) {
        Ok(image) => Some(image.thumbnail(max_pixels, max_pixels).to_rgb8()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not decode image, skipping");
            None
        }
    }
}

/// Scale pixel dimensions to fit a square box of `size` points, keeping the aspect ratio.
fn fit((width, height): (u32, u32), size: f32) -> (f32, f32) {
    let longest = width.max(height).max(1) as f32;
    let scale = size / longest;
    (width as f32 * scale, height as f32 * scale)
}

/// Rough Helvetica capacity of one line at the given size
fn max_chars(size: f32) -> usize {
    (CONTENT_WIDTH / (size * 0.5)) as usize
}

/// Greedy word wrap. Words longer than a line are split.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                lines.push(word.drain(..max_chars).collect());
            }
            let word: String = word.into_iter().collect();
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Encode text for a WinAnsi base-14 font. Characters it cannot represent become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '€' => 0x80,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            _ => b'?',
        })
        .collect()
}
