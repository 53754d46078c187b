//! PDF output via printpdf's built-in Helvetica faces.
//!
//! Base-14 fonts are not embedded, which keeps files small but limits drawable
//! text to ASCII. Layout has already folded line text by the time it gets here.

use printpdf::{
    BuiltinFont, Color, CustomPdfConformance, IndirectFontRef, Line, Mm, PdfConformance,
    PdfDocument, PdfLayerReference, Point, Rgb as PdfRgb,
};
use thiserror::Error;
use tracing::debug;

use crate::cv::document::CvDocument;
use crate::cv::layout::{
    paginate, sanitize_text, Font, LineContent, Page, MARGIN_MM, PAGE_HEIGHT_MM, PAGE_WIDTH_MM,
};
use crate::cv::options::CvTheme;
use crate::cv::theme::{Ink, Rgb, Theme};

const FOOTER_SIZE_PT: f32 = 8.0;
const RULE_THICKNESS_PT: f32 = 0.6;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

impl Fonts {
    fn get(&self, font: Font) -> &IndirectFontRef {
        match font {
            Font::Helvetica => &self.regular,
            Font::HelveticaBold => &self.bold,
        }
    }
}

fn pdf_color(rgb: Rgb) -> Color {
    Color::Rgb(PdfRgb::new(rgb.0, rgb.1, rgb.2, None))
}

/// Renders the document into PDF bytes. CPU-bound; call it off the async runtime.
pub fn render_pdf(document: &CvDocument, kind: CvTheme) -> Result<Vec<u8>, RenderError> {
    let theme = Theme::for_kind(kind);
    let pages = paginate(document, &theme);

    let (doc, first_page, first_layer) = PdfDocument::new(
        sanitize_text(&document.title),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let doc = doc.with_conformance(PdfConformance::Custom(CustomPdfConformance {
        requires_icc_profile: false,
        requires_xmp_metadata: false,
        ..Default::default()
    }));

    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| RenderError::Pdf(format!("{e:?}")))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| RenderError::Pdf(format!("{e:?}")))?,
    };

    let total = pages.len();
    for (i, page) in pages.iter().enumerate() {
        let (page_index, layer_index) = if i == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(
                Mm(PAGE_WIDTH_MM),
                Mm(PAGE_HEIGHT_MM),
                format!("Layer {}", i + 1),
            )
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);
        draw_page(&layer, page, &theme, &fonts);
        draw_footer(&layer, i + 1, total, &theme, &fonts);
    }

    let bytes = doc
        .save_to_bytes()
        .map_err(|e| RenderError::Pdf(format!("{e:?}")))?;
    debug!(
        "Rendered {} page(s) with theme {} ({} bytes)",
        total,
        kind.as_str(),
        bytes.len()
    );
    Ok(bytes)
}

fn draw_page(layer: &PdfLayerReference, page: &Page, theme: &Theme, fonts: &Fonts) {
    for line in &page.lines {
        match &line.content {
            LineContent::Text(segments) => {
                for seg in segments {
                    if seg.text.is_empty() {
                        continue;
                    }
                    layer.set_fill_color(pdf_color(theme.color(seg.ink)));
                    layer.use_text(
                        seg.text.clone(),
                        line.size_pt,
                        Mm(seg.x_mm),
                        Mm(line.y_mm),
                        fonts.get(seg.font),
                    );
                }
            }
            LineContent::Rule => {
                layer.set_outline_color(pdf_color(theme.color(Ink::Accent)));
                layer.set_outline_thickness(RULE_THICKNESS_PT);
                layer.add_line(Line {
                    points: vec![
                        (Point::new(Mm(MARGIN_MM), Mm(line.y_mm)), false),
                        (Point::new(Mm(PAGE_WIDTH_MM - MARGIN_MM), Mm(line.y_mm)), false),
                    ],
                    is_closed: false,
                });
            }
        }
    }
}

fn draw_footer(layer: &PdfLayerReference, number: usize, total: usize, theme: &Theme, fonts: &Fonts) {
    layer.set_fill_color(pdf_color(theme.color(Ink::Muted)));
    layer.use_text(
        format!("Page {number} of {total}"),
        FOOTER_SIZE_PT,
        Mm(PAGE_WIDTH_MM - MARGIN_MM - 20.0),
        Mm(MARGIN_MM / 2.0),
        fonts.get(Font::Helvetica),
    );
}
