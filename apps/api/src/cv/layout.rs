//! Text measurement and A4 pagination for the CV renderer.
//!
//! Widths come from static Helvetica / Helvetica-Bold AFM tables (per-mille of
//! the em). Both fonts are PDF base fonts, so the tables match what a viewer
//! draws for ASCII text. Text is folded to ASCII with `sanitize_text` before it
//! is measured, so wrapped lines match what is drawn.
//!
//! Index = (char as usize) - 32, covering 0x20..=0x7E.

use crate::cv::document::{Block, CvDocument};
use crate::cv::theme::{Ink, Theme};

// ────────────────────────────────────────────────────────────────────────────
// Page geometry
// ────────────────────────────────────────────────────────────────────────────

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
pub const MARGIN_MM: f32 = 18.0;
pub const CONTENT_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;

pub const PT_TO_MM: f32 = 0.352_778;
const BULLET_INDENT_MM: f32 = 4.5;
const HANGING_INDENT_MM: f32 = 4.5;
const RULE_HEIGHT_MM: f32 = 3.0;
const SECTION_GAP_MM: f32 = 4.0;
const BLOCK_GAP_MM: f32 = 1.2;
const FIT_EPSILON_MM: f32 = 0.001;
/// Descender depth as a fraction of the font size.
const DESCENT: f32 = 0.21;

// ────────────────────────────────────────────────────────────────────────────
// Font metrics
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Font {
    Helvetica,
    HelveticaBold,
}

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 333,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    333, 333, 584, 584, 584, 611, 975,
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    333, 278, 333, 584, 556, 333,
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889,
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500,
    389, 280, 389, 584,
];

impl Font {
    fn widths(self) -> &'static [u16; 95] {
        match self {
            Font::Helvetica => &HELVETICA,
            Font::HelveticaBold => &HELVETICA_BOLD,
        }
    }

    fn average_width(self) -> f32 {
        match self {
            Font::Helvetica => 0.556,
            Font::HelveticaBold => 0.611,
        }
    }

    /// Width of one character in em units.
    pub fn char_width_em(self, c: char) -> f32 {
        let code = c as usize;
        if (32..=126).contains(&code) {
            self.widths()[code - 32] as f32 / 1000.0
        } else {
            self.average_width()
        }
    }
}

/// Rendered width of `text` in millimetres.
pub fn measure(text: &str, font: Font, size_pt: f32) -> f32 {
    let em: f32 = text.chars().map(|c| font.char_width_em(c)).sum();
    em * size_pt * PT_TO_MM
}

// ────────────────────────────────────────────────────────────────────────────
// ASCII folding
// ────────────────────────────────────────────────────────────────────────────

/// Folds text to printable ASCII. Common typographic characters and Latin
/// accents are transliterated; anything else becomes `?`.
pub fn sanitize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if (' '..='~').contains(&c) {
            out.push(c);
            continue;
        }
        match c {
            '\t' | '\n' | '\r' | '\u{00A0}' | '\u{2002}'..='\u{200A}' => out.push(' '),
            '\u{200B}' | '\u{FEFF}' | '\u{00AD}' => {}
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => out.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' | '\u{00AB}' | '\u{00BB}' => {
                out.push('"')
            }
            '\u{2010}'..='\u{2015}' | '\u{2212}' => out.push('-'),
            '\u{2022}' | '\u{00B7}' | '\u{2023}' | '\u{25CF}' => out.push('*'),
            '\u{2026}' => out.push_str("..."),
            '\u{2122}' => out.push_str("(TM)"),
            '\u{00A9}' => out.push_str("(c)"),
            '\u{00AE}' => out.push_str("(R)"),
            '\u{2192}' => out.push_str("->"),
            '\u{00DF}' => out.push_str("ss"),
            '\u{00C6}' => out.push_str("AE"),
            '\u{00E6}' => out.push_str("ae"),
            '\u{0152}' => out.push_str("OE"),
            '\u{0153}' => out.push_str("oe"),
            other => out.push(fold_latin(other).unwrap_or('?')),
        }
    }
    out
}

fn fold_latin(c: char) -> Option<char> {
    let folded = match c {
        'À'..='Å' => 'A',
        'à'..='å' => 'a',
        'Ç' => 'C',
        'ç' => 'c',
        'È'..='Ë' => 'E',
        'è'..='ë' => 'e',
        'Ì'..='Ï' => 'I',
        'ì'..='ï' => 'i',
        'Ð' => 'D',
        'ð' => 'd',
        'Ñ' => 'N',
        'ñ' => 'n',
        'Ò'..='Ö' | 'Ø' => 'O',
        'ò'..='ö' | 'ø' => 'o',
        'Ù'..='Ü' => 'U',
        'ù'..='ü' => 'u',
        'Ý' => 'Y',
        'ý' | 'ÿ' => 'y',
        'Ł' => 'L',
        'ł' => 'l',
        'Š' => 'S',
        'š' => 's',
        'Ž' => 'Z',
        'ž' => 'z',
        _ => return None,
    };
    Some(folded)
}

// ────────────────────────────────────────────────────────────────────────────
// Line wrapping
// ────────────────────────────────────────────────────────────────────────────

/// Greedy word wrap. Words wider than a line are split across lines.
pub fn wrap_text(text: &str, font: Font, size_pt: f32, max_width_mm: f32) -> Vec<String> {
    wrap_hanging(text, font, size_pt, max_width_mm, max_width_mm)
}

/// Like `wrap_text`, with a different width for the first line.
fn wrap_hanging(
    text: &str,
    font: Font,
    size_pt: f32,
    first_width_mm: f32,
    rest_width_mm: f32,
) -> Vec<String> {
    let text = sanitize_text(text);
    let space = measure(" ", font, size_pt);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0_f32;

    let limit = |lines: &Vec<String>| {
        if lines.is_empty() {
            first_width_mm
        } else {
            rest_width_mm
        }
    };

    for word in text.split_whitespace() {
        let word_width = measure(word, font, size_pt);
        let candidate = if current.is_empty() {
            word_width
        } else {
            current_width + space + word_width
        };
        if candidate <= limit(&lines) {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_width = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_width = 0.0;
        }

        if word_width <= limit(&lines) {
            current.push_str(word);
            current_width = word_width;
            continue;
        }

        for c in word.chars() {
            let w = font.char_width_em(c) * size_pt * PT_TO_MM;
            if !current.is_empty() && current_width + w > limit(&lines) {
                lines.push(std::mem::take(&mut current));
                current_width = 0.0;
            }
            current.push(c);
            current_width += w;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

// ────────────────────────────────────────────────────────────────────────────
// Flow and pagination
// ────────────────────────────────────────────────────────────────────────────

/// A run of text in a single font. `x_mm` is measured from the left page edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub font: Font,
    pub ink: Ink,
    pub x_mm: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineContent {
    Text(Vec<Segment>),
    /// Horizontal rule across the content width.
    Rule,
}

/// A line before it is assigned to a page.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowLine {
    pub content: LineContent,
    pub size_pt: f32,
    pub space_before_mm: f32,
    /// Must share a page with the line that follows it.
    pub keep_with_next: bool,
}

impl FlowLine {
    fn height_mm(&self, theme: &Theme) -> f32 {
        match self.content {
            LineContent::Rule => RULE_HEIGHT_MM,
            LineContent::Text(_) => self.size_pt * theme.line_spacing * PT_TO_MM,
        }
    }
}

/// A line placed on a page. `y_mm` is measured from the bottom edge, as PDF does:
/// the text baseline, or the rule's vertical centre.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub content: LineContent,
    pub size_pt: f32,
    pub y_mm: f32,
    pub keep_with_next: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub lines: Vec<PlacedLine>,
}

/// Flattens the document into lines, wrapped to the content width.
pub fn flow(document: &CvDocument, theme: &Theme) -> Vec<FlowLine> {
    let mut out = Vec::new();
    for (i, section) in document.sections.iter().enumerate() {
        let mut gap = if i == 0 { 0.0 } else { SECTION_GAP_MM };
        for block in &section.blocks {
            let start = out.len();
            flow_block(block, theme, &mut out);
            if let Some(first) = out.get_mut(start) {
                first.space_before_mm += gap;
                gap = 0.0;
            }
        }
    }
    out
}

fn text_line(segments: Vec<Segment>, size_pt: f32) -> FlowLine {
    FlowLine {
        content: LineContent::Text(segments),
        size_pt,
        space_before_mm: 0.0,
        keep_with_next: false,
    }
}

fn segment(text: &str, font: Font, ink: Ink, x_mm: f32) -> Segment {
    Segment {
        text: sanitize_text(text),
        font,
        ink,
        x_mm,
    }
}

fn push_wrapped(
    out: &mut Vec<FlowLine>,
    text: &str,
    font: Font,
    ink: Ink,
    size_pt: f32,
    space_before_mm: f32,
) {
    for (i, line) in wrap_text(text, font, size_pt, CONTENT_WIDTH_MM)
        .into_iter()
        .enumerate()
    {
        let mut fl = text_line(vec![segment(&line, font, ink, MARGIN_MM)], size_pt);
        if i == 0 {
            fl.space_before_mm = space_before_mm;
        }
        out.push(fl);
    }
}

fn flow_block(block: &Block, theme: &Theme, out: &mut Vec<FlowLine>) {
    let body = theme.body_size;
    match block {
        Block::Title { text } => {
            push_wrapped(out, text, Font::HelveticaBold, Ink::Accent, theme.title_size, 0.0)
        }
        Block::Subtitle { text } => push_wrapped(
            out,
            text,
            Font::Helvetica,
            Ink::Muted,
            theme.subtitle_size,
            BLOCK_GAP_MM,
        ),
        Block::Heading { text } => {
            let text = if theme.heading_uppercase {
                text.to_uppercase()
            } else {
                text.clone()
            };
            let start = out.len();
            push_wrapped(
                out,
                &text,
                Font::HelveticaBold,
                Ink::Accent,
                theme.heading_size,
                BLOCK_GAP_MM,
            );
            if theme.rule_under_heading {
                out.push(FlowLine {
                    content: LineContent::Rule,
                    size_pt: theme.heading_size,
                    space_before_mm: 0.0,
                    keep_with_next: false,
                });
            }
            for line in &mut out[start..] {
                line.keep_with_next = true;
            }
        }
        Block::Paragraph { text } => {
            push_wrapped(out, text, Font::Helvetica, Ink::Text, body, BLOCK_GAP_MM)
        }
        Block::Bullet { text } => {
            let x = MARGIN_MM + BULLET_INDENT_MM;
            let width = CONTENT_WIDTH_MM - BULLET_INDENT_MM;
            for (i, line) in wrap_text(text, Font::Helvetica, body, width)
                .into_iter()
                .enumerate()
            {
                let mut segments = Vec::with_capacity(2);
                if i == 0 {
                    segments.push(segment("-", Font::Helvetica, Ink::Accent, MARGIN_MM + 1.0));
                }
                segments.push(segment(&line, Font::Helvetica, Ink::Text, x));
                let mut fl = text_line(segments, body);
                if i == 0 {
                    fl.space_before_mm = BLOCK_GAP_MM;
                }
                out.push(fl);
            }
        }
        Block::KeyValue { key, value } => {
            let label = sanitize_text(&format!("{key}: "));
            let label_width = measure(&label, Font::HelveticaBold, body);
            let key_segment = segment(label.trim_end(), Font::HelveticaBold, Ink::Text, MARGIN_MM);

            // Very long keys get a line of their own.
            if label_width > CONTENT_WIDTH_MM * 0.6 {
                let mut fl = text_line(vec![key_segment], body);
                fl.space_before_mm = BLOCK_GAP_MM;
                out.push(fl);
                let x = MARGIN_MM + HANGING_INDENT_MM;
                for line in wrap_text(value, Font::Helvetica, body, CONTENT_WIDTH_MM - HANGING_INDENT_MM) {
                    out.push(text_line(vec![segment(&line, Font::Helvetica, Ink::Text, x)], body));
                }
                return;
            }

            let lines = wrap_hanging(
                value,
                Font::Helvetica,
                body,
                CONTENT_WIDTH_MM - label_width,
                CONTENT_WIDTH_MM - HANGING_INDENT_MM,
            );
            let mut first = vec![key_segment];
            let mut rest = lines.into_iter();
            if let Some(line) = rest.next() {
                first.push(segment(&line, Font::Helvetica, Ink::Text, MARGIN_MM + label_width));
            }
            let mut fl = text_line(first, body);
            fl.space_before_mm = BLOCK_GAP_MM;
            out.push(fl);
            for line in rest {
                out.push(text_line(
                    vec![segment(&line, Font::Helvetica, Ink::Text, MARGIN_MM + HANGING_INDENT_MM)],
                    body,
                ));
            }
        }
        Block::Rule => out.push(FlowLine {
            content: LineContent::Rule,
            size_pt: body,
            space_before_mm: BLOCK_GAP_MM,
            keep_with_next: false,
        }),
    }
}

/// Height needed to place line `i` together with everything it must be kept with.
fn keep_chain_height(lines: &[FlowLine], i: usize, theme: &Theme, at_top: bool) -> f32 {
    let mut total = 0.0;
    let mut j = i;
    loop {
        let line = &lines[j];
        let gap = if j == i && at_top { 0.0 } else { line.space_before_mm };
        total += gap + line.height_mm(theme);
        if !line.keep_with_next || j + 1 >= lines.len() {
            break;
        }
        j += 1;
    }
    total
}

/// Lays the document out on A4 pages. Always returns at least one page.
pub fn paginate(document: &CvDocument, theme: &Theme) -> Vec<Page> {
    let lines = flow(document, theme);
    let top = PAGE_HEIGHT_MM - MARGIN_MM;
    let bottom = MARGIN_MM;

    let mut pages = vec![Page::default()];
    let mut cursor = top;

    for (i, line) in lines.iter().enumerate() {
        let mut at_top = pages.last().map_or(true, |p| p.lines.is_empty());
        let needed = keep_chain_height(&lines, i, theme, at_top);
        if !at_top && cursor - needed < bottom - FIT_EPSILON_MM {
            pages.push(Page::default());
            cursor = top;
            at_top = true;
        }

        let gap = if at_top { 0.0 } else { line.space_before_mm };
        let height = line.height_mm(theme);
        cursor -= gap + height;

        let y_mm = match line.content {
            LineContent::Rule => cursor + height / 2.0,
            LineContent::Text(_) => {
                let size_mm = line.size_pt * PT_TO_MM;
                cursor + (height - size_mm) / 2.0 + size_mm * DESCENT
            }
        };

        if let Some(page) = pages.last_mut() {
            page.lines.push(PlacedLine {
                content: line.content.clone(),
                size_pt: line.size_pt,
                y_mm,
                keep_with_next: line.keep_with_next,
            });
        }
    }

    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cv::document::{Section, SectionKind};
    use crate::cv::options::CvTheme;

    fn theme() -> Theme {
        Theme::for_kind(CvTheme::NeonTech)
    }

    #[test]
    fn test_measure_narrow_vs_wide() {
        assert!(measure("iiii", Font::Helvetica, 10.0) < measure("MMMM", Font::Helvetica, 10.0));
        assert!(
            measure("Hello", Font::HelveticaBold, 10.0) > measure("Hello", Font::Helvetica, 10.0)
        );
    }

    #[test]
    fn test_measure_scales_with_size() {
        let small = measure("abc", Font::Helvetica, 10.0);
        let large = measure("abc", Font::Helvetica, 20.0);
        assert!((large - 2.0 * small).abs() < 1e-4);
    }

    #[test]
    fn test_non_ascii_uses_average_width() {
        assert_eq!(Font::Helvetica.char_width_em('é'), 0.556);
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "The quick brown fox jumps over the lazy dog ".repeat(10);
        let lines = wrap_text(&text, Font::Helvetica, 10.0, 60.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(measure(line, Font::Helvetica, 10.0) <= 60.0 + 1e-3);
        }
        let rejoined = lines.join(" ");
        assert_eq!(
            rejoined.split_whitespace().count(),
            text.split_whitespace().count()
        );
    }

    #[test]
    fn test_wrap_hard_splits_long_words() {
        let word = "a".repeat(200);
        let lines = wrap_text(&word, Font::Helvetica, 10.0, 30.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(measure(line, Font::Helvetica, 10.0) <= 30.0 + 1e-3);
        }
        assert_eq!(lines.concat(), word);
    }

    #[test]
    fn test_wrap_measures_folded_text() {
        let text = "Acme\u{2122} widgets\u{2026} \u{00A9}2024 ".repeat(12);
        let lines = wrap_text(&text, Font::Helvetica, 10.0, 40.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.is_ascii());
            assert!(measure(line, Font::Helvetica, 10.0) <= 40.0 + 1e-3);
        }
        assert!(lines[0].contains("(TM)"));
    }

    #[test]
    fn test_wrap_empty_text() {
        assert!(wrap_text("   ", Font::Helvetica, 10.0, 50.0).is_empty());
    }

    fn long_document(sections: usize) -> CvDocument {
        let paragraph = "Designs and operates distributed services with careful attention to latency and correctness. ".repeat(3);
        let sections = (0..sections)
            .map(|i| Section {
                kind: SectionKind::Projects,
                blocks: vec![
                    Block::Heading {
                        text: format!("Section {i}"),
                    },
                    Block::Paragraph {
                        text: paragraph.clone(),
                    },
                    Block::KeyValue {
                        key: "Languages".to_string(),
                        value: "Rust, Go, Python".to_string(),
                    },
                    Block::Bullet {
                        text: paragraph.clone(),
                    },
                ],
            })
            .collect();
        CvDocument {
            title: "Long".to_string(),
            sections,
        }
    }

    #[test]
    fn test_short_document_fits_one_page() {
        let pages = paginate(&long_document(1), &theme());
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_long_document_spans_pages_within_margins() {
        let pages = paginate(&long_document(30), &theme());
        assert!(pages.len() > 1);
        for page in &pages {
            assert!(!page.lines.is_empty());
            for line in &page.lines {
                assert!(line.y_mm >= MARGIN_MM);
                assert!(line.y_mm <= PAGE_HEIGHT_MM - MARGIN_MM);
            }
        }
    }

    #[test]
    fn test_no_page_ends_with_heading() {
        for theme in [
            Theme::for_kind(CvTheme::NeonTech),
            Theme::for_kind(CvTheme::Minimal),
            Theme::for_kind(CvTheme::Enterprise),
        ] {
            for n in [12, 17, 23, 31] {
                let pages = paginate(&long_document(n), &theme);
                for page in &pages[..pages.len() - 1] {
                    let last = page.lines.last().unwrap();
                    assert!(!last.keep_with_next);
                }
            }
        }
    }

    #[test]
    fn test_lines_descend_within_page() {
        let pages = paginate(&long_document(3), &theme());
        for page in &pages {
            for pair in page.lines.windows(2) {
                assert!(pair[1].y_mm < pair[0].y_mm);
            }
        }
    }

    #[test]
    fn test_key_value_first_line_carries_key() {
        let doc = CvDocument {
            title: "t".to_string(),
            sections: vec![Section {
                kind: SectionKind::Skills,
                blocks: vec![Block::KeyValue {
                    key: "Languages".to_string(),
                    value: "Rust".to_string(),
                }],
            }],
        };
        let lines = flow(&doc, &theme());
        assert_eq!(lines.len(), 1);
        match &lines[0].content {
            LineContent::Text(segments) => {
                assert_eq!(segments[0].text, "Languages:");
                assert_eq!(segments[0].font, Font::HelveticaBold);
                assert_eq!(segments[1].text, "Rust");
                assert!(segments[1].x_mm > segments[0].x_mm);
            }
            LineContent::Rule => panic!("expected text"),
        }
    }

    #[test]
    fn test_flowed_lines_stay_inside_margins_after_folding() {
        let text = "\u{2026}\u{2122}\u{00A9} expands when drawn ".repeat(20);
        let doc = CvDocument {
            title: "t".to_string(),
            sections: vec![Section {
                kind: SectionKind::Summary,
                blocks: vec![
                    Block::Paragraph { text: text.clone() },
                    Block::Bullet { text },
                ],
            }],
        };
        let right_edge = MARGIN_MM + CONTENT_WIDTH_MM + 1e-3;
        for line in flow(&doc, &theme()) {
            if let LineContent::Text(segments) = &line.content {
                for seg in segments {
                    assert!(seg.text.is_ascii());
                    assert!(seg.x_mm + measure(&seg.text, seg.font, line.size_pt) <= right_edge);
                }
            }
        }
    }

    #[test]
    fn test_empty_document_has_one_page() {
        let doc = CvDocument {
            title: "empty".to_string(),
            sections: vec![],
        };
        assert_eq!(paginate(&doc, &theme()).len(), 1);
    }

    #[test]
    fn test_sanitize_typography() {
        assert_eq!(
            sanitize_text("\u{201C}Hi\u{201D} \u{2014} it\u{2019}s\u{2026}"),
            "\"Hi\" - it's..."
        );
        assert_eq!(sanitize_text("\u{2022} item"), "* item");
    }

    #[test]
    fn test_sanitize_folds_accents() {
        assert_eq!(sanitize_text("José Müller, Łukasz"), "Jose Muller, Lukasz");
        assert_eq!(sanitize_text("Straße"), "Strasse");
    }

    #[test]
    fn test_sanitize_replaces_unknown() {
        assert_eq!(sanitize_text("日本"), "??");
        assert_eq!(sanitize_text("plain ascii"), "plain ascii");
    }
}
