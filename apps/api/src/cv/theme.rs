use crate::cv::options::CvTheme;

/// RGB colour with components in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb(pub f32, pub f32, pub f32);

/// Colour role of a piece of text. The renderer resolves it against the theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ink {
    Text,
    Accent,
    Muted,
}

/// Typography and colours for one CV theme. Sizes are in points.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub kind: CvTheme,
    pub text: Rgb,
    pub accent: Rgb,
    pub muted: Rgb,
    pub title_size: f32,
    pub subtitle_size: f32,
    pub heading_size: f32,
    pub body_size: f32,
    /// Line height as a multiple of the font size.
    pub line_spacing: f32,
    pub heading_uppercase: bool,
    pub rule_under_heading: bool,
}

impl Theme {
    pub fn for_kind(kind: CvTheme) -> Self {
        match kind {
            CvTheme::NeonTech => Self {
                kind,
                text: Rgb(0.10, 0.10, 0.14),
                accent: Rgb(0.00, 0.62, 0.78),
                muted: Rgb(0.42, 0.42, 0.50),
                title_size: 24.0,
                subtitle_size: 13.0,
                heading_size: 13.0,
                body_size: 10.0,
                line_spacing: 1.35,
                heading_uppercase: true,
                rule_under_heading: true,
            },
            CvTheme::Minimal => Self {
                kind,
                text: Rgb(0.0, 0.0, 0.0),
                accent: Rgb(0.0, 0.0, 0.0),
                muted: Rgb(0.35, 0.35, 0.35),
                title_size: 20.0,
                subtitle_size: 12.0,
                heading_size: 12.0,
                body_size: 10.0,
                line_spacing: 1.3,
                heading_uppercase: false,
                rule_under_heading: false,
            },
            CvTheme::Enterprise => Self {
                kind,
                text: Rgb(0.13, 0.15, 0.20),
                accent: Rgb(0.12, 0.23, 0.45),
                muted: Rgb(0.40, 0.43, 0.48),
                title_size: 22.0,
                subtitle_size: 12.0,
                heading_size: 12.5,
                body_size: 10.5,
                line_spacing: 1.4,
                heading_uppercase: true,
                rule_under_heading: true,
            },
        }
    }

    pub fn color(&self, ink: Ink) -> Rgb {
        match ink {
            Ink::Text => self.text,
            Ink::Accent => self.accent,
            Ink::Muted => self.muted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_is_monochrome() {
        let theme = Theme::for_kind(CvTheme::Minimal);
        assert_eq!(theme.color(Ink::Accent), theme.color(Ink::Text));
        assert!(!theme.rule_under_heading);
    }

    #[test]
    fn test_title_is_largest_size() {
        for kind in [CvTheme::NeonTech, CvTheme::Minimal, CvTheme::Enterprise] {
            let theme = Theme::for_kind(kind);
            assert!(theme.title_size > theme.heading_size);
            assert!(theme.heading_size >= theme.body_size);
        }
    }
}
