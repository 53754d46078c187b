// CV assembly: options, summary text, declarative document, layout, PDF output.

pub mod document;
pub mod layout;
pub mod options;
pub mod render;
pub mod summary;
pub mod theme;

pub use document::{build_document, CvDocument};
pub use options::{CvOptions, CvTheme};
pub use render::render_pdf;
pub use summary::{CvSummary, SummaryWriter};
