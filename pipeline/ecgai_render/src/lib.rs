//! Renders a lead map onto clinical ECG paper as a PNG.
//!
//! Rendering never blocks a diagnosis: leads the layout needs but the map
//! lacks are skipped and reported in [`Rendered::missing`].

pub mod canvas;
pub mod error;
pub mod grid;
pub mod layout;
pub mod sheet;

use ecgai_waveform::{Lead, LeadSampleMap};

pub use canvas::{LabelFont, PaperCanvas};
pub use error::RenderError;
pub use layout::{panels, Panel};
pub use sheet::render_report_sheet;

use crate::canvas::{encode_png, BLACK};
use crate::layout::LABEL_DROP_MM;

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Font for lead labels; labels are skipped without one.
    pub font: Option<LabelFont>,
}

impl Default for RenderOptions {
    /// Labels in the bundled font.
    fn default() -> Self {
        let font = LabelFont::bundled()
            .map_err(|e| log::warn!("{e}; lead labels disabled"))
            .ok();
        Self { font }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Layout leads with no trace, in clinical order.
    pub missing: Vec<Lead>,
}

pub fn render(samples: &LeadSampleMap, options: &RenderOptions) -> Result<Rendered, RenderError> {
    let mut canvas = PaperCanvas::new();
    grid::draw_grid(&mut canvas);

    if options.font.is_none() {
        log::debug!("no label font; drawing traces without labels");
    }

    let mut missing = Vec::new();
    for panel in panels() {
        let Some(values) = samples.get(panel.lead) else {
            if !missing.contains(&panel.lead) {
                missing.push(panel.lead);
            }
            continue;
        };
        canvas.polyline_mm(panel.points(values), BLACK);
        if let Some(font) = &options.font {
            canvas.label_mm(font, panel.x_mm, panel.y_mm - LABEL_DROP_MM, panel.lead.name());
        }
    }
    missing.sort();

    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|lead| lead.name()).collect();
        log::warn!("rendering without leads: {}", names.join(", "));
    }

    let (width, height) = (canvas.width(), canvas.height());
    let png = encode_png(&canvas.into_image())?;
    Ok(Rendered {
        png,
        width,
        height,
        missing,
    })
}
