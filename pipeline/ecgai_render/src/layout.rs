//! Panel positions of the standard 12-lead sheet.
//!
//! Four columns of three short leads, each column showing its own 2.5 s
//! segment, plus a full 10 s lead II rhythm strip along the bottom.

use std::ops::Range;

use ecgai_waveform::{Lead, NOMINAL_SAMPLES};

pub const COLUMNS_MM: [f32; 4] = [6.0, 68.0, 132.0, 194.0];
pub const ROWS_MM: [f32; 3] = [115.0, 82.0, 48.0];

pub const COLUMN_LEADS: [[Lead; 3]; 4] = [
    [Lead::I, Lead::II, Lead::III],
    [Lead::AVR, Lead::AVL, Lead::AVF],
    [Lead::V1, Lead::V2, Lead::V3],
    [Lead::V4, Lead::V5, Lead::V6],
];

/// Samples per column segment (2.5 s at 500 Hz).
pub const SEGMENT_SAMPLES: usize = 1250;
/// Trailing samples left out of each segment so traces do not touch.
pub const SEGMENT_GAP: usize = 20;

/// Horizontal scale: 25 mm/s at 500 Hz.
pub const MM_PER_SAMPLE: f32 = 0.05;
/// Vertical scale: 10 mm/mV.
pub const MM_PER_MV: f32 = 10.0;
/// Labels sit this far below the panel baseline.
pub const LABEL_DROP_MM: f32 = 3.0;

const RHYTHM_STRIP_MM: (f32, f32) = (6.0, 13.0);

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub lead: Lead,
    pub x_mm: f32,
    /// Baseline of the trace.
    pub y_mm: f32,
    pub samples: Range<usize>,
}

impl Panel {
    /// Paper coordinates of the samples this panel shows.
    pub fn points<'a>(&'a self, values: &'a [f64]) -> impl Iterator<Item = (f32, f32)> + 'a {
        let end = self.samples.end.min(values.len());
        let start = self.samples.start.min(end);
        values[start..end].iter().enumerate().map(move |(i, &mv)| {
            (
                i as f32 * MM_PER_SAMPLE + self.x_mm,
                mv as f32 * MM_PER_MV + self.y_mm,
            )
        })
    }
}

/// The twelve short panels followed by the rhythm strip.
pub fn panels() -> Vec<Panel> {
    let mut panels = Vec::with_capacity(13);
    for (column, (&x_mm, leads)) in COLUMNS_MM.iter().zip(COLUMN_LEADS.iter()).enumerate() {
        let start = SEGMENT_SAMPLES * column;
        let end = SEGMENT_SAMPLES * (column + 1) - SEGMENT_GAP;
        for (&y_mm, &lead) in ROWS_MM.iter().zip(leads.iter()) {
            panels.push(Panel {
                lead,
                x_mm,
                y_mm,
                samples: start..end,
            });
        }
    }
    panels.push(Panel {
        lead: Lead::II,
        x_mm: RHYTHM_STRIP_MM.0,
        y_mm: RHYTHM_STRIP_MM.1,
        samples: 0..NOMINAL_SAMPLES,
    });
    panels
}
