//! Calibration grid: 1 mm thin, 5 mm heavy, heaviest at the edges.

use image::Rgb;

use crate::canvas::{PaperCanvas, PAPER_HEIGHT_MM, PAPER_WIDTH_MM};

pub const THIN: Rgb<u8> = Rgb([255, 204, 204]);
pub const HEAVY: Rgb<u8> = Rgb([232, 96, 96]);
pub const BORDER: Rgb<u8> = Rgb([204, 0, 0]);

const BORDER_PX: u32 = 2;

fn style(index: u32, last: u32) -> (Rgb<u8>, u32) {
    if index == last {
        (BORDER, BORDER_PX)
    } else if index % 5 == 0 {
        (HEAVY, 1)
    } else {
        (THIN, 1)
    }
}

pub fn draw_grid(canvas: &mut PaperCanvas) {
    let columns = PAPER_WIDTH_MM as u32;
    let rows = PAPER_HEIGHT_MM as u32;

    // Thin lines first so heavy ones are never painted over.
    for pass_heavy in [false, true] {
        for i in 0..columns {
            let (color, width) = style(i, columns - 1);
            if (color != THIN) == pass_heavy {
                let (x, _) = canvas.to_px(i as f32, 0.0);
                canvas.vline_px(x, width, color);
            }
        }
        for i in 0..rows {
            let (color, width) = style(i, rows - 1);
            if (color != THIN) == pass_heavy {
                let (_, y) = canvas.to_px(0.0, i as f32);
                canvas.hline_px(y, width, color);
            }
        }
    }

    let (w, h) = (canvas.width() as f32, canvas.height() as f32);
    canvas.vline_px(0.0, BORDER_PX, BORDER);
    canvas.vline_px(w - BORDER_PX as f32, BORDER_PX, BORDER);
    canvas.hline_px(0.0, BORDER_PX, BORDER);
    canvas.hline_px(h - BORDER_PX as f32, BORDER_PX, BORDER);
}
