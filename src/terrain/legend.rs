use super::stats::ClassStat;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const RED: Rgb<u8> = Rgb([220, 0, 0]);

const LEGEND_WIDTH: u32 = 450;
const HEADER_HEIGHT: u32 = 50;
const ROW_HEIGHT: u32 = 25;
const ALERT_HEIGHT: u32 = 30;

/// Draw the statistics legend into the bottom-left corner: white box, title,
/// one color chip + percentage row per class, alert lines underneath. When
/// no font is available the text is replaced by proportional bars.
pub fn draw_legend(
    img: &mut RgbImage,
    title: &str,
    stats: &[ClassStat],
    alerts: &[String],
    font: Option<&FontVec>,
) {
    let (w, h) = img.dimensions();

    let legend_w = LEGEND_WIDTH.min(w.saturating_sub(20));
    if legend_w < 80 || h < 60 {
        log::warn!("image too small for a legend, skipping");
        return;
    }

    let mut row_h = ROW_HEIGHT;
    let mut alert_h = ALERT_HEIGHT;
    let total_for = |row_h: u32, alert_h: u32| {
        HEADER_HEIGHT + row_h * stats.len() as u32 + alert_h * alerts.len() as u32
    };
    // Shrink rows for short images instead of overflowing the frame.
    if total_for(row_h, alert_h) + 20 > h {
        row_h = 14;
        alert_h = 16;
        if total_for(row_h, alert_h) + 20 > h {
            log::warn!("image too short for a legend, skipping");
            return;
        }
    }
    let total = total_for(row_h, alert_h);

    let x0 = 10i32;
    let y0 = (h - total - 10) as i32;

    draw_filled_rect_mut(img, Rect::at(x0, y0).of_size(legend_w, total), WHITE);
    draw_hollow_rect_mut(img, Rect::at(x0, y0).of_size(legend_w, total), BLACK);
    draw_hollow_rect_mut(
        img,
        Rect::at(x0 + 1, y0 + 1).of_size(legend_w - 2, total - 2),
        BLACK,
    );

    if let Some(font) = font {
        draw_text_mut(img, BLACK, x0 + 10, y0 + 12, PxScale::from(18.0), font, title);
    }

    let mut y = y0 + HEADER_HEIGHT as i32;
    for stat in stats {
        let chip = Rect::at(x0 + 10, y).of_size(20, row_h.saturating_sub(8).max(6));
        let color = stat.class.overlay_color();
        draw_filled_rect_mut(img, chip, Rgb(color));
        draw_hollow_rect_mut(img, chip, BLACK);

        match font {
            Some(font) => {
                let text = format!("{}: {:.2}%", stat.class.label(), stat.percentage);
                draw_text_mut(img, BLACK, x0 + 40, y, PxScale::from(14.0), font, &text);
            }
            None => {
                // Bar length proportional to coverage, full width = 100%.
                let bar_max = legend_w.saturating_sub(60);
                let bar_w = ((stat.percentage / 100.0) * bar_max as f64).round() as u32;
                if bar_w > 0 {
                    let bar = Rect::at(x0 + 40, y).of_size(bar_w, row_h.saturating_sub(10).max(4));
                    draw_filled_rect_mut(img, bar, Rgb(color));
                }
            }
        }
        y += row_h as i32;
    }

    for alert in alerts {
        match font {
            Some(font) => {
                draw_text_mut(img, RED, x0 + 10, y, PxScale::from(14.0), font, alert);
            }
            None => {
                let marker = Rect::at(x0 + 10, y).of_size(legend_w.saturating_sub(20), 4);
                draw_filled_rect_mut(img, marker, RED);
            }
        }
        y += alert_h as i32;
    }
}
