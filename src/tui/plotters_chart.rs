//! Plotters-rendered daily series chart for Ratatui.
//!
//! Plotters output is drawn into the Ratatui buffer through
//! `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// Render-only chart description; all series and bounds are computed by the caller.
pub struct SeriesChart<'a> {
    /// Daily values per 100k, x in days since the first row.
    pub daily: &'a [(f64, f64)],
    /// 7-day average per 100k.
    pub average: &'a [(f64, f64)],
    /// Policy marks: (x, is_start).
    pub markers: &'a [(f64, bool)],
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub y_label: &'a str,
    /// Tick label for an x value (days since the first row).
    pub fmt_x: &'a dyn Fn(f64) -> String,
}

impl Widget for SeriesChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 20 || area.height < 6 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 2)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .y_desc(self.y_label)
                .x_labels(4)
                .y_labels(4)
                .x_label_formatter(&|v| (self.fmt_x)(*v))
                .y_label_formatter(&|v| format!("{v:.0}"))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .draw()?;

            let daily_color = RGBColor(128, 128, 128);
            let average_color = RGBColor(0, 255, 255);
            let start_color = RGBColor(0, 255, 0);
            let stop_color = RGBColor(255, 0, 0);

            chart.draw_series(self.daily.iter().map(|&(x, y)| Pixel::new((x, y), daily_color)))?;
            chart.draw_series(LineSeries::new(self.average.iter().copied(), &average_color))?;
            for &(x, is_start) in self.markers {
                let color = if is_start { start_color } else { stop_color };
                chart.draw_series(LineSeries::new([(x, y0), (x, y1)], &color))?;
            }
            Ok(())
        });

        widget.render(area, buf);
    }
}
