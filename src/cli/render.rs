use std::fmt::Write;

use ansi_term::{Colour, Style};
use anyhow::{anyhow, Result};
use chrono::{Datelike, NaiveDate};

use crate::{
    calendar::{DailyValue, MonthGrid},
    projector::CalendarProjector,
    theme::{Color, ColorTheme},
};

const WEEKDAYS: &str = "Mo Tu We Th Fr Sa Su";

/// Renders the current outputs of the projector. The previous month goes first, so the calendar
/// reads top to bottom.
pub fn render_calendar<S>(projector: &CalendarProjector<S>) -> Result<String> {
    let mut out = String::new();
    let source = projector.active_source().unwrap_or("-");
    writeln!(out, "{} / {source}", projector.username())?;
    writeln!(out, "{}", projector.label())?;
    writeln!(out)?;
    render_month(&mut out, projector.second_month(), projector.second_color(), None)?;
    writeln!(out)?;
    render_month(
        &mut out,
        projector.first_month(),
        projector.first_color(),
        Some(projector.current_day()),
    )?;
    Ok(out)
}

fn render_month(
    out: &mut String,
    grid: &MonthGrid,
    theme: &ColorTheme,
    today: Option<u32>,
) -> Result<()> {
    let first = NaiveDate::from_ymd_opt(grid.year(), grid.month(), 1)
        .ok_or_else(|| anyhow!("Invalid month {}-{}", grid.year(), grid.month()))?;
    writeln!(out, "{}", first.format("%B %Y"))?;
    writeln!(out, "{WEEKDAYS}")?;

    let max = grid
        .cells()
        .iter()
        .filter_map(DailyValue::value)
        .fold(0f64, f64::max);

    let offset = first.weekday().num_days_from_monday() as usize;
    out.push_str(&"   ".repeat(offset));
    for (day0, cell) in grid.cells().iter().enumerate() {
        let day = day0 as u32 + 1;
        let mut style = cell_style(*cell, max, theme);
        if today == Some(day) {
            style = style.underline().bold();
        }
        write!(out, "{}", style.paint(format!("{day:>2}")))?;
        if (offset + day0) % 7 == 6 {
            writeln!(out)?;
        } else {
            out.push(' ');
        }
    }
    if (offset + grid.len()) % 7 != 0 {
        writeln!(out)?;
    }
    Ok(())
}

/// Larger values get the stronger end of the gradient.
fn cell_style(value: DailyValue, max: f64, theme: &ColorTheme) -> Style {
    let color = match value {
        DailyValue::Absent => return Style::new().dimmed(),
        DailyValue::Value(v) if v <= 0. => theme.end,
        DailyValue::Value(v) if v * 2. < max => theme.main,
        DailyValue::Value(_) => theme.start,
    };
    match to_colour(color) {
        Some(colour) => Style::new().on(colour),
        None => Style::new(),
    }
}

fn to_colour(color: Color) -> Option<Colour> {
    (color.a != 0).then_some(Colour::RGB(color.r, color.g, color.b))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::render_calendar;
    use crate::{
        calendar::{series::DataSeries, DailyValue::Value},
        projector::CalendarProjector,
        store::metrics::{LocalUserStore, UserRecord},
        theme::PaletteThemeProvider,
        utils::clock::FixedClock,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_render_without_sources() {
        let projector = CalendarProjector::new(
            Box::new(FixedClock(date(2001, 1, 7))),
            LocalUserStore::new(),
            Box::new(PaletteThemeProvider::default()),
        );
        let rendered = render_calendar(&projector).unwrap();
        assert!(rendered.contains("No data sources available"));
        assert!(rendered.contains("December 2000"));
        assert!(rendered.contains("January 2001"));
        assert!(rendered.find("December 2000") < rendered.find("January 2001"));
    }

    #[test]
    fn test_render_colors_cells_with_values() {
        let mut store = LocalUserStore::new();
        let record: UserRecord = [(
            "steps".to_string(),
            DataSeries::new(date(2001, 1, 7), [Value(100.), Value(0.)], "%1 steps"),
        )]
        .into_iter()
        .collect();
        store.insert("alice".to_string(), record);

        let mut projector = CalendarProjector::new(
            Box::new(FixedClock(date(2001, 1, 7))),
            store,
            Box::new(PaletteThemeProvider::default()),
        );
        projector.set_username("alice");
        projector.refresh();

        let rendered = render_calendar(&projector).unwrap();
        assert!(rendered.contains("alice / steps"));
        assert!(rendered.contains("100 steps"));
        // Background escape for at least one cell.
        assert!(rendered.contains("48;2;"));
    }
}
