//! Printable plain-text report.
//!
//! Mirrors what the result panel shows: the headline numbers, a breakdown by
//! category and the cargo rows. Output is split into fixed-height pages,
//! each closed by a footer with the generation date and page number.

use chrono::NaiveDate;

use crate::aggregate::AggregateResult;
use crate::calculator::CalculationSummary;
use crate::model::{CargoItem, ContainerSpec};

pub const REPORT_TITLE: &str = "Sea Freight Load Calculation Report";
const PRODUCT_NAME: &str = "Sea Freight Load Calculator";
const PAGE_BREAK: char = '\u{c}';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportOptions {
    /// Body lines per page, footer excluded
    pub lines_per_page: usize,
}

impl ReportOptions {
    pub const DEFAULT_LINES_PER_PAGE: usize = 50;
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            lines_per_page: Self::DEFAULT_LINES_PER_PAGE,
        }
    }
}

/// Everything the report needs.
#[derive(Clone, Copy, Debug)]
pub struct ReportInput<'a> {
    pub summary: &'a CalculationSummary,
    pub aggregate: &'a AggregateResult,
    pub container: &'a ContainerSpec,
    pub items: &'a [CargoItem],
}

/// Renders the report dated today (local time).
pub fn render_report_today(input: ReportInput<'_>, options: ReportOptions) -> String {
    render_report(input, chrono::Local::now().date_naive(), options)
}

/// Renders the report with an explicit date.
///
/// Pages are separated by a form feed.
pub fn render_report(input: ReportInput<'_>, date: NaiveDate, options: ReportOptions) -> String {
    let body = body_lines(input);
    let per_page = options.lines_per_page.max(1);
    let pages: Vec<&[String]> = body.chunks(per_page).collect();
    let page_count = pages.len().max(1);
    let date = date.format("%Y-%m-%d");

    let mut out = String::new();
    for (number, lines) in pages.iter().enumerate() {
        if number > 0 {
            out.push(PAGE_BREAK);
            out.push('\n');
        }
        for line in lines.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&format!(
            "Generated on {date} | {PRODUCT_NAME} | Page {} of {page_count}\n",
            number + 1
        ));
    }
    out
}

fn body_lines(input: ReportInput<'_>) -> Vec<String> {
    let ReportInput {
        summary,
        aggregate,
        container,
        items,
    } = input;

    let mut lines = vec![
        REPORT_TITLE.to_string(),
        "=".repeat(REPORT_TITLE.len()),
        String::new(),
        "Calculation Details".to_string(),
    ];

    let container_name = container.label.as_deref().unwrap_or("Custom");
    lines.extend(table(
        &["Parameter", "Value"],
        vec![
            row(["Total CBM", &format!("{:.2} m³", summary.total_volume_m3)]),
            row([
                "Suggested Container",
                &if summary.fits {
                    summary.suggested_container.to_string()
                } else {
                    format!("{} (exceeds capacity)", summary.suggested_container)
                },
            ]),
            row([
                "Estimated Weight",
                &format!("{:.2} kg", summary.total_weight_kg),
            ]),
            row([
                "Container",
                &format!(
                    "{container_name} ({} x {} x {} mm)",
                    container.length, container.width, container.height
                ),
            ]),
            row([
                "Volume Utilization",
                &format!("{:.1} %", aggregate.volume_utilization_pct),
            ]),
            row([
                "Weight Utilization",
                &format!("{:.1} %", aggregate.weight_utilization_pct),
            ]),
        ],
    ));
    if aggregate.volume_overflow {
        lines.push("Warning: cargo volume exceeds the container volume".to_string());
    }
    if aggregate.weight_overflow {
        lines.push("Warning: cargo weight exceeds the payload limit".to_string());
    }

    if !aggregate.categories.is_empty() {
        lines.push(String::new());
        lines.push("Category Breakdown".to_string());
        let rows = aggregate
            .categories
            .iter()
            .map(|(name, totals)| {
                vec![
                    name.clone(),
                    totals.count.to_string(),
                    format!("{:.2}", totals.volume_m3),
                    format!("{:.2}", totals.weight_kg),
                ]
            })
            .collect();
        lines.extend(table(
            &["Category", "Units", "Volume (m³)", "Weight (kg)"],
            rows,
        ));
    }

    lines.push(String::new());
    lines.push("Cargo Details".to_string());
    let rows = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            vec![
                format!("Item {}", index + 1),
                item.name.clone().unwrap_or_default(),
                format!("{} x {} x {}", item.length, item.width, item.height),
                format!("{:.2}", item.weight),
                item.quantity.to_string(),
                if item.is_fragile { "Fragile" } else { "Regular" }.to_string(),
            ]
        })
        .collect();
    lines.extend(table(
        &[
            "Item",
            "Name",
            "Dimensions (mm)",
            "Weight (kg)",
            "Qty",
            "Type",
        ],
        rows,
    ));
    lines
}

fn row<const N: usize>(cells: [&str; N]) -> Vec<String> {
    cells.iter().map(|cell| cell.to_string()).collect()
}

/// Left-aligned columns separated by `|`, with a rule under the header.
fn table(headers: &[&str], rows: Vec<Vec<String>>) -> Vec<String> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_row(headers.iter().copied(), &widths));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &rows {
        lines.push(format_row(row.iter().map(String::as_str), &widths));
    }
    lines
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width - cell.chars().count().min(*width);
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}
