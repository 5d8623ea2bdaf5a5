//! Plain-text rendering of pricing output.

use clinic_pricing::{Delta, PortfolioSummary, ScenarioOutcome, SensitivityCurve, ServiceResult};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::fmt::Write as _;

pub const CURRENCY: &str = "EGP";

fn grouped_amount(value: f64) -> Option<String> {
    let rounded = Decimal::from_f64(value)?.round_dp(0);
    let digits = rounded.abs().trunc().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded.is_sign_negative() && !rounded.is_zero() {
        Some(format!("-{grouped}"))
    } else {
        Some(grouped)
    }
}

/// Whole-unit amount with thousands separators, e.g. `12,345`.
/// Rounds half to even; values outside the decimal range render as `N/A`.
pub fn format_amount(value: f64) -> String {
    grouped_amount(value).unwrap_or_else(|| "N/A".to_string())
}

pub fn format_currency(value: f64) -> String {
    grouped_amount(value)
        .map(|amount| format!("{amount} {CURRENCY}"))
        .unwrap_or_else(|| "N/A".to_string())
}

/// Case counts keep one decimal; an unreachable break-even shows as `∞`.
pub fn format_cases(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.1}")
    } else {
        "∞".to_string()
    }
}

/// `fraction` is a ratio, e.g. 0.35 renders as `35.0%`.
pub fn format_pct(fraction: f64) -> String {
    if fraction.is_finite() {
        format!("{:.1}%", fraction * 100.0)
    } else {
        "N/A".to_string()
    }
}

/// Left-aligned first column, right-aligned numbers.
struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new<const N: usize>(headers: [&str; N]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }
        let mut out = String::new();
        let mut line = |cells: &[String]| {
            let mut text = String::new();
            for (i, (cell, w)) in cells.iter().zip(&widths).enumerate() {
                let pad = w.saturating_sub(cell.chars().count());
                if i > 0 {
                    text.push_str("  ");
                }
                if i == 0 {
                    text.push_str(cell);
                    text.extend(std::iter::repeat(' ').take(pad));
                } else {
                    text.extend(std::iter::repeat(' ').take(pad));
                    text.push_str(cell);
                }
            }
            out.push_str(text.trim_end());
            out.push('\n');
        };
        line(&self.headers);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        line(&rule);
        for row in &self.rows {
            line(row);
        }
        out
    }
}

pub fn render_results(results: &[ServiceResult]) -> String {
    let mut t = Table::new([
        "Service",
        "Cases",
        "Hours",
        "Fixed/case",
        "Total cost",
        "Price",
        "CM",
        "CM %",
        "Break-even",
        "Profit",
    ]);
    for r in results {
        t.row(vec![
            r.service.display_name.clone(),
            r.service.expected_cases.to_string(),
            format!("{:.2}", r.service_hours),
            format_amount(r.fixed_cost_per_case),
            format_amount(r.total_cost_per_case),
            format_amount(r.price_per_case),
            format_amount(r.contribution_margin),
            format_pct(r.contribution_margin_ratio),
            format_cases(r.break_even_cases),
            format_amount(r.profit_expected),
        ]);
    }
    t.render()
}

pub fn render_summary(s: &PortfolioSummary) -> String {
    let rows = [
        ("Services", s.service_count.to_string()),
        ("Total fixed cost", format_currency(s.total_fixed_cost)),
        ("Expected revenue", format_currency(s.total_revenue)),
        ("Variable cost", format_currency(s.total_variable_cost)),
        ("Contribution", format_currency(s.total_contribution)),
        ("Expected profit", format_currency(s.total_profit)),
        ("Overall margin", format!("{:.1}%", s.overall_margin_pct)),
        ("Weighted CM ratio", format_pct(s.weighted_avg_cm_ratio)),
        (
            "Break-even revenue",
            format_currency(s.overall_break_even_revenue),
        ),
        ("Chair hours", format!("{:.1}", s.total_hours)),
        ("Revenue / hour", format_currency(s.avg_revenue_per_hour)),
        ("CM / hour", format_currency(s.avg_cm_per_hour)),
    ];
    let mut t = Table::new(["Portfolio", ""]);
    for (k, v) in rows {
        t.row(vec![k.to_string(), v]);
    }
    t.render()
}

pub fn render_sensitivity(curve: &SensitivityCurve) -> String {
    let mut out = format!(
        "Sensitivity: {} (variable {}, allocated fixed {}, margin {})\n",
        curve.display_name,
        format_currency(curve.variable_cost),
        format_currency(curve.allocated_fixed_cost),
        format_pct(curve.margin),
    );
    let mut t = Table::new(["Cases", "Price", "Break-even"]);
    for (n, price, be) in curve.points() {
        t.row(vec![n.to_string(), format_amount(price), format_cases(be)]);
    }
    out.push_str(&t.render());
    out
}

type Formatter = fn(f64) -> String;

fn delta_table(rows: &[(&str, &Delta, Formatter)]) -> String {
    let mut t = Table::new(["Metric", "Base", "Scenario", "Change"]);
    for &(label, delta, fmt) in rows {
        let change = match delta.change {
            Some(c) if c > 0.0 => format!("+{}", fmt(c)),
            Some(c) => fmt(c),
            None => "N/A".to_string(),
        };
        t.row(vec![label.to_string(), fmt(delta.base), fmt(delta.simulated), change]);
    }
    t.render()
}

fn format_points(value: f64) -> String {
    format!("{value:.1} pt")
}

pub fn render_scenario(outcome: &ScenarioOutcome) -> String {
    let d = &outcome.delta;
    let mut out = format!(
        "Scenario: fixed cost {}, margin {}\n",
        format_currency(outcome.total_fixed_cost),
        format_pct(outcome.margin)
    );
    let portfolio: [(&str, &Delta, Formatter); 4] = [
        ("Revenue", &d.total_revenue, format_amount),
        ("Profit", &d.total_profit, format_amount),
        ("Revenue / hour", &d.avg_revenue_per_hour, format_amount),
        ("Margin", &d.overall_margin_pct, format_points),
    ];
    out.push_str(&delta_table(&portfolio));
    if let Some(cmp) = &outcome.comparison {
        let _ = writeln!(out, "\n{}", cmp.display_name);
        let service: [(&str, &Delta, Formatter); 4] = [
            ("Price", &cmp.price_per_case, format_amount),
            ("CM", &cmp.contribution_margin, format_amount),
            ("Profit", &cmp.profit_expected, format_amount),
            ("Break-even", &cmp.break_even_cases, format_cases),
        ];
        out.push_str(&delta_table(&service));
    }
    out
}
