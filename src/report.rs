use core::fmt;

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};

/// Why a box-constrained solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// ‖P(x - ∇f) - x‖∞ <= grad_tol.
    ConvergedGradient,
    /// The iterate stopped moving.
    ConvergedStep,
    /// f(x) <= cost_tol.
    ConvergedCost,
    /// The iteration budget ran out first.
    MaxIterations,
    /// The objective returned a non-finite value, or no step decreased f
    /// while the projected gradient was still above `stall_tol`.
    NumericalFailure,
}

impl SolveStatus {
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            Self::ConvergedGradient | Self::ConvergedStep | Self::ConvergedCost
        )
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ConvergedGradient => "converged (projected gradient)",
            Self::ConvergedStep => "converged (step)",
            Self::ConvergedCost => "converged (cost)",
            Self::MaxIterations => "iteration limit reached",
            Self::NumericalFailure => "numerical failure",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone)]
pub struct SolverStats {
    pub status: SolveStatus,
    pub iterations: usize,
    pub cost: f64,
    /// ‖P(x - ∇f) - x‖∞ at the returned point.
    pub grad_inf: f64,
    pub step_norm: f64,
    pub fn_evals: usize,
    pub grad_evals: usize,
    pub hv_evals: usize,
}

#[derive(Debug, Clone)]
pub struct IterationReport {
    pub iteration: usize,
    pub cost: f64,
    pub grad_inf: f64,
    /// Accepted line-search step length.
    pub step_length: f64,
    pub step_norm: f64,
    /// Objective evaluations spent in the line search.
    pub line_search_evals: usize,
    /// Inner iterations (CG steps for Newton-type methods, 0 otherwise).
    pub inner_iterations: usize,
}

pub(crate) fn emit_line(line: &str) {
    if log::log_enabled!(log::Level::Info) {
        log::info!("{line}");
    } else {
        println!("{line}");
    }
}

/// Per-iteration hook of a box-constrained solve.
pub trait Reporter {
    /// Called after every accepted iterate `x`.
    fn on_iteration(&mut self, report: &IterationReport, x: &[f64]);
    fn on_finish(&mut self) {}
}

/// Buffers iteration reports and prints them as a table on finish.
pub struct StdoutReporter {
    rows: Vec<IterationReport>,
}

impl StdoutReporter {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }
}

impl Default for StdoutReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for StdoutReporter {
    fn on_iteration(&mut self, report: &IterationReport, _x: &[f64]) {
        self.rows.push(report.clone());
    }

    fn on_finish(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        if !log::log_enabled!(log::Level::Info) {
            println!();
        }
        for line in iteration_table(&self.rows).to_string().lines() {
            emit_line(line);
        }
        self.rows.clear();
    }
}

const COLUMNS: [&str; 7] = ["iter", "cost", "proj grad", "t", "step", "ls evals", "inner"];

fn columns_of(row: &IterationReport) -> [String; 7] {
    [
        row.iteration.to_string(),
        format!("{:.6e}", row.cost),
        format!("{:.1e}", row.grad_inf),
        format!("{:.2e}", row.step_length),
        format!("{:.1e}", row.step_norm),
        row.line_search_evals.to_string(),
        row.inner_iterations.to_string(),
    ]
}

/// Right-aligned numeric table, one row per accepted iterate.
fn iteration_table(rows: &[IterationReport]) -> Table {
    let right = |text: &str| Cell::new(text).set_alignment(CellAlignment::Right);
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(COLUMNS.map(right));
    for row in rows {
        table.add_row(columns_of(row).iter().map(|text| right(text)));
    }
    table
}

/// Prints the leading coordinates and the objective every `every` iterations:
/// `f( +1.000e0, +2.000e0, +0.000e0, ... ) = +3.000e0`.
pub struct EchoReporter {
    every: usize,
    leading: usize,
    lines: usize,
}

impl EchoReporter {
    pub fn new(every: usize, leading: usize) -> Self {
        Self {
            every: every.max(1),
            leading,
            lines: 0,
        }
    }

    /// Number of lines emitted so far.
    pub fn lines(&self) -> usize {
        self.lines
    }
}

impl Default for EchoReporter {
    fn default() -> Self {
        Self::new(100, 3)
    }
}

pub(crate) fn format_iterate(x: &[f64], leading: usize, cost: f64) -> String {
    let mut line = String::from("f( ");
    for v in x.iter().take(leading) {
        line.push_str(&format!("{v:+6.3e}, "));
    }
    if x.len() > leading {
        line.push_str("... ");
    }
    line.push_str(&format!(") = {cost:+6.3e}"));
    line
}

impl Reporter for EchoReporter {
    fn on_iteration(&mut self, report: &IterationReport, x: &[f64]) {
        if (report.iteration + 1) % self.every != 0 {
            return;
        }
        emit_line(&format!(
            "{:4} {}",
            report.iteration + 1,
            format_iterate(x, self.leading, report.cost)
        ));
        self.lines += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(iteration: usize) -> IterationReport {
        IterationReport {
            iteration,
            cost: 1.5,
            grad_inf: 0.1,
            step_length: 1.0,
            step_norm: 0.01,
            line_search_evals: 1,
            inner_iterations: 2,
        }
    }

    #[test]
    fn status_classification() {
        assert!(SolveStatus::ConvergedGradient.is_converged());
        assert!(SolveStatus::ConvergedStep.is_converged());
        assert!(!SolveStatus::MaxIterations.is_converged());
        assert!(!SolveStatus::NumericalFailure.is_converged());
        assert_eq!(SolveStatus::MaxIterations.to_string(), "iteration limit reached");
    }

    #[test]
    fn echo_formats_leading_coordinates() {
        let line = format_iterate(&[1.0, -2.0, 0.0, 4.0], 3, 3.0);
        assert!(line.starts_with("f( +1.000e0, -2.000e0, +0.000e0, ... )"));
        assert!(line.ends_with("= +3.000e0"));
    }

    #[test]
    fn echo_respects_period() {
        let mut echo = EchoReporter::new(2, 1);
        for i in 0..5 {
            echo.on_iteration(&report(i), &[1.0, 2.0]);
        }
        assert_eq!(echo.lines(), 2);
    }

    #[test]
    fn table_has_one_line_per_iterate() {
        let table = iteration_table(&[report(0), report(1)]);
        assert_eq!(table.row_iter().count(), 2);
        let text = table.to_string();
        assert!(text.contains("proj grad"));
        assert!(text.contains("1.500000e0"));
    }

    #[test]
    fn stdout_reporter_drains_rows() {
        let mut reporter = StdoutReporter::new();
        reporter.on_iteration(&report(0), &[0.0]);
        reporter.on_finish();
        assert!(reporter.rows.is_empty());
    }
}
