use itertools::Itertools;
use prettytable::{cell, row, Cell, Row};

use super::table::ToRow;
use crate::reconcile::{ListOutcome, ListReport, PrefixEntry};

const EMPTY_VALUE: &str = "";

/// One line per prefix list in a reconciliation run
pub struct PlanSummaryRow<'a>(pub &'a ListReport);

impl<'a> ToRow for PlanSummaryRow<'a> {
    fn columns() -> Row {
        row!["Prefix List", "ID", "Current", "Desired", "Add", "Remove", "Result"]
    }

    fn to_row(&self) -> Row {
        let report = self.0;
        let mut row = match &report.plan {
            Some(plan) => row![
                report.name,
                plan.remote_id,
                plan.current.len(),
                plan.desired_full_set.len(),
                plan.to_add.len(),
                plan.to_remove.len(),
            ],
            None => row![
                report.name,
                EMPTY_VALUE,
                EMPTY_VALUE,
                EMPTY_VALUE,
                EMPTY_VALUE,
                EMPTY_VALUE,
            ],
        };
        row.add_cell(outcome_cell(&report.outcome));
        row
    }
}

fn outcome_cell(outcome: &ListOutcome) -> Cell {
    let (text, style) = match outcome {
        ListOutcome::Unchanged => ("Unchanged".to_string(), ""),
        ListOutcome::Planned => ("Planned (dry run)".to_string(), "Fy"),
        ListOutcome::Applied => ("Applied".to_string(), "Fg"),
        ListOutcome::ReadFailed(err) => (format!("Read failed: {}", err), "Fr"),
        ListOutcome::WriteFailed(err) => (format!("Write failed: {}", err), "Fr"),
    };
    Cell::new(&text).style_spec(style)
}

/// Prefixes added to or removed from one list
pub struct PrefixChangeRow<'a> {
    pub list: &'a str,
    pub added: bool,
    pub prefixes: Vec<&'a PrefixEntry>,
}

impl<'a> PrefixChangeRow<'a> {
    /// Up to two rows (additions, then removals) for a report with changes
    pub fn for_report(report: &'a ListReport) -> Vec<Self> {
        let plan = match &report.plan {
            Some(plan) => plan,
            None => return vec![],
        };
        vec![
            Self {
                list: &report.name,
                added: true,
                prefixes: plan.to_add.iter().collect(),
            },
            Self {
                list: &report.name,
                added: false,
                prefixes: plan.to_remove.iter().collect(),
            },
        ]
        .into_iter()
        .filter(|row| !row.prefixes.is_empty())
        .collect()
    }
}

impl<'a> ToRow for PrefixChangeRow<'a> {
    fn columns() -> Row {
        row!["Prefix List", "Change", "Prefixes"]
    }

    fn to_row(&self) -> Row {
        let change = if self.added {
            Cell::new("+ add").style_spec("Fg")
        } else {
            Cell::new("- remove").style_spec("Fr")
        };
        Row::new(vec![
            cell!(self.list),
            change,
            cell!(self.prefixes.iter().join("\n")),
        ])
    }
}
