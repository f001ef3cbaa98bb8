//! Table builder wrapper around comfy-table for consistent list display.

use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};
use console::style;

use crate::domain::models::ProblemSetCatalog;

/// Create a standard list table with the given headers.
///
/// Uses the NOTHING preset (no borders) for a clean CLI aesthetic.
pub fn list_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(h.to_uppercase()).set_alignment(CellAlignment::Left)),
        );
    table
}

/// Render the problem-set catalog, one table per category.
pub fn render_catalog(catalog: &ProblemSetCatalog) -> String {
    if catalog.categories.is_empty() {
        return "No problem sets found.".to_string();
    }

    let mut sections = vec!["Available problem sets:".to_string()];
    for (category, problem_sets) in &catalog.categories {
        let mut table = list_table(&["name", "id"]);
        for problem_set in problem_sets {
            table.add_row(vec![problem_set.name.clone(), problem_set.id.clone()]);
        }
        sections.push(format!("\n{}:\n{table}", style(category).bold()));
    }
    sections.join("\n")
}
