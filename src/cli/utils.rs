//! CLI utility functions
//!
//! Helpers shared across commands: table rendering and secret masking.

use tabled::settings::Style;
use tabled::{Table, Tabled};

const MASK: &str = "********";

/// Render rows as a table in the house style
pub fn render_table<T: Tabled>(rows: impl IntoIterator<Item = T>) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Hide a secret value unless explicitly requested
pub fn display_value(value: &str, show: bool) -> String {
    if show || value.is_empty() {
        value.to_string()
    } else {
        MASK.to_string()
    }
}
