pub mod config;
pub mod digest;
pub mod status;
pub mod sync;

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

/// Two-column table with the house style.
pub(crate) fn key_value_table(headers: [&str; 2]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(headers[0]).fg(Color::Cyan),
            Cell::new(headers[1]).fg(Color::Cyan),
        ]);
    table
}
