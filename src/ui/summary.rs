use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use crate::registry::model::{TunnelRecord, TunnelStatus};
use crate::tunnel::command_line::port_from_command;
use crate::tunnel::TunnelInfo;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("  {}", line);
    }
}

fn status_text(status: TunnelStatus, use_color: bool) -> String {
    if !use_color {
        return format!("\u{25cf} {}", status);
    }
    match status {
        TunnelStatus::Running => format!("{} {}", "\u{25cf}".green(), "running".green()),
        TunnelStatus::New | TunnelStatus::Booting | TunnelStatus::Deploying => {
            format!("{} {}", "\u{25cf}".yellow(), status.yellow())
        }
        TunnelStatus::Halting | TunnelStatus::Terminated => {
            format!("{} {}", "\u{25cf}".red(), status.red())
        }
    }
}

pub fn print_startup_summary(info: &TunnelInfo) {
    let use_color = std::io::stdout().is_terminal();
    let origin = if info.previously_running {
        "reused"
    } else {
        "launched"
    };

    println!();
    if use_color {
        println!(
            "  {} {} ({})",
            "tunnelrig".bold(),
            info.identifier.cyan(),
            info.tunnel_id.dimmed()
        );
    } else {
        println!("  tunnelrig {} ({})", info.identifier, info.tunnel_id);
    }
    println!();

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Tunnel").set_alignment(CellAlignment::Left),
        Cell::new("Selenium endpoint").set_alignment(CellAlignment::Left),
        Cell::new("Origin").set_alignment(CellAlignment::Center),
    ]);
    table.add_row(vec![
        Cell::new(&info.tunnel_id),
        Cell::new(info.proxy_address.as_str()),
        Cell::new(origin),
    ]);
    print_indented(&table);

    println!();
    if info.previously_running {
        println!("  This tunnel was already running and will be left running on exit.");
    }
    if use_color {
        println!("  Press {} to stop", "Ctrl+C".bold());
    } else {
        println!("  Press Ctrl+C to stop");
    }
    println!();
}

/// Table of tunnel records, newest first.
pub fn tunnel_table(records: &[TunnelRecord], use_color: bool) -> Table {
    let mut sorted: Vec<&TunnelRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.creation_time.cmp(&a.creation_time).then(a.id.cmp(&b.id)));

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Id"),
        Cell::new("Identifier"),
        Cell::new("Status").set_alignment(CellAlignment::Center),
        Cell::new("Host"),
        Cell::new("Port").set_alignment(CellAlignment::Right),
    ]);

    for record in sorted {
        let port = record
            .command()
            .and_then(|command| port_from_command(command).ok())
            .map(|port| port.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(&record.id),
            Cell::new(record.tunnel_identifier.as_deref().unwrap_or("-")),
            Cell::new(status_text(record.status, use_color)),
            Cell::new(record.hostname().unwrap_or("-")),
            Cell::new(port).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn print_tunnel_list(records: &[TunnelRecord]) {
    if records.is_empty() {
        println!("No tunnels found.");
        return;
    }
    let use_color = std::io::stdout().is_terminal();
    print_indented(&tunnel_table(records, use_color));
}
