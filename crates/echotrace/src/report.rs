use comfy_table::{Cell, Color, Table};
use echotrace_core::{HopRecord, PingStatistics, ProbeReport};
use std::time::Duration;

/// Render the ping session summary as a fixed-width table.
pub fn ping_table(timeout: Duration, stats: &PingStatistics) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Timeout", "Min", "Max", "Avg", "Sent", "Lost", "Lost %",
    ]);
    let (min, max, avg) = if stats.all_lost() {
        // avg of an all-lost session means "no data", not zero latency
        (Cell::new("-"), Cell::new("-"), Cell::new("-"))
    } else {
        (
            latency_cell(stats.min),
            latency_cell(stats.max),
            latency_cell(stats.avg),
        )
    };
    let loss_percent = stats.loss_percent();
    table.add_row(vec![
        Cell::new(format!("{}ms", timeout.as_millis())),
        min,
        max,
        avg,
        Cell::new(stats.count),
        Cell::new(stats.lost),
        Cell::new(format!("{loss_percent:.1}%")).fg(loss_color(loss_percent)),
    ]);
    table
}

/// Render the traceroute sweep as one row per probe attempt.
pub fn trace_table(hops: &[HopRecord]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Hop", "Host", "Latency"]);
    for hop in hops {
        for (i, probe) in hop.probes.iter().enumerate() {
            let hop_cell = if i == 0 {
                Cell::new(hop.ttl.0)
            } else {
                Cell::new("")
            };
            table.add_row(vec![hop_cell, host_cell(probe), probe_latency_cell(probe)]);
        }
    }
    table
}

fn host_cell(probe: &ProbeReport) -> Cell {
    probe.responder.map_or_else(
        || Cell::new("no response").fg(Color::Red),
        |addr| Cell::new(addr),
    )
}

fn probe_latency_cell(probe: &ProbeReport) -> Cell {
    probe
        .latency_ms()
        .map_or_else(|| Cell::new("-"), latency_cell)
}

fn latency_cell(latency_ms: f64) -> Cell {
    Cell::new(format!("{latency_ms:.3}ms")).fg(latency_color(latency_ms))
}

fn latency_color(latency_ms: f64) -> Color {
    if latency_ms > 30.0 {
        Color::Red
    } else if latency_ms > 20.0 {
        Color::Yellow
    } else {
        Color::Green
    }
}

fn loss_color(percent: f64) -> Color {
    if percent > 30.0 {
        Color::Red
    } else if percent > 10.0 {
        Color::Yellow
    } else {
        Color::Green
    }
}
