//! CrowdFlow Venue Demo - Terminal Visualization
//!
//! A crowd piles into one gate cell of a stadium forecourt. The demo prints
//! the occupancy grid around the gate, the alert the last arrival receives,
//! the cell it is sent to and the safest route there.
//!
//! Run: `cargo run --example venue_demo`

use crowdflow_core::grid::{LAT_STEP, LNG_STEP};
use crowdflow_core::{
    CellId, CrowdConfig, CrowdService, GeoPoint, LocationUpdate, PolygonZoneTable, SectorReportRequest, StatusQuery,
    StatusReport,
};
use crowdflow_env::{ParticipantId, TokioContext};
use std::sync::Arc;

// ============================================================================
// ANSI COLOR CODES
// ============================================================================

mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
}

use colors::*;

const GATE_ROW: i64 = 114_568;
const GATE_COL: i64 = -622;

fn point_in(cell: CellId, frac_lat: f64, frac_lng: f64) -> GeoPoint {
    GeoPoint::new(
        (cell.row as f64 + frac_lat) * LAT_STEP,
        (cell.col as f64 + frac_lng) * LNG_STEP,
    )
}

// ============================================================================
// RENDERING
// ============================================================================

fn render(report: &StatusReport, radius: i64) {
    let origin = report.cell;
    let rec = report.recommendation.map(|r| r.cell);
    let path = report.path.as_ref();

    println!("{}Occupancy around {} (limit {}){}", BOLD, origin, report.crowd_limit, RESET);
    for dr in (-radius..=radius).rev() {
        let mut line = String::from("  ");
        for dc in -radius..=radius {
            let cell = origin.offset(dr, dc);
            let count = report
                .occupancy_window
                .iter()
                .find(|c| c.cell == cell)
                .map_or(0, |c| c.count);

            let glyph = if cell == origin {
                format!("{}{:>3}{}", RED, count, RESET)
            } else if Some(cell) == rec {
                format!("{}{:>3}{}", GREEN, "★", RESET)
            } else if path.map_or(false, |p| p.visits(cell)) {
                format!("{}{:>3}{}", CYAN, "·", RESET)
            } else if count > report.crowd_limit {
                format!("{}{:>3}{}", YELLOW, count, RESET)
            } else if count == 0 {
                format!("{}{:>3}{}", DIM, ".", RESET)
            } else {
                format!("{:>3}", count)
            };
            line.push_str(&glyph);
        }
        println!("{}", line);
    }
}

fn main() {
    let ctx = TokioContext::shared();
    let gate = CellId::new(GATE_ROW, GATE_COL);

    let forecourt = [
        point_in(gate.offset(-3, -3), 0.0, 0.0),
        point_in(gate.offset(-3, 4), 0.0, 0.0),
        point_in(gate.offset(4, 4), 0.0, 0.0),
        point_in(gate.offset(4, -3), 0.0, 0.0),
    ];
    let zones = match PolygonZoneTable::new().with_zone("north-forecourt", &forecourt) {
        Ok(zones) => zones,
        Err(e) => {
            eprintln!("bad zone table: {}", e);
            std::process::exit(1);
        }
    };

    let config = CrowdConfig {
        crowd_limit: 4,
        ..CrowdConfig::interactive()
    };
    let service = CrowdService::new(ctx, config).with_zones(Arc::new(zones));

    println!("{}CrowdFlow venue demo{}", BOLD, RESET);
    println!("{}━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━{}", DIM, RESET);

    // A busy neighbour so the route has something to avoid
    for i in 0..6 {
        let id = ParticipantId::random();
        let p = point_in(gate.offset(0, 1), 0.3 + 0.05 * i as f64, 0.5);
        if let Err(e) = service.ingest_location(LocationUpdate {
            participant_id: id.clone(),
            lat: p.lat,
            lng: p.lng,
        }) {
            println!("  {}{} rejected: {}{}", RED, id, e, RESET);
        }
    }

    for i in 0..8 {
        let p = point_in(gate, 0.2 + 0.08 * i as f64, 0.4);
        match service.ingest_location(LocationUpdate {
            participant_id: ParticipantId::new(format!("fan-{}", i)),
            lat: p.lat,
            lng: p.lng,
        }) {
            Ok(ack) => println!(
                "  fan-{} → cell {} zone {}",
                i,
                ack.cell,
                ack.zone.as_deref().unwrap_or("-")
            ),
            Err(e) => println!("  {}fan-{} rejected: {}{}", RED, i, e, RESET),
        }
    }

    let me = point_in(gate, 0.5, 0.5);
    let report = match service.query_status(StatusQuery {
        participant_id: ParticipantId::new("late-arrival"),
        lat: me.lat,
        lng: me.lng,
        target: None,
        auto_route: false,
    }) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("status query failed: {}", e);
            std::process::exit(1);
        }
    };

    println!();
    render(&report, 3);
    println!();

    if report.should_alert {
        println!(
            "{}⚠ Crowded: you are #{} of {} in this cell{}",
            YELLOW, report.rank, report.occupancy, RESET
        );
    }
    match (&report.recommendation, &report.path) {
        (Some(rec), Some(path)) => println!(
            "{}→ Head to {} ({} people expected), {} steps, {:?}{}",
            GREEN,
            rec.cell,
            rec.projected_load,
            path.points.len().saturating_sub(1),
            path.outcome,
            RESET
        ),
        _ => println!("No quieter cell nearby; stay put."),
    }

    match service.report_density(SectorReportRequest {
        section_id: "north-forecourt".to_string(),
        level: 3,
    }) {
        Ok(report) => println!("  sector {} reported {:?}", report.section_id, report.level),
        Err(e) => println!("  {}sector report rejected: {}{}", RED, e, RESET),
    }
    let stats = service.stats();
    println!(
        "{}{} live participants in {} cells, {} reservations, {} sector reports{}",
        DIM, stats.live_participants, stats.occupied_cells, stats.reservations, stats.sector_reports, RESET
    );
}
