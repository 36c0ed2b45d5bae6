use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::lifecycle::DepartmentQueues;
use crate::replay::ReplayOutcome;

/// Formats a queue as `[101, 102]`, or `[EMPTY]`.
pub fn format_queue(members: &[u64]) -> String {
    if members.is_empty() {
        "[EMPTY]".to_string()
    } else {
        let ids: Vec<String> = members.iter().map(|m| m.to_string()).collect();
        format!("[{}]", ids.join(", "))
    }
}

fn format_department(out: &mut String, dept: &DepartmentQueues, outcome: &ReplayOutcome) {
    let _ = writeln!(
        out,
        "** Hospital {} / Department {} **",
        dept.hospital_id, dept.department_id
    );
    let _ = writeln!(out, "  pending   ({}): {}", dept.pending.len(), format_queue(&dept.pending));
    let _ = writeln!(out, "  confirmed ({}): {}", dept.confirmed.len(), format_queue(&dept.confirmed));

    for id in &dept.confirmed {
        if let Some((_, pos)) = outcome.positions.iter().find(|(pid, _)| pid == id) {
            let _ = writeln!(
                out,
                "    #{} -> position {} ({} ahead, {} in queue)",
                id, pos.user_position, pos.people_ahead, pos.total_queue_length
            );
        }
    }
}

/// Renders the whole replay result as plain text.
pub fn render_report(outcome: &ReplayOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Queue Replay ===");
    let _ = writeln!(out, "Events applied: {}", outcome.applied);

    if !outcome.issues.is_empty() {
        let _ = writeln!(out, "⚠️  Rejected rows ({}):", outcome.issues.len());
        for issue in &outcome.issues {
            let _ = writeln!(out, "  - line {}: {}", issue.line, issue.message);
        }
    }

    for dept in &outcome.departments {
        out.push('\n');
        format_department(&mut out, dept, outcome);
    }
    out
}

pub fn print_report(outcome: &ReplayOutcome) {
    print!("{}", render_report(outcome));
}

pub fn write_report_to_file<P: AsRef<Path>>(
    outcome: &ReplayOutcome,
    path: P,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = File::create(path)?;
    file.write_all(render_report(outcome).as_bytes())?;
    Ok(())
}
