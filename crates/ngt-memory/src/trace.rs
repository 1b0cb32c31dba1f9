//! Leak report formatting
//!
//! Live allocations surviving a context are grouped by identical capture
//! stack, so a thousand leaked nodes from one call site read as one entry.
//! Traces are captured unresolved on the allocation path and resolved only
//! here, when a report is actually produced.

use crate::context::AllocRecord;
use backtrace::Backtrace;
use std::collections::HashMap;
use std::fmt::Write as _;

pub(crate) fn capture() -> Backtrace {
    Backtrace::new_unresolved()
}

struct Group {
    count: usize,
    bytes: usize,
    first_id: u64,
    sample: Option<Backtrace>,
}

pub(crate) fn format_leaks(context: &str, records: Vec<(usize, AllocRecord)>) -> String {
    let total: usize = records.iter().map(|(_, r)| r.size).sum();
    let mut groups: HashMap<Vec<usize>, Group> = HashMap::new();

    for (_, record) in records {
        let key: Vec<usize> = record
            .trace
            .as_ref()
            .map(|t| t.frames().iter().map(|f| f.ip() as usize).collect())
            .unwrap_or_default();
        match groups.get_mut(&key) {
            Some(group) => {
                group.count += 1;
                group.bytes += record.size;
                group.first_id = group.first_id.min(record.id);
            }
            None => {
                groups.insert(
                    key,
                    Group {
                        count: 1,
                        bytes: record.size,
                        first_id: record.id,
                        sample: record.trace,
                    },
                );
            }
        }
    }

    let mut ordered: Vec<Group> = groups.into_values().collect();
    ordered.sort_by(|a, b| b.bytes.cmp(&a.bytes).then(a.first_id.cmp(&b.first_id)));

    let mut out = String::new();
    let _ = writeln!(
        out,
        "context {context}: {} allocation(s) still live, {total} byte(s)",
        ordered.iter().map(|g| g.count).sum::<usize>(),
    );
    for group in ordered {
        let _ = writeln!(
            out,
            "  {} allocation(s), {} byte(s), first id {}",
            group.count, group.bytes, group.first_id
        );
        let Some(mut trace) = group.sample else { continue };
        trace.resolve();
        for frame in trace.frames() {
            if frame.symbols().is_empty() {
                let _ = writeln!(out, "    at {:p}", frame.ip());
                continue;
            }
            for symbol in frame.symbols() {
                match (symbol.name(), symbol.filename(), symbol.lineno()) {
                    (Some(name), Some(file), Some(line)) => {
                        let _ = writeln!(out, "    at {name} ({}:{line})", file.display());
                    }
                    (Some(name), _, _) => {
                        let _ = writeln!(out, "    at {name}");
                    }
                    _ => {
                        let _ = writeln!(out, "    at {:p}", frame.ip());
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u64, size: usize, trace: Option<Backtrace>) -> AllocRecord {
        AllocRecord { id, size, trace }
    }

    #[test]
    fn test_traceless_records_group_together() {
        let records = vec![
            (0x100, record(1, 64, None)),
            (0x200, record(2, 64, None)),
            (0x300, record(3, 32, None)),
        ];
        let report = format_leaks("plg_sample", records);
        assert!(report.contains("plg_sample"));
        assert!(report.contains("3 allocation(s) still live, 160 byte(s)"));
        assert!(report.contains("3 allocation(s), 160 byte(s), first id 1"));
    }

    #[test]
    fn test_captured_traces_resolve_in_report() {
        let records = vec![(0x400, record(7, 128, Some(capture())))];
        let report = format_leaks("plg_traced", records);
        assert!(report.contains("1 allocation(s), 128 byte(s), first id 7"));
        // At least one frame line follows the group header.
        assert!(report.contains("    at "));
    }
}
