//! Service records and containers reported by the orchestration driver.

/// One container row of the topology, as listed by the driver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRecord {
    /// Container name
    pub name: String,

    /// Service the container belongs to
    pub service: String,

    /// Command the container runs
    pub command: String,

    /// Runtime state (e.g. "running", "exited")
    pub state: String,

    /// Published ports, already formatted
    pub ports: String,
}

/// A container backing a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub running: bool,
}

impl ContainerInfo {
    pub fn new(id: impl Into<String>, running: bool) -> Self {
        Self {
            id: id.into(),
            running,
        }
    }
}

const STATUS_HEADERS: [&str; 4] = ["NAME", "COMMAND", "STATE", "PORTS"];

/// Render records as a table with name, command, state and ports columns
pub fn format_status_table(records: &[ServiceRecord]) -> String {
    let rows: Vec<[&str; 4]> = records
        .iter()
        .map(|r| [r.name.as_str(), r.command.as_str(), r.state.as_str(), r.ports.as_str()])
        .collect();

    let mut widths = STATUS_HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &STATUS_HEADERS, &widths);
    let total = widths.iter().sum::<usize>() + 3 * (widths.len() - 1);
    out.push_str(&"-".repeat(total));
    out.push('\n');
    for row in &rows {
        push_row(&mut out, row, &widths);
    }

    out
}

fn push_row(out: &mut String, cells: &[&str; 4], widths: &[usize; 4]) {
    let line = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("   ");
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_has_header_and_rows() {
        let records = vec![ServiceRecord {
            name: "demo-web-1".to_string(),
            service: "web".to_string(),
            command: "nginx -g 'daemon off;'".to_string(),
            state: "running".to_string(),
            ports: "0.0.0.0:8080->80/tcp".to_string(),
        }];

        let table = format_status_table(&records);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[0].contains("COMMAND"));
        assert!(lines[0].ends_with("PORTS"));
        assert!(lines[1].chars().all(|c| c == '-'));
        assert!(lines[2].starts_with("demo-web-1"));
        assert!(lines[2].ends_with("0.0.0.0:8080->80/tcp"));
    }

    #[test]
    fn test_columns_are_aligned() {
        let records = vec![
            ServiceRecord {
                name: "a".to_string(),
                state: "running".to_string(),
                ..Default::default()
            },
            ServiceRecord {
                name: "much-longer-name".to_string(),
                state: "exited".to_string(),
                ..Default::default()
            },
        ];

        let table = format_status_table(&records);
        let lines: Vec<&str> = table.lines().collect();
        let state_col = lines[0].find("STATE").unwrap();
        assert_eq!(lines[2].find("running"), Some(state_col));
        assert_eq!(lines[3].find("exited"), Some(state_col));
    }

    #[test]
    fn test_empty_table_is_just_header() {
        let table = format_status_table(&[]);
        assert_eq!(table.lines().count(), 2);
    }
}
