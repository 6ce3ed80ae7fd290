use std::path::Path;

use journal_events::Cursor;

use crate::controls::{StreamConfig, UnitFilter};

/// `journalctl` filter arguments for a connection; identical for replay and follow.
pub fn filter_args(config: &StreamConfig) -> Vec<String> {
    let mut args = Vec::new();

    if let Some((min, max)) = config.priority().bounds() {
        args.push("-p".to_string());
        if min == max {
            args.push(min.as_str().to_string());
        } else {
            args.push(format!("{}..{}", min.level(), max.level()));
        }
    }

    if let UnitFilter::Units(units) = config.units() {
        for unit in units {
            args.push("-u".to_string());
            args.push(unit.clone());
        }
    }

    args
}

/// One invocation of the reader: a bounded replay or an unbounded follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderRequest {
    Replay { backlog: u32, after: Option<Cursor> },
    Follow { after: Option<Cursor> },
}

impl ReaderRequest {
    pub fn argv(&self, filters: &[String]) -> Vec<String> {
        let mut args = vec!["--no-pager".to_string(), "-o".to_string(), "json".to_string()];
        match self {
            ReaderRequest::Replay { backlog, after } => {
                args.extend(filters.iter().cloned());
                push_after(&mut args, after.as_ref());
                args.push("-n".to_string());
                args.push(backlog.to_string());
            }
            ReaderRequest::Follow { after } => {
                push_after(&mut args, after.as_ref());
                args.push("-f".to_string());
                args.extend(filters.iter().cloned());
            }
        }
        args
    }
}

fn push_after(args: &mut Vec<String>, after: Option<&Cursor>) {
    if let Some(cursor) = after {
        args.push("--after-cursor".to_string());
        args.push(cursor.as_str().to_string());
    }
}

/// Shell-quoted command line, as shown in the `cmd:` debug notices.
pub fn display_command(binary: &Path, argv: &[String]) -> String {
    let binary = binary.to_string_lossy();
    shell_words::join(std::iter::once(binary.as_ref()).chain(argv.iter().map(String::as_str)))
}
