//! Output formatting for traced messages.
//!
//! Times are printed relative to the first message seen, as
//! `seconds.microseconds`.

use std::io::Write;

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use oftrace_core::{OpenFlowMessage, SessionBacklog};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One `FROM .. TO .. OFP_TYPE .. TIME ..` line per message (default)
    Text,
    /// Pretty-printed table, written once the capture is done
    Table,
    /// Comma-separated values
    Csv,
    /// JSON Lines (one JSON object per message)
    Json,
}

/// Writes messages in the chosen format.
pub struct OutputFormatter {
    format: OutputFormat,
    first_ts: Option<i64>,
    header_written: bool,
    table: Option<Table>,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        let table = (format == OutputFormat::Table).then(|| {
            let mut table = Table::new();
            table.set_header(vec![
                "from", "to", "type", "name", "xid", "length", "time", "truncated",
            ]);
            table
        });
        Self {
            format,
            first_ts: None,
            header_written: false,
            table,
        }
    }

    /// Format one message and write it (or buffer it, for tables).
    pub fn write_message<W: Write>(
        &mut self,
        msg: &OpenFlowMessage,
        writer: &mut W,
    ) -> std::io::Result<()> {
        let time = self.relative_time(msg.timestamp_us);
        let from = format!("{}:{}", msg.flow.src_ip, msg.flow.src_port);
        let to = format!("{}:{}", msg.flow.dst_ip, msg.flow.dst_port);

        match self.format {
            OutputFormat::Text => writeln!(
                writer,
                "FROM {} TO {} OFP_TYPE {} TIME {}",
                from, to, msg.header.msg_type, time
            ),
            OutputFormat::Table => {
                if let Some(table) = self.table.as_mut() {
                    table.add_row(vec![
                        Cell::new(from),
                        Cell::new(to),
                        Cell::new(msg.header.msg_type),
                        Cell::new(msg.type_name()),
                        Cell::new(msg.header.xid),
                        Cell::new(msg.header.length),
                        Cell::new(time),
                        Cell::new(msg.truncated),
                    ]);
                }
                Ok(())
            }
            OutputFormat::Csv => {
                if !self.header_written {
                    writeln!(writer, "from,to,type,name,xid,length,time,truncated")?;
                    self.header_written = true;
                }
                writeln!(
                    writer,
                    "{},{},{},{},{},{},{},{}",
                    from,
                    to,
                    msg.header.msg_type,
                    msg.type_name(),
                    msg.header.xid,
                    msg.header.length,
                    time,
                    msg.truncated
                )
            }
            OutputFormat::Json => {
                let obj = serde_json::json!({
                    "from": from,
                    "to": to,
                    "frame": msg.frame_number,
                    "type": msg.header.msg_type,
                    "name": msg.type_name(),
                    "xid": msg.header.xid,
                    "length": msg.header.length,
                    "time": time,
                    "truncated": msg.truncated,
                });
                writeln!(writer, "{obj}")
            }
        }
    }

    /// Flush anything buffered.
    pub fn finish<W: Write>(&mut self, writer: &mut W) -> std::io::Result<()> {
        match self.table.take() {
            Some(table) => writeln!(writer, "{table}"),
            None => Ok(()),
        }
    }

    fn relative_time(&mut self, timestamp_us: i64) -> String {
        let first = *self.first_ts.get_or_insert(timestamp_us);
        let delta = (timestamp_us - first).max(0);
        format!("{}.{:06}", delta / 1_000_000, delta % 1_000_000)
    }
}

/// Render per-session backlog as a table.
pub fn write_backlog<W: Write>(backlog: &[SessionBacklog], writer: &mut W) -> std::io::Result<()> {
    let mut table = Table::new();
    table.set_header(vec!["flow", "fragments", "queued bytes", "skips", "closing"]);
    for session in backlog {
        table.add_row(vec![
            Cell::new(session.flow),
            Cell::new(session.fragments),
            Cell::new(session.queued_bytes),
            Cell::new(session.skips),
            Cell::new(session.close_pending),
        ]);
    }
    writeln!(writer, "{table}")
}
