//! oftrace - print the OpenFlow messages found in a packet capture.
//!
//! The engine lives in [`oftrace_core`]; this crate only adds the
//! command-line front end.
//!
//! # Example
//!
//! ```no_run
//! use oftrace_core::OfTrace;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut trace = OfTrace::open("controller.pcap")?;
//!     while let Some(msg) = trace.next_message()? {
//!         println!("{} {}", msg.flow, msg.type_name());
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
