//! NekoFilter tunnel session
//!
//! Drives a [`PacketFlow`](neko_platform::PacketFlow): reads batches of
//! outbound packets, filters DNS queries against the rule set, records each
//! decision and writes one packet back for every packet read.
//!
//! ## Example
//!
//! ```rust,no_run
//! use neko_core::Config;
//! use neko_platform::ReplayFlow;
//! use neko_tunnel::{SessionConfig, TunnelSession};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("nekofilter.toml")?;
//! let flow = ReplayFlow::from_file("capture.txt").await?;
//!
//! let mut session = TunnelSession::new(flow, SessionConfig::from_config(&config)?);
//! let handle = session.handle();
//! let summary = session.run().await?;
//! assert!(handle.state().is_terminal());
//! println!("blocked {} of {} packets", summary.blocked, summary.packets);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
pub use error::{Result, TunnelError};

pub mod session;
pub use session::{SessionConfig, SessionHandle, SessionState, SessionSummary, TunnelSession};
