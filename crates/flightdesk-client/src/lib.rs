//! Client side of the flightdesk run stream.
//!
//! - [`sse`]: decodes `text/event-stream` bodies into [`Event`]s
//! - [`verify`]: [`EventVerifier`], the run lifecycle state machine
//! - [`RelayClient`]: posts runs to the server and returns verified streams
//!
//! ```rust,no_run
//! use flightdesk_client::{collect_run, RelayClient, RunIds};
//!
//! # async fn example() -> flightdesk_client::Result<()> {
//! let client = RelayClient::new("http://localhost:3001")?;
//! let events = collect_run(client.ask(&RunIds::random(), "flights from NYC to SFO").await?).await?;
//! println!("{} events", events.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod http;
pub mod sse;
pub mod verify;

pub use error::{ClientError, Result};
pub use http::{collect_run, RelayClient, RunIds, RunStream};
pub use verify::EventVerifier;

pub use flightdesk_core;
pub use flightdesk_core::event::Event;
