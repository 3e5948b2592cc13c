//! Access decision layer for labgate
//!
//! Every accepted card scan is sent to an access decision service which
//! answers whether the door should open. This crate provides the
//! [`DecisionService`] seam and its two implementations.
//!
//! # Components
//!
//! - **HttpDecisionClient**: posts the scan to the lab's HTTP endpoint
//! - **MockDecisionService**: scripted verdicts for tests and simulation
//!
//! # Example
//!
//! ```no_run
//! use labgate_core::{CardUid, Direction};
//! use labgate_network::{DecisionService, HttpDecisionClient, HttpDecisionConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpDecisionConfig {
//!     url: "http://localhost:8000/api/access".to_string(),
//!     controller_id: "RASPI_001".to_string(),
//!     timeout: Duration::from_millis(3000),
//! };
//!
//! let client = HttpDecisionClient::new(config)?;
//! let uid = CardUid::from_hex("04a2b3c4")?;
//! let decision = client.decide(&uid, Direction::Inside).await?;
//! println!("door opens: {}", decision.opens_door());
//! # Ok(())
//! # }
//! ```

#![allow(async_fn_in_trait)]

mod client;
mod decision;
mod mock;

pub use client::{HttpDecisionClient, HttpDecisionConfig};
pub use decision::{AnyDecisionService, Decision, DecisionError, DecisionService};
pub use mock::{MockDecisionHandle, MockDecisionService};
