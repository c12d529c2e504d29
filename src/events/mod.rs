//! # Events Module
//!
//! Scan progress broadcast for any number of observers.
//!
//! ## Design
//! The scan driver publishes a `ScanEvent` per visited asset. Observers
//! (progress bars, dashboards, notifications) subscribe independently and
//! never slow the driver down.
//!
//! ## Example
//! ```rust,ignore
//! let broadcaster = Broadcaster::new(50, 256);
//! let subscription = broadcaster.subscribe();
//!
//! std::thread::spawn(move || {
//!     for event in subscription.iter() {
//!         if let ScanEvent::Item(outcome) = event {
//!             println!("{}/{} {}", outcome.index, outcome.total, outcome.identifier);
//!         }
//!     }
//! });
//!
//! driver.run(&CancellationToken::new(), |_| {})?;
//! ```

mod channel;
mod types;

pub use channel::{Broadcaster, Subscription};
pub use types::*;
