//! # Event subscribers.
//!
//! Runtime events published on the [`Bus`](crate::events::Bus) are fanned out
//! to every [`Subscribe`] implementation through a [`SubscriberSet`].
//!
//! ```text
//!   runners ── publish(Event) ──► Bus ──► supervisor listener
//!                                              │
//!                                              ├──► AliveTracker (runner liveness)
//!                                              └──► SubscriberSet::emit
//!                                                        ├──► LogWriter
//!                                                        └──► custom subscribers
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
