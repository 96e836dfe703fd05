//! Ticket allocation and lifecycle rules.
//!
//! Everything in here is independent of HTTP: handlers pass the caller's
//! [`Identity`](crate::auth::Identity) in explicitly and map [`QueueError`] to
//! responses themselves.

pub mod clock;
pub mod error;
pub mod number;
pub mod service;
pub mod state;

pub use clock::{Clock, FixedClock, QueueCalendar, SystemClock};
pub use error::{QueueError, QueueResult};
pub use service::{QueueService, TicketDownload, TicketForm, TicketView};
