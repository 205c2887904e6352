//! Outbound notifications driven by domain events.
//!
//! Handlers here subscribe to the event bus and push information out of
//! the system. Delivery is best-effort: a failed send is logged and the
//! event is considered handled, matching the bus contract that handlers
//! never poison the queue.

pub mod handlers;
pub mod mailer;

pub use handlers::{OrderCreatedNotifier, StockLogHandler};
pub use mailer::{LogMailer, MailError, Mailer};
