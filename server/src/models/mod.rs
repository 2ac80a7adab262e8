pub mod attendance;
pub mod certificate;
pub mod event;
pub mod ticket;
pub mod user;

pub use attendance::AttendanceRecord;
pub use certificate::Certificate;
pub use event::{Event, EventStatus, NewEvent};
pub use ticket::{Ticket, TicketCode, TicketStatus};
pub use user::{Caller, Role};
