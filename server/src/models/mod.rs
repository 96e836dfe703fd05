pub mod counter;
pub mod doctor;
pub mod service;
pub mod ticket;
pub mod user;

pub use counter::Counter;
pub use doctor::Doctor;
pub use service::{CreateService, Service, UpdateService};
pub use ticket::{
    CallTicket, CreateTicket, NewTicket, QueueTicket, TicketChange, TicketDetails, TicketStatus,
    TicketTransition, UpdateTicket,
};
pub use user::User;
