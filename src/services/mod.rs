pub mod chat;
pub mod email;
pub mod payment;
pub mod ticket_code;
