pub mod booking;
pub mod payment;
pub mod user;

pub use booking::Booking;
pub use payment::Payment;
pub use user::User;
