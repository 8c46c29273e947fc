pub mod availability;
pub mod mailer;
pub mod mails;
pub mod payment;
pub mod reservations;
pub mod showtime_clock;
pub mod sweeper;
