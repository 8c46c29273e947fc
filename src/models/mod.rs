pub mod movie;
pub mod reservation;
pub mod showtime;
pub mod theatre;
pub mod user;

pub use movie::Movie;
pub use reservation::{Reservation, ReservationStatus};
pub use showtime::{Showtime, ShowtimeStatus};
pub use theatre::Theatre;
pub use user::{Role, User};
