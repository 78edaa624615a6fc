pub mod user;
pub mod movie;
pub mod auditorium;
pub mod seat;
pub mod showtime;
pub mod reservation;

pub use user::{Role, User};
pub use movie::{Genre, Movie};
pub use auditorium::Auditorium;
pub use seat::Seat;
pub use showtime::Showtime;
pub use reservation::{Reservation, ReservationItem, ReservationStatus};
