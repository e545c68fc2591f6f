pub mod booking;
pub mod hall;
pub mod price;
pub mod seat;
pub mod show;

pub use booking::{Booking, BookingStatus};
pub use hall::Hall;
pub use price::Price;
pub use seat::{Seat, SeatClass};
pub use show::Show;
