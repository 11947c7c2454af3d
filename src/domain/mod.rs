pub mod board;
pub mod card;
pub mod ordering;
pub mod sanitize;

pub use board::{BoardSnapshot, NormalizeReport, RawSnapshot};
pub use card::{Card, CardId, CardView, Lane, Registrar};
pub use ordering::Direction;
