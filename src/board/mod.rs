pub mod client;
pub mod error;
pub mod types;

pub use client::JobBoardClient;
pub use error::BoardError;
pub use types::{Vacancy, VacancySummary};
