pub mod create_donation;

pub use create_donation::{CreateDonation, DonationInput};
