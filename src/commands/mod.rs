pub mod capture;
pub mod clean;
pub mod listing;
pub mod membership;
pub mod status;
