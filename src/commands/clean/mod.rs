mod assemble;
mod config;
mod contacts;
mod fields;
mod membership;
mod run;
mod strip;
mod subjects;

pub use assemble::{TargetField, raw_field};
pub use membership::MembershipParser;
pub use run::run;
pub use strip::collapse_whitespace;
