pub mod auth;
pub mod invitation;
pub mod join;
pub mod organization;
pub mod profile;
pub mod well_known;
