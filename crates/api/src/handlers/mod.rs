pub mod combine;
pub mod projects;
