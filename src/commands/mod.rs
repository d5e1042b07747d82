pub mod delete;
pub mod doctor;
pub mod inspect;
pub mod jobs;
pub mod list;
pub mod start;
