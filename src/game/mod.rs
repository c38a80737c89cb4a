pub mod client_view;
pub mod geometry;
pub mod scoring;
pub mod session;
