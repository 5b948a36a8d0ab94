pub mod feed;
pub mod qr;
pub mod repository;
pub mod tokener;
