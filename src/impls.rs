pub mod feed;
pub mod memory;
pub mod qr;
pub mod tokener;
