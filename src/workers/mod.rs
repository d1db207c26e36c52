pub mod image_worker;
pub mod pool;
