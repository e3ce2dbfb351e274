pub mod ioc;
pub mod vidc;
