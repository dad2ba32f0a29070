pub mod paper_cache;
pub mod request_throttle;

pub use paper_cache::PaperCache;
pub use request_throttle::RequestThrottle;
