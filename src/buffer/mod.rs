mod lru_k_replacer;

pub use lru_k_replacer::*;
