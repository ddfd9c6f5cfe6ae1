pub mod lru_ttl;
