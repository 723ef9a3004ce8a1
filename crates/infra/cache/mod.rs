pub mod in_memory_status_cache;
