pub mod chunk_store;
