mod concurrency;
mod index_lifecycle;
mod resolution;
