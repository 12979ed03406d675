pub mod csv;
pub mod dispatch;
pub mod ingest;
pub mod processor;
pub mod webhook;
