//! Background services used by the whiteboard controller.
//!
//! ARCHITECTURE
//! ============
//! Controllers mutate in-memory history synchronously and hand remote writes
//! to services here, so websocket handling never waits on storage I/O.

pub mod persistence;
