// ABOUTME: API handler modules for the tagwatch HTTP server.

pub mod tags;
