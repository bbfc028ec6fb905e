//! End-to-end scenario tests for the RingForge hub live in `tests/`.
