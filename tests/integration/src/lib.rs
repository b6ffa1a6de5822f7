//! End-to-end tests for the federation sync workspace live under `tests/`.

#![forbid(unsafe_code)]
