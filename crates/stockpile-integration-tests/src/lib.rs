//! End-to-end scenarios for the stockpile item pipeline live under `tests/`.
