//! End-to-end tests for the AWS export stage. All tests live under `tests/`.
