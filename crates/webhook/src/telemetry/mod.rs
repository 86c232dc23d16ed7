//! Structured logging and optional OpenTelemetry span export.
//!
//! Logs are JSON on stdout. Spans are additionally exported over OTLP/gRPC
//! when `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
//!
//! # Telemetry invariants
//!
//! - **No secret material** may appear in any span attribute or log field:
//!   no plaintext values, no data keys, no field tokens. Request uid,
//!   namespace, name, field count and key ids are fine.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`).

pub mod init;

pub use init::{init_telemetry, shutdown};
