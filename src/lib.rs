// Library root
// -----------
// The binary (`main.rs`) only wires these modules together; everything it
// does is reachable from here so the flows can be tested without a process.
//
// Module responsibilities:
// - `config`: resolves base URL, token and default card id from the
//   environment (and `.env`).
// - `encode`: turns image files into base64 or data URI payloads.
// - `api`: builds authenticated requests per endpoint and sends them through
//   a `Transport` (reqwest in production).
// - `commands`: the handlers that interpret statuses and print reports,
//   including the `run-all` flow.
// - `cli`: quiet-flag stripping and the clap argument model.
// - `error`: error taxonomy and exit codes.
pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod encode;
pub mod error;
pub mod logging;
